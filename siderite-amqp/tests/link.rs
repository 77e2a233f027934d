//! Link level exchanges against a scripted peer

use std::time::Duration;

use bytes::BytesMut;
use futures_util::FutureExt;

use siderite_amqp::connection::ConnectionHandle;
use siderite_amqp::link::{Receiver, Sender};
use siderite_amqp::session::SessionHandle;
use siderite_amqp_types::definitions::Role;
use siderite_amqp_types::messaging::{Accepted, DeliveryState, Message};
use siderite_amqp_types::performatives::{Disposition, Transfer};

mod common;
use common::{peer_open, MockPeer};

async fn open_connection_and_session(
    client_io: tokio::io::DuplexStream,
) -> (ConnectionHandle, SessionHandle) {
    let mut connection = ConnectionHandle::builder()
        .container_id("c1")
        .open_with_stream(client_io)
        .await
        .unwrap();
    let session = SessionHandle::begin(&mut connection).await.unwrap();
    (connection, session)
}

async fn peer_accept_to_session(peer_io: tokio::io::DuplexStream) -> (MockPeer, u16) {
    let mut peer = MockPeer::accept_amqp(peer_io).await;
    let _ = peer.expect_open().await;
    peer.send_open(peer_open("peer", 65_536)).await;
    let (channel, _begin) = peer.expect_begin().await;
    peer.send_begin(0, channel, 2048).await;
    (peer, channel)
}

#[tokio::test]
async fn send_blocks_until_credit_is_granted() {
    let (client_io, peer_io) = tokio::io::duplex(256 * 1024);

    let peer = tokio::spawn(async move {
        let (mut peer, _) = peer_accept_to_session(peer_io).await;

        let (channel, attach) = peer.expect_attach().await;
        assert_eq!(attach.role, Role::Sender);
        peer.echo_attach(channel, 0, &attach).await;

        // no transfer may arrive while the link has zero credit
        let premature = tokio::time::timeout(Duration::from_millis(200), peer.next_frame()).await;
        assert!(premature.is_err(), "transfer sent without credit");

        peer.send_link_credit(channel, attach.handle, 1, 0).await;

        let (channel, transfer, payload) = peer.expect_transfer().await;
        assert_eq!(transfer.delivery_id, Some(0));
        assert!(!payload.is_empty());

        peer.send_disposition(
            channel,
            Disposition {
                role: Role::Receiver,
                first: 0,
                last: None,
                settled: true,
                state: Some(DeliveryState::Accepted(Accepted {})),
                batchable: false,
            },
        )
        .await;
    });

    let (_connection, mut session) = open_connection_and_session(client_io).await;
    let mut sender = Sender::attach(&mut session, "credit-test-sender", "q1")
        .await
        .unwrap();

    // blocks on zero credit until the peer's flow arrives, then resolves
    // with the accepted outcome
    let outcome = sender.send("hello AMQP").await.unwrap();
    assert!(outcome.is_accepted());

    peer.await.unwrap();
}

#[tokio::test]
async fn receiver_issues_credit_and_auto_accepts() {
    let (client_io, peer_io) = tokio::io::duplex(256 * 1024);

    let peer = tokio::spawn(async move {
        let (mut peer, _) = peer_accept_to_session(peer_io).await;

        let (channel, attach) = peer.expect_attach().await;
        assert_eq!(attach.role, Role::Receiver);
        peer.echo_attach(channel, 0, &attach).await;

        // the receiver announces its initial credit
        let (_, flow) = peer.expect_flow().await;
        assert_eq!(flow.handle, Some(attach.handle));
        assert!(flow.link_credit.unwrap_or(0) > 0);

        let message = Message::from("payload for the receiver");
        let mut payload = BytesMut::new();
        message.encode(&mut payload).unwrap();

        peer.send_transfer(
            channel,
            Transfer {
                handle: 0,
                delivery_id: Some(0),
                delivery_tag: Some(vec![0u8; 4].into()),
                message_format: Some(0),
                settled: Some(false),
                ..Default::default()
            },
            payload.freeze(),
        )
        .await;

        // auto-accept settles the delivery
        let (_, disposition) = peer.expect_disposition().await;
        assert_eq!(disposition.role, Role::Receiver);
        assert_eq!(disposition.first, 0);
        assert!(disposition.settled);
        assert!(matches!(
            disposition.state,
            Some(DeliveryState::Accepted(_))
        ));
    });

    let (_connection, mut session) = open_connection_and_session(client_io).await;
    let mut receiver = Receiver::attach(&mut session, "credit-test-receiver", "q1")
        .await
        .unwrap();

    let delivery = receiver.recv().await.unwrap();
    let value = delivery.try_into_value().unwrap();
    assert_eq!(value.as_str(), Some("payload for the receiver"));

    peer.await.unwrap();
}

#[tokio::test]
async fn multi_frame_delivery_is_reassembled() {
    let (client_io, peer_io) = tokio::io::duplex(256 * 1024);

    let peer = tokio::spawn(async move {
        let (mut peer, _) = peer_accept_to_session(peer_io).await;

        let (channel, attach) = peer.expect_attach().await;
        peer.echo_attach(channel, 0, &attach).await;
        let _ = peer.expect_flow().await;

        let message = Message::from("a message split across frames");
        let mut encoded = BytesMut::new();
        message.encode(&mut encoded).unwrap();
        let encoded = encoded.freeze();
        let half = encoded.len() / 2;

        // first frame carries the delivery identity and more=true
        peer.send_transfer(
            channel,
            Transfer {
                handle: 0,
                delivery_id: Some(0),
                delivery_tag: Some(vec![9u8; 2].into()),
                message_format: Some(0),
                settled: Some(true),
                more: true,
                ..Default::default()
            },
            encoded.slice(..half),
        )
        .await;
        // the continuation inherits the identity
        peer.send_transfer(
            channel,
            Transfer {
                handle: 0,
                more: false,
                ..Default::default()
            },
            encoded.slice(half..),
        )
        .await;
    });

    let (_connection, mut session) = open_connection_and_session(client_io).await;
    let mut receiver = Receiver::attach(&mut session, "reassembly-receiver", "q1")
        .await
        .unwrap();

    let delivery = receiver.recv().await.unwrap();
    assert!(delivery.is_settled());
    let value = delivery.try_into_value().unwrap();
    assert_eq!(value.as_str(), Some("a message split across frames"));

    peer.await.unwrap();
}

#[tokio::test]
async fn aborted_delivery_is_discarded() {
    let (client_io, peer_io) = tokio::io::duplex(256 * 1024);

    let peer = tokio::spawn(async move {
        let (mut peer, _) = peer_accept_to_session(peer_io).await;

        let (channel, attach) = peer.expect_attach().await;
        peer.echo_attach(channel, 0, &attach).await;
        let _ = peer.expect_flow().await;

        // an aborted multi-transfer delivery must never surface
        peer.send_transfer(
            channel,
            Transfer {
                handle: 0,
                delivery_id: Some(0),
                delivery_tag: Some(vec![1u8; 2].into()),
                message_format: Some(0),
                settled: Some(true),
                more: true,
                ..Default::default()
            },
            bytes::Bytes::from_static(b"partial"),
        )
        .await;
        peer.send_transfer(
            channel,
            Transfer {
                handle: 0,
                aborted: true,
                ..Default::default()
            },
            bytes::Bytes::new(),
        )
        .await;

        // a complete delivery afterwards is received normally
        let message = Message::from("after the abort");
        let mut encoded = BytesMut::new();
        message.encode(&mut encoded).unwrap();
        peer.send_transfer(
            channel,
            Transfer {
                handle: 0,
                delivery_id: Some(1),
                delivery_tag: Some(vec![2u8; 2].into()),
                message_format: Some(0),
                settled: Some(true),
                ..Default::default()
            },
            encoded.freeze(),
        )
        .await;
    });

    let (_connection, mut session) = open_connection_and_session(client_io).await;
    let mut receiver = Receiver::attach(&mut session, "abort-receiver", "q1")
        .await
        .unwrap();

    let delivery = receiver.recv().await.unwrap();
    assert_eq!(delivery.delivery_id(), 1);
    let value = delivery.try_into_value().unwrap();
    assert_eq!(value.as_str(), Some("after the abort"));

    peer.await.unwrap();
}

#[tokio::test]
async fn transfers_are_gated_on_the_session_window() {
    let (client_io, peer_io) = tokio::io::duplex(256 * 1024);

    let peer = tokio::spawn(async move {
        let mut peer = MockPeer::accept_amqp(peer_io).await;
        let _ = peer.expect_open().await;
        peer.send_open(peer_open("peer", 65_536)).await;
        let (channel, _begin) = peer.expect_begin().await;
        // an incoming window of zero blocks every transfer
        peer.send_begin(0, channel, 0).await;

        let (channel, attach) = peer.expect_attach().await;
        peer.echo_attach(channel, 0, &attach).await;
        peer.send_link_credit(channel, attach.handle, 10, 0).await;

        // credit alone must not release the transfer
        let premature = tokio::time::timeout(Duration::from_millis(200), peer.next_frame()).await;
        assert!(premature.is_err(), "transfer sent with a closed window");

        // reopen the window
        use siderite_amqp::frames::amqp::FrameBody;
        use siderite_amqp_types::performatives::Flow;
        peer.send(
            channel,
            FrameBody::Flow(Flow {
                next_incoming_id: Some(0),
                incoming_window: 10,
                next_outgoing_id: 0,
                outgoing_window: 2048,
                ..Default::default()
            }),
        )
        .await;

        let (channel, transfer, _) = peer.expect_transfer().await;
        assert_eq!(transfer.delivery_id, Some(0));

        peer.send_disposition(
            channel,
            Disposition {
                role: Role::Receiver,
                first: 0,
                last: None,
                settled: true,
                state: Some(DeliveryState::Accepted(Accepted {})),
                batchable: false,
            },
        )
        .await;
    });

    let (_connection, mut session) = open_connection_and_session(client_io).await;
    let mut sender = Sender::attach(&mut session, "window-test-sender", "q1")
        .await
        .unwrap();

    let outcome = sender.send("gated by the window").await.unwrap();
    assert!(outcome.is_accepted());

    peer.await.unwrap();
}

#[tokio::test]
async fn presettled_send_resolves_without_a_disposition() {
    let (client_io, peer_io) = tokio::io::duplex(256 * 1024);

    let peer = tokio::spawn(async move {
        let (mut peer, _) = peer_accept_to_session(peer_io).await;

        let (channel, attach) = peer.expect_attach().await;
        peer.echo_attach(channel, 0, &attach).await;
        peer.send_link_credit(channel, attach.handle, 10, 0).await;

        let (_, transfer, _) = peer.expect_transfer().await;
        assert_eq!(transfer.settled, Some(true));
        // no disposition is sent for a settled delivery
    });

    let (_connection, mut session) = open_connection_and_session(client_io).await;
    let mut sender = Sender::builder()
        .name("presettled-sender")
        .target("q1")
        .sender_settle_mode(siderite_amqp_types::definitions::SenderSettleMode::Settled)
        .attach(&mut session)
        .await
        .unwrap();

    let outcome = sender.send("fire and forget").await.unwrap();
    assert!(outcome.is_accepted());

    peer.await.unwrap();
}

#[tokio::test]
async fn detach_and_close_round_trip() {
    let (client_io, peer_io) = tokio::io::duplex(256 * 1024);

    let peer = tokio::spawn(async move {
        let (mut peer, _) = peer_accept_to_session(peer_io).await;

        let (channel, attach) = peer.expect_attach().await;
        peer.echo_attach(channel, 0, &attach).await;

        let (channel, detach) = peer.expect_detach().await;
        assert!(detach.closed);
        peer.echo_detach(channel, &detach).await;
    });

    let (_connection, mut session) = open_connection_and_session(client_io).await;
    let sender = Sender::attach(&mut session, "detach-test-sender", "q1")
        .await
        .unwrap();
    sender.close().await.unwrap();

    peer.await.unwrap();
}

#[tokio::test]
async fn try_recv_returns_empty_without_traffic() {
    let (client_io, peer_io) = tokio::io::duplex(256 * 1024);

    let peer = tokio::spawn(async move {
        let (mut peer, _) = peer_accept_to_session(peer_io).await;
        let (channel, attach) = peer.expect_attach().await;
        peer.echo_attach(channel, 0, &attach).await;
        let _ = peer.expect_flow().await;
        // keep the peer alive until the client is done polling
        let _ = peer.next_frame().now_or_never();
        tokio::time::sleep(Duration::from_millis(300)).await;
    });

    let (_connection, mut session) = open_connection_and_session(client_io).await;
    let mut receiver = Receiver::attach(&mut session, "try-recv-receiver", "q1")
        .await
        .unwrap();

    assert!(matches!(
        receiver.try_recv(),
        Err(siderite_amqp::link::TryRecvError::Empty)
    ));

    peer.await.unwrap();
}
