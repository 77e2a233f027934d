//! Connection and session level protocol exchanges against a scripted peer

use std::time::Duration;

use siderite_amqp::connection::{ConnectionHandle, Error};
use siderite_amqp::session::SessionHandle;
use siderite_amqp_types::definitions::{AmqpError, ErrorCondition};

mod common;
use common::{peer_open, MockPeer};

#[tokio::test]
async fn open_handshake_negotiates_max_frame_size() {
    let (client_io, peer_io) = tokio::io::duplex(64 * 1024);

    let peer = tokio::spawn(async move {
        let mut peer = MockPeer::accept_amqp(peer_io).await;
        let open = peer.expect_open().await;
        assert_eq!(open.container_id, "c1");
        peer.send_open(peer_open("peer", 4096)).await;

        peer.expect_close().await;
        peer.send_close().await;
    });

    let mut connection = ConnectionHandle::builder()
        .container_id("c1")
        .max_frame_size(65_536)
        .open_with_stream(client_io)
        .await
        .unwrap();

    // effective max-frame-size is the min of both proposals
    assert_eq!(connection.max_frame_size(), 4096);

    connection.close().await.unwrap();
    peer.await.unwrap();
}

#[tokio::test]
async fn remote_close_with_error_is_reported() {
    let (client_io, peer_io) = tokio::io::duplex(64 * 1024);

    let peer = tokio::spawn(async move {
        let mut peer = MockPeer::accept_amqp(peer_io).await;
        let _ = peer.expect_open().await;
        peer.send_open(peer_open("peer", 4096)).await;

        use siderite_amqp::frames::amqp::FrameBody;
        use siderite_amqp_types::definitions;
        use siderite_amqp_types::performatives::Close;
        peer.send(
            0,
            FrameBody::Close(Close {
                error: Some(definitions::Error::new(
                    definitions::ConnectionError::ConnectionForced,
                    Some("server shutting down".to_string()),
                    None,
                )),
            }),
        )
        .await;
    });

    let mut connection = ConnectionHandle::builder()
        .container_id("c1")
        .open_with_stream(client_io)
        .await
        .unwrap();

    let result = connection.on_close().await;
    match result {
        Err(Error::RemoteClosedWithError(error)) => {
            assert_eq!(
                error.condition,
                ErrorCondition::Connection(siderite_amqp_types::definitions::ConnectionError::ConnectionForced)
            );
        }
        other => panic!("expecting a remote close error, got {:?}", other),
    }
    peer.await.unwrap();
}

#[tokio::test]
async fn missing_traffic_trips_the_idle_timeout() {
    let (client_io, peer_io) = tokio::io::duplex(64 * 1024);

    let peer = tokio::spawn(async move {
        let mut peer = MockPeer::accept_amqp(peer_io).await;
        let _ = peer.expect_open().await;
        peer.send_open(peer_open("peer", 4096)).await;

        // stay silent; the client must close with
        // amqp:resource-limit-exceeded
        let close = peer.expect_close().await;
        let error = close.error.expect("expecting an error in the close frame");
        assert_eq!(
            error.condition,
            ErrorCondition::Amqp(AmqpError::ResourceLimitExceeded)
        );
        peer.send_close().await;
    });

    let mut connection = ConnectionHandle::builder()
        .container_id("c1")
        .idle_time_out(200)
        .open_with_stream(client_io)
        .await
        .unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), connection.on_close())
        .await
        .expect("connection should error out well within the timeout");
    assert!(result.is_err());
    peer.await.unwrap();
}

#[tokio::test]
async fn keep_alive_frames_follow_the_remote_idle_timeout() {
    let (client_io, peer_io) = tokio::io::duplex(64 * 1024);

    let peer = tokio::spawn(async move {
        let mut peer = MockPeer::accept_amqp(peer_io).await;
        let _ = peer.expect_open().await;
        let mut open = peer_open("peer", 4096);
        open.idle_time_out = Some(200);
        peer.send_open(open).await;

        // empty frames must arrive at half the announced idle timeout
        tokio::time::timeout(Duration::from_secs(2), peer.expect_empty_frame())
            .await
            .expect("expecting a keep-alive frame");
    });

    let _connection = ConnectionHandle::builder()
        .container_id("c1")
        .open_with_stream(client_io)
        .await
        .unwrap();

    peer.await.unwrap();
}

#[tokio::test]
async fn session_begin_and_end() {
    let (client_io, peer_io) = tokio::io::duplex(64 * 1024);

    let peer = tokio::spawn(async move {
        let mut peer = MockPeer::accept_amqp(peer_io).await;
        let _ = peer.expect_open().await;
        peer.send_open(peer_open("peer", 4096)).await;

        let (channel, begin) = peer.expect_begin().await;
        assert_eq!(begin.remote_channel, None);
        peer.send_begin(0, channel, 2048).await;

        let channel = peer.expect_end().await;
        peer.send_end(channel).await;

        peer.expect_close().await;
        peer.send_close().await;
    });

    let mut connection = ConnectionHandle::builder()
        .container_id("c1")
        .open_with_stream(client_io)
        .await
        .unwrap();

    let mut session = SessionHandle::begin(&mut connection).await.unwrap();
    session.end().await.unwrap();
    connection.close().await.unwrap();
    peer.await.unwrap();
}
