//! Token exchange against a scripted claims-based-security node

use bytes::BytesMut;
use futures_util::{SinkExt, StreamExt};
use tokio::io::DuplexStream;
use tokio_util::codec::Framed;

use siderite_amqp::connection::ConnectionHandle;
use siderite_amqp::frames::amqp::{Frame, FrameBody, FrameCodec};
use siderite_amqp::session::SessionHandle;
use siderite_amqp::transport::{ProtocolHeader, ProtocolHeaderCodec};
use siderite_amqp_cbs::{CbsClient, CbsToken};
use siderite_amqp_types::definitions::Role;
use siderite_amqp_types::messaging::{
    Accepted, ApplicationProperties, Body, DeliveryState, Message, MessageId, Properties,
};
use siderite_amqp_types::performatives::{Attach, Begin, Disposition, Flow, Open, Transfer};
use siderite_amqp_types::primitives::{SimpleValue, Timestamp};

struct MockCbsNode {
    framed: Framed<DuplexStream, FrameCodec>,
}

impl MockCbsNode {
    async fn accept(io: DuplexStream) -> Self {
        let mut framed = Framed::new(io, ProtocolHeaderCodec::default());
        let incoming = framed.next().await.unwrap().unwrap();
        assert_eq!(incoming, ProtocolHeader::amqp());
        framed.send(ProtocolHeader::amqp()).await.unwrap();
        let mut framed = framed.map_codec(|_| FrameCodec::new(u32::MAX as usize));

        let frame = framed.next().await.unwrap().unwrap();
        assert!(matches!(frame.body, FrameBody::Open(_)));
        framed
            .send(Frame::new(
                0,
                FrameBody::Open(Open {
                    container_id: "mock-cbs-node".to_string(),
                    max_frame_size: 65_536.into(),
                    ..Default::default()
                }),
            ))
            .await
            .unwrap();

        let frame = framed.next().await.unwrap().unwrap();
        let channel = frame.channel;
        assert!(matches!(frame.body, FrameBody::Begin(_)));
        framed
            .send(Frame::new(
                channel,
                FrameBody::Begin(Begin {
                    remote_channel: Some(channel),
                    next_outgoing_id: 0,
                    incoming_window: 2048,
                    outgoing_window: 2048,
                    handle_max: u32::MAX,
                    offered_capabilities: None,
                    desired_capabilities: None,
                    properties: None,
                }),
            ))
            .await
            .unwrap();

        Self { framed }
    }

    async fn next_body(&mut self) -> (u16, FrameBody) {
        loop {
            let frame = self.framed.next().await.unwrap().unwrap();
            if matches!(frame.body, FrameBody::Empty) {
                continue;
            }
            return (frame.channel, frame.body);
        }
    }

    async fn accept_links(&mut self) -> u32 {
        let (channel, body) = self.next_body().await;
        let sender_attach = match body {
            FrameBody::Attach(attach) => attach,
            other => panic!("expecting the sender attach, got {:?}", other),
        };
        // the request sender targets the reserved node name
        assert_eq!(
            sender_attach
                .target
                .as_deref()
                .and_then(|t| t.address.as_deref()),
            Some("$cbs")
        );
        self.echo_attach(channel, &sender_attach).await;
        self.framed
            .send(Frame::new(
                channel,
                FrameBody::Flow(Flow {
                    next_incoming_id: Some(0),
                    incoming_window: 2048,
                    next_outgoing_id: 0,
                    outgoing_window: 2048,
                    handle: Some(sender_attach.handle),
                    delivery_count: Some(0),
                    link_credit: Some(100),
                    ..Default::default()
                }),
            ))
            .await
            .unwrap();

        let (channel, body) = self.next_body().await;
        let receiver_attach = match body {
            FrameBody::Attach(attach) => attach,
            other => panic!("expecting the receiver attach, got {:?}", other),
        };
        self.echo_attach(channel, &receiver_attach).await;

        let (_, body) = self.next_body().await;
        assert!(matches!(body, FrameBody::Flow(_)));

        receiver_attach.handle
    }

    async fn echo_attach(&mut self, channel: u16, attach: &Attach) {
        let echo = Attach {
            name: attach.name.clone(),
            handle: attach.handle,
            role: match attach.role {
                Role::Sender => Role::Receiver,
                Role::Receiver => Role::Sender,
            },
            snd_settle_mode: attach.snd_settle_mode,
            rcv_settle_mode: attach.rcv_settle_mode,
            source: Some(Box::new(
                attach.source.as_deref().cloned().unwrap_or_default(),
            )),
            target: Some(Box::new(
                attach.target.as_deref().cloned().unwrap_or_default(),
            )),
            unsettled: None,
            incomplete_unsettled: false,
            initial_delivery_count: Some(0),
            max_message_size: None,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        };
        self.framed
            .send(Frame::new(channel, FrameBody::Attach(echo)))
            .await
            .unwrap();
    }

    /// Receives the put-token request, asserts its shape and answers with
    /// the given status code
    async fn handle_put_token(&mut self, receiver_handle: u32, status_code: u32) {
        let (channel, body) = self.next_body().await;
        let (transfer, payload) = match body {
            FrameBody::Transfer {
                performative,
                payload,
            } => (performative, payload),
            other => panic!("expecting the put-token transfer, got {:?}", other),
        };
        let message = Message::from_slice(&payload).unwrap();

        let properties = message.application_properties.as_ref().unwrap();
        assert_eq!(
            properties.get("operation"),
            Some(&SimpleValue::String("put-token".to_string()))
        );
        assert_eq!(
            properties.get("type"),
            Some(&SimpleValue::String(
                "servicebus.windows.net:sastoken".to_string()
            ))
        );
        assert_eq!(
            properties.get("name"),
            Some(&SimpleValue::String("sb://x/y".to_string()))
        );
        // the body is the bearer token itself
        assert_eq!(message.body, Body::from("dummy-token"));

        let message_id = message
            .properties
            .as_ref()
            .and_then(|p| p.message_id.clone())
            .expect("requests must carry a message-id");

        self.framed
            .send(Frame::new(
                channel,
                FrameBody::Disposition(Disposition {
                    role: Role::Receiver,
                    first: transfer.delivery_id.unwrap(),
                    last: None,
                    settled: true,
                    state: Some(DeliveryState::Accepted(Accepted {})),
                    batchable: false,
                }),
            ))
            .await
            .unwrap();

        self.send_response(channel, receiver_handle, message_id, status_code)
            .await;
    }

    async fn send_response(
        &mut self,
        channel: u16,
        receiver_handle: u32,
        correlation_id: MessageId,
        status_code: u32,
    ) {
        let message = Message::builder()
            .properties(
                Properties::builder()
                    .correlation_id(correlation_id)
                    .build(),
            )
            .application_properties(
                ApplicationProperties::builder()
                    .insert("statusCode", status_code)
                    .build(),
            )
            .build();
        let mut payload = BytesMut::new();
        message.encode(&mut payload).unwrap();

        self.framed
            .send(Frame::new(
                channel,
                FrameBody::Transfer {
                    performative: Transfer {
                        handle: receiver_handle,
                        delivery_id: Some(0),
                        delivery_tag: Some(vec![0u8; 4].into()),
                        message_format: Some(0),
                        settled: Some(true),
                        ..Default::default()
                    },
                    payload: payload.freeze(),
                },
            ))
            .await
            .unwrap();
    }
}

fn dummy_token<'a>(expires_in: std::time::Duration) -> CbsToken<'a> {
    CbsToken::sas("dummy-token", Timestamp::now() + expires_in)
}

#[tokio::test]
async fn put_token_succeeds_on_202() {
    let (client_io, node_io) = tokio::io::duplex(256 * 1024);

    let node = tokio::spawn(async move {
        let mut node = MockCbsNode::accept(node_io).await;
        let receiver_handle = node.accept_links().await;
        node.handle_put_token(receiver_handle, 202).await;
    });

    let mut connection = ConnectionHandle::builder()
        .container_id("cbs-test")
        .open_with_stream(client_io)
        .await
        .unwrap();
    let mut session = SessionHandle::begin(&mut connection).await.unwrap();
    let mut cbs = CbsClient::attach(&mut session).await.unwrap();

    cbs.put_token("sb://x/y", dummy_token(std::time::Duration::from_secs(3600)))
        .await
        .unwrap();
    assert!(cbs.is_authorized("sb://x/y"));

    node.await.unwrap();
}

#[tokio::test]
async fn unexpired_authorization_is_not_renewed() {
    let (client_io, node_io) = tokio::io::duplex(256 * 1024);

    let node = tokio::spawn(async move {
        let mut node = MockCbsNode::accept(node_io).await;
        let receiver_handle = node.accept_links().await;
        // exactly one round trip; a second transfer would hang the test
        node.handle_put_token(receiver_handle, 202).await;
    });

    let mut connection = ConnectionHandle::builder()
        .container_id("cbs-test")
        .open_with_stream(client_io)
        .await
        .unwrap();
    let mut session = SessionHandle::begin(&mut connection).await.unwrap();
    let mut cbs = CbsClient::attach(&mut session).await.unwrap();

    let token = dummy_token(std::time::Duration::from_secs(3600));
    cbs.put_token("sb://x/y", token.clone()).await.unwrap();
    // the cached authorization short-circuits the second call
    cbs.put_token("sb://x/y", token).await.unwrap();

    node.await.unwrap();
}

#[tokio::test]
async fn non_success_status_fails_the_put() {
    let (client_io, node_io) = tokio::io::duplex(256 * 1024);

    let node = tokio::spawn(async move {
        let mut node = MockCbsNode::accept(node_io).await;
        let receiver_handle = node.accept_links().await;
        node.handle_put_token(receiver_handle, 401).await;
    });

    let mut connection = ConnectionHandle::builder()
        .container_id("cbs-test")
        .open_with_stream(client_io)
        .await
        .unwrap();
    let mut session = SessionHandle::begin(&mut connection).await.unwrap();
    let mut cbs = CbsClient::attach(&mut session).await.unwrap();

    let result = cbs
        .put_token("sb://x/y", dummy_token(std::time::Duration::from_secs(3600)))
        .await;
    match result {
        Err(siderite_amqp_management::Error::Status { code, .. }) => {
            assert_eq!(code.get(), 401)
        }
        other => panic!("expecting a status error, got {:?}", other),
    }
    assert!(!cbs.is_authorized("sb://x/y"));

    node.await.unwrap();
}
