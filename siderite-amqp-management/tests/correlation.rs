//! Request/response correlation against a scripted management node

use bytes::BytesMut;
use futures_util::{SinkExt, StreamExt};
use tokio::io::DuplexStream;
use tokio_util::codec::Framed;

use siderite_amqp::connection::ConnectionHandle;
use siderite_amqp::frames::amqp::{Frame, FrameBody, FrameCodec};
use siderite_amqp::session::SessionHandle;
use siderite_amqp::transport::{ProtocolHeader, ProtocolHeaderCodec};
use siderite_amqp_management::error::Error;
use siderite_amqp_management::operations::ReadRequest;
use siderite_amqp_management::ManagementClient;
use siderite_amqp_types::definitions::Role;
use siderite_amqp_types::messaging::{
    Accepted, AmqpValue, ApplicationProperties, DeliveryState, Message, MessageId, Properties,
};
use siderite_amqp_types::performatives::{Attach, Begin, Disposition, Flow, Open, Transfer};
use siderite_amqp_types::primitives::{OrderedMap, SimpleValue};
use siderite_amqp_types::Value;

/// The management-node half of the exchange, scripted frame by frame
struct MockNode {
    framed: Framed<DuplexStream, FrameCodec>,
    next_outgoing_id: u32,
}

impl MockNode {
    async fn accept(io: DuplexStream) -> Self {
        let mut framed = Framed::new(io, ProtocolHeaderCodec::default());
        let incoming = framed.next().await.unwrap().unwrap();
        assert_eq!(incoming, ProtocolHeader::amqp());
        framed.send(ProtocolHeader::amqp()).await.unwrap();
        let mut framed = framed.map_codec(|_| FrameCodec::new(u32::MAX as usize));

        // open
        let frame = framed.next().await.unwrap().unwrap();
        assert!(matches!(frame.body, FrameBody::Open(_)));
        framed
            .send(Frame::new(
                0,
                FrameBody::Open(Open {
                    container_id: "mock-node".to_string(),
                    max_frame_size: 65_536.into(),
                    ..Default::default()
                }),
            ))
            .await
            .unwrap();

        // begin
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

        Self {
            framed,
            next_outgoing_id: 0,
        }
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

    /// Answers the paired attach exchange of the management client and
    /// grants the request sender some credit
    async fn accept_links(&mut self) -> (u32, u32) {
        let (channel, body) = self.next_body().await;
        let sender_attach = match body {
            FrameBody::Attach(attach) => attach,
            other => panic!("expecting the request sender attach, got {:?}", other),
        };
        assert_eq!(sender_attach.role, Role::Sender);
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
            other => panic!("expecting the response receiver attach, got {:?}", other),
        };
        assert_eq!(receiver_attach.role, Role::Receiver);
        self.echo_attach(channel, &receiver_attach).await;

        // the receiver announces its credit
        let (_, body) = self.next_body().await;
        assert!(matches!(body, FrameBody::Flow(_)));

        (sender_attach.handle, receiver_attach.handle)
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

    /// Receives a request, accepts the delivery, and returns the decoded
    /// message
    async fn recv_request(&mut self) -> (u16, Message) {
        let (channel, body) = self.next_body().await;
        let (transfer, payload) = match body {
            FrameBody::Transfer {
                performative,
                payload,
            } => (performative, payload),
            other => panic!("expecting a request transfer, got {:?}", other),
        };
        let message = Message::from_slice(&payload).unwrap();

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
        (channel, message)
    }

    /// Sends a response correlated to the request's message-id
    async fn send_response(
        &mut self,
        channel: u16,
        receiver_handle: u32,
        correlation_id: MessageId,
        status_code: u32,
        status_description: Option<&str>,
        body: Value,
    ) {
        let mut application_properties = ApplicationProperties::builder()
            .insert("statusCode", status_code)
            .build();
        if let Some(description) = status_description {
            application_properties.insert("statusDescription", description);
        }

        let message = Message::builder()
            .properties(
                Properties::builder()
                    .correlation_id(correlation_id)
                    .build(),
            )
            .application_properties(application_properties)
            .body(siderite_amqp_types::messaging::Body::Value(AmqpValue(body)))
            .build();
        let mut payload = BytesMut::new();
        message.encode(&mut payload).unwrap();

        let delivery_id = self.next_outgoing_id;
        self.next_outgoing_id += 1;
        self.framed
            .send(Frame::new(
                channel,
                FrameBody::Transfer {
                    performative: Transfer {
                        handle: receiver_handle,
                        delivery_id: Some(delivery_id),
                        delivery_tag: Some(delivery_id.to_be_bytes().to_vec().into()),
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

fn request_ids(message: &Message) -> (MessageId, String) {
    let message_id = message
        .properties
        .as_ref()
        .and_then(|p| p.message_id.clone())
        .expect("requests must carry a message-id");
    let entity_type = match message
        .application_properties
        .as_ref()
        .and_then(|p| p.get("type"))
    {
        Some(SimpleValue::String(s)) => s.clone(),
        other => panic!("expecting a string entity type, got {:?}", other),
    };
    (message_id, entity_type)
}

async fn connect(io: DuplexStream) -> (ConnectionHandle, SessionHandle) {
    let mut connection = ConnectionHandle::builder()
        .container_id("mgmt-test")
        .open_with_stream(io)
        .await
        .unwrap();
    let session = SessionHandle::begin(&mut connection).await.unwrap();
    (connection, session)
}

#[tokio::test]
async fn concurrent_operations_resolve_their_own_responses() {
    let (client_io, node_io) = tokio::io::duplex(256 * 1024);

    let node = tokio::spawn(async move {
        let mut node = MockNode::accept(node_io).await;
        let (_, receiver_handle) = node.accept_links().await;

        let (channel, first) = node.recv_request().await;
        let (first_id, first_type) = request_ids(&first);
        let (_, second) = node.recv_request().await;
        let (second_id, second_type) = request_ids(&second);

        // responses go out in reverse order; correlation has to sort them
        for (id, entity_type) in [(second_id, second_type), (first_id, first_type)] {
            let mut attributes: OrderedMap<Value, Value> = OrderedMap::new();
            attributes.insert(Value::from("name"), Value::from(entity_type));
            node.send_response(
                channel,
                receiver_handle,
                id,
                200,
                None,
                Value::Map(attributes),
            )
            .await;
        }
    });

    let (_connection, mut session) = connect(client_io).await;
    let mut client = ManagementClient::attach(&mut session).await.unwrap();

    let first = client
        .send_request(ReadRequest::new("entity-1"))
        .await
        .unwrap();
    let second = client
        .send_request(ReadRequest::new("entity-2"))
        .await
        .unwrap();

    let first = first.recv_response().await.unwrap();
    let second = second.recv_response().await.unwrap();

    assert_eq!(
        first.attributes.get("name"),
        Some(&Value::from("entity-1"))
    );
    assert_eq!(
        second.attributes.get("name"),
        Some(&Value::from("entity-2"))
    );

    node.await.unwrap();
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let (client_io, node_io) = tokio::io::duplex(256 * 1024);

    let node = tokio::spawn(async move {
        let mut node = MockNode::accept(node_io).await;
        let (_, receiver_handle) = node.accept_links().await;

        let (channel, request) = node.recv_request().await;
        let (id, _) = request_ids(&request);
        node.send_response(channel, receiver_handle, id, 500, Some("bad"), Value::Null)
            .await;
    });

    let (_connection, mut session) = connect(client_io).await;
    let mut client = ManagementClient::attach(&mut session).await.unwrap();

    let result = client.call(ReadRequest::new("entity")).await;
    match result {
        Err(Error::Status { code, description }) => {
            assert_eq!(code.get(), 500);
            assert!(description.as_deref().unwrap_or("").contains("bad"));
        }
        other => panic!("expecting a status error, got {:?}", other),
    }

    node.await.unwrap();
}

#[tokio::test]
async fn closing_the_client_fails_outstanding_operations() {
    let (client_io, node_io) = tokio::io::duplex(256 * 1024);

    let node = tokio::spawn(async move {
        let mut node = MockNode::accept(node_io).await;
        let _ = node.accept_links().await;

        // accept the request but never respond
        let _ = node.recv_request().await;

        // answer the closing detaches of both links
        for _ in 0..2 {
            let (channel, body) = node.next_body().await;
            match body {
                FrameBody::Detach(detach) => {
                    let echo = siderite_amqp_types::performatives::Detach {
                        handle: detach.handle,
                        closed: detach.closed,
                        error: None,
                    };
                    node.framed
                        .send(Frame::new(channel, FrameBody::Detach(echo)))
                        .await
                        .unwrap();
                }
                other => panic!("expecting a detach frame, got {:?}", other),
            }
        }
    });

    let (_connection, mut session) = connect(client_io).await;
    let mut client = ManagementClient::attach(&mut session).await.unwrap();

    let outstanding = client
        .send_request(ReadRequest::new("entity"))
        .await
        .unwrap();
    client.close().await.unwrap();

    assert!(matches!(
        outstanding.recv_response().await,
        Err(Error::InstanceClosed)
    ));

    node.await.unwrap();
}
