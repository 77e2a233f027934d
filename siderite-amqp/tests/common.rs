//! A scripted in-process peer used by the integration tests.
//!
//! The peer drives the remote side of the wire protocol frame by frame so
//! the tests can assert exactly what the client puts on the wire.

use futures_util::{SinkExt, StreamExt};
use tokio::io::DuplexStream;
use tokio_util::codec::Framed;

use siderite_amqp::frames::amqp::{Frame, FrameBody, FrameCodec};
use siderite_amqp::transport::{ProtocolHeader, ProtocolHeaderCodec};
use siderite_amqp::Payload;
use siderite_amqp_types::definitions::Role;
use siderite_amqp_types::performatives::{
    Attach, Begin, Close, Detach, Disposition, Flow, Open, Transfer,
};

pub struct MockPeer {
    framed: Framed<DuplexStream, FrameCodec>,
}

#[allow(dead_code)]
impl MockPeer {
    /// Performs the server side of the plain AMQP header exchange
    pub async fn accept_amqp(io: DuplexStream) -> Self {
        let mut framed = Framed::new(io, ProtocolHeaderCodec::default());
        let incoming = framed
            .next()
            .await
            .expect("expecting a protocol header")
            .expect("malformed protocol header");
        assert_eq!(incoming, ProtocolHeader::amqp());
        framed.send(ProtocolHeader::amqp()).await.unwrap();

        Self {
            framed: framed.map_codec(|_| FrameCodec::new(u32::MAX as usize)),
        }
    }

    pub async fn send(&mut self, channel: u16, body: FrameBody) {
        self.framed.send(Frame::new(channel, body)).await.unwrap();
    }

    pub async fn next_frame(&mut self) -> Frame {
        loop {
            let frame = self
                .framed
                .next()
                .await
                .expect("peer stream ended")
                .expect("malformed frame");
            // heartbeats may interleave with any exchange
            if matches!(frame.body, FrameBody::Empty) {
                continue;
            }
            return frame;
        }
    }

    /// Waits for an empty (heartbeat) frame
    pub async fn expect_empty_frame(&mut self) {
        loop {
            let frame = self
                .framed
                .next()
                .await
                .expect("peer stream ended")
                .expect("malformed frame");
            if matches!(frame.body, FrameBody::Empty) {
                return;
            }
        }
    }

    pub async fn expect_open(&mut self) -> Open {
        match self.next_frame().await.body {
            FrameBody::Open(open) => open,
            other => panic!("expecting an open frame, got {:?}", other),
        }
    }

    pub async fn send_open(&mut self, open: Open) {
        self.send(0, FrameBody::Open(open)).await;
    }

    pub async fn expect_begin(&mut self) -> (u16, Begin) {
        let frame = self.next_frame().await;
        match frame.body {
            FrameBody::Begin(begin) => (frame.channel, begin),
            other => panic!("expecting a begin frame, got {:?}", other),
        }
    }

    /// Answers a begin with the default windows
    pub async fn send_begin(&mut self, channel: u16, remote_channel: u16, incoming_window: u32) {
        let begin = Begin {
            remote_channel: Some(remote_channel),
            next_outgoing_id: 0,
            incoming_window,
            outgoing_window: 2048,
            handle_max: u32::MAX,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        };
        self.send(channel, FrameBody::Begin(begin)).await;
    }

    pub async fn expect_attach(&mut self) -> (u16, Attach) {
        let frame = self.next_frame().await;
        match frame.body {
            FrameBody::Attach(attach) => (frame.channel, attach),
            other => panic!("expecting an attach frame, got {:?}", other),
        }
    }

    /// Echoes an attach back with the roles flipped, confirming both
    /// termini
    pub async fn echo_attach(&mut self, channel: u16, handle: u32, attach: &Attach) {
        let echo = Attach {
            name: attach.name.clone(),
            handle,
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
            initial_delivery_count: match attach.role {
                // the echo acts as the sender and must announce its count
                Role::Receiver => Some(0),
                Role::Sender => None,
            },
            max_message_size: None,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        };
        self.send(channel, FrameBody::Attach(echo)).await;
    }

    pub async fn expect_flow(&mut self) -> (u16, Flow) {
        let frame = self.next_frame().await;
        match frame.body {
            FrameBody::Flow(flow) => (frame.channel, flow),
            other => panic!("expecting a flow frame, got {:?}", other),
        }
    }

    /// Grants link credit on the given handle
    pub async fn send_link_credit(
        &mut self,
        channel: u16,
        handle: u32,
        link_credit: u32,
        next_incoming_id: u32,
    ) {
        let flow = Flow {
            next_incoming_id: Some(next_incoming_id),
            incoming_window: 2048,
            next_outgoing_id: 0,
            outgoing_window: 2048,
            handle: Some(handle),
            delivery_count: Some(0),
            link_credit: Some(link_credit),
            available: None,
            drain: false,
            echo: false,
            properties: None,
        };
        self.send(channel, FrameBody::Flow(flow)).await;
    }

    pub async fn expect_transfer(&mut self) -> (u16, Transfer, Payload) {
        let frame = self.next_frame().await;
        match frame.body {
            FrameBody::Transfer {
                performative,
                payload,
            } => (frame.channel, performative, payload),
            other => panic!("expecting a transfer frame, got {:?}", other),
        }
    }

    pub async fn send_transfer(&mut self, channel: u16, transfer: Transfer, payload: Payload) {
        self.send(
            channel,
            FrameBody::Transfer {
                performative: transfer,
                payload,
            },
        )
        .await;
    }

    pub async fn expect_disposition(&mut self) -> (u16, Disposition) {
        let frame = self.next_frame().await;
        match frame.body {
            FrameBody::Disposition(disposition) => (frame.channel, disposition),
            other => panic!("expecting a disposition frame, got {:?}", other),
        }
    }

    pub async fn send_disposition(&mut self, channel: u16, disposition: Disposition) {
        self.send(channel, FrameBody::Disposition(disposition)).await;
    }

    pub async fn expect_detach(&mut self) -> (u16, Detach) {
        let frame = self.next_frame().await;
        match frame.body {
            FrameBody::Detach(detach) => (frame.channel, detach),
            other => panic!("expecting a detach frame, got {:?}", other),
        }
    }

    pub async fn echo_detach(&mut self, channel: u16, detach: &Detach) {
        let echo = Detach {
            handle: detach.handle,
            closed: detach.closed,
            error: None,
        };
        self.send(channel, FrameBody::Detach(echo)).await;
    }

    pub async fn expect_end(&mut self) -> u16 {
        let frame = self.next_frame().await;
        match frame.body {
            FrameBody::End(_) => frame.channel,
            other => panic!("expecting an end frame, got {:?}", other),
        }
    }

    pub async fn send_end(&mut self, channel: u16) {
        self.send(
            channel,
            FrameBody::End(siderite_amqp_types::performatives::End { error: None }),
        )
        .await;
    }

    pub async fn expect_close(&mut self) -> Close {
        let frame = self.next_frame().await;
        match frame.body {
            FrameBody::Close(close) => close,
            other => panic!("expecting a close frame, got {:?}", other),
        }
    }

    pub async fn send_close(&mut self) {
        self.send(0, FrameBody::Close(Close { error: None })).await;
    }
}

/// The default server-side open frame
#[allow(dead_code)]
pub fn peer_open(container_id: &str, max_frame_size: u32) -> Open {
    Open {
        container_id: container_id.to_string(),
        hostname: None,
        max_frame_size: max_frame_size.into(),
        channel_max: 255.into(),
        idle_time_out: None,
        outgoing_locales: None,
        incoming_locales: None,
        offered_capabilities: None,
        desired_capabilities: None,
        properties: None,
    }
}
