//! Frames exchanged between the connection and session event loops

use siderite_amqp_types::performatives::{
    Attach, Begin, Detach, Disposition, End, Flow, Transfer,
};

use crate::Payload;

/// A channel-tagged frame body routed between a connection and one of its
/// sessions
#[derive(Debug)]
pub(crate) struct SessionFrame {
    pub channel: u16,
    pub body: SessionFrameBody,
}

impl SessionFrame {
    pub fn new(channel: u16, body: SessionFrameBody) -> Self {
        Self { channel, body }
    }
}

#[derive(Debug)]
pub(crate) enum SessionFrameBody {
    Begin(Begin),
    Attach(Attach),
    Flow(Flow),
    Transfer {
        performative: Transfer,
        payload: Payload,
    },
    Disposition(Disposition),
    Detach(Detach),
    End(End),
}

/// What a session receives from the connection event loop
pub(crate) type SessionIncomingItem = SessionFrame;
