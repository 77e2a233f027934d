//! Frames exchanged between the session event loop and link endpoints

use siderite_amqp_types::definitions::{Fields, Handle, SequenceNo};
use siderite_amqp_types::performatives::{Attach, Detach, Disposition, Flow, Transfer};

use crate::Payload;

#[derive(Debug)]
pub(crate) enum LinkFrame {
    Attach(Attach),
    Flow(LinkFlow),
    Transfer {
        performative: Transfer,
        payload: Payload,
    },
    Disposition(Disposition),
    Detach(Detach),
}

/// The link-level fields of a flow frame; the session fills in its own
/// flow state when the frame is sent
#[derive(Debug, Clone, Default)]
pub(crate) struct LinkFlow {
    pub handle: Handle,
    pub delivery_count: Option<SequenceNo>,
    pub link_credit: Option<u32>,
    pub available: Option<u32>,
    pub drain: bool,
    pub echo: bool,
    pub properties: Option<Fields>,
}

impl TryFrom<Flow> for LinkFlow {
    type Error = Flow;

    fn try_from(flow: Flow) -> Result<Self, Self::Error> {
        match flow.handle {
            Some(handle) => Ok(LinkFlow {
                handle,
                delivery_count: flow.delivery_count,
                link_credit: flow.link_credit,
                available: flow.available,
                drain: flow.drain,
                echo: flow.echo,
                properties: flow.properties,
            }),
            None => Err(flow),
        }
    }
}
