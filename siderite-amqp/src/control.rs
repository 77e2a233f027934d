//! Control messages posted to the connection and session event loops

use tokio::sync::{mpsc, oneshot};

use siderite_amqp_types::definitions::{self, Handle};
use siderite_amqp_types::performatives::Disposition;

use crate::connection::AllocSessionError;
use crate::link::{AllocLinkError, LinkRelay};
use crate::session::SessionIncomingItem;

#[derive(Debug)]
pub(crate) enum ConnectionControl {
    /// Send a close frame, optionally carrying an error
    Close(Option<definitions::Error>),

    /// Bind a new session to an outgoing channel
    AllocateSession {
        tx: mpsc::Sender<SessionIncomingItem>,
        responder: oneshot::Sender<Result<(u16, usize), AllocSessionError>>,
    },

    /// Release an ended session
    DeallocateSession(usize),
}

#[derive(Debug)]
pub(crate) enum SessionControl {
    /// Send an end frame, optionally carrying an error
    End(Option<definitions::Error>),

    /// Bind a new link to an output handle
    AllocateLink {
        link_name: String,
        link_relay: LinkRelay,
        responder: oneshot::Sender<Result<Handle, AllocLinkError>>,
    },

    /// Release a detached link
    DeallocateLink(Handle),

    /// Send a disposition issued outside the transfer path
    Disposition(Disposition),
}
