//! Link errors

use siderite_amqp_types::definitions;

/// Errors while allocating a link on a session
#[derive(Debug, thiserror::Error)]
pub enum AllocLinkError {
    /// The session is not mapped or its event loop has stopped
    #[error("Illegal session state")]
    IllegalSessionState,

    /// The link name is already attached on this session
    #[error("Link name is already in use")]
    DuplicatedLinkName,

    /// All handles up to handle-max are in use
    #[error("All handles up to handle-max are in use")]
    HandleMaxReached,
}

/// Errors while attaching a link
#[derive(Debug, thiserror::Error)]
pub enum AttachError {
    /// The session is not mapped or its event loop has stopped
    #[error("Illegal session state")]
    IllegalSessionState,

    /// The link name is already attached on this session
    #[error("Link name is already in use")]
    DuplicatedLinkName,

    /// All handles up to handle-max are in use
    #[error("All handles up to handle-max are in use")]
    HandleMaxReached,

    /// The peer answered the attach with something other than an attach
    #[error("Expecting an attach frame")]
    NonAttachFrameReceived,

    /// The peer refused the attachment by answering with a detach
    #[error("Remote peer refused the attachment")]
    RemoteAttachRefused(Option<definitions::Error>),
}

impl From<AllocLinkError> for AttachError {
    fn from(error: AllocLinkError) -> Self {
        match error {
            AllocLinkError::IllegalSessionState => AttachError::IllegalSessionState,
            AllocLinkError::DuplicatedLinkName => AttachError::DuplicatedLinkName,
            AllocLinkError::HandleMaxReached => AttachError::HandleMaxReached,
        }
    }
}

/// Errors while sending a message
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The link is not attached
    #[error("Illegal link state")]
    IllegalState,

    /// The session event loop has stopped
    #[error("Illegal session state")]
    IllegalSessionState,

    /// The message could not be encoded
    #[error(transparent)]
    MessageEncode(#[from] siderite_amqp_types::codec::Error),

    /// The encoded message exceeds the max-message-size of the link
    #[error("Message size exceeds the max-message-size of the link")]
    MessageSizeExceeded,

    /// The peer settled the delivery with a non-terminal state
    #[error("The delivery was settled without a terminal outcome")]
    NonTerminalDeliveryState,

    /// The link was detached before the delivery was settled
    #[error("The link was detached before the delivery was settled")]
    Detached,

    /// The send did not settle within the given duration. The delivery
    /// stays in the unsettled map until a disposition arrives or the link
    /// detaches.
    #[error("Send timed out")]
    Timeout,
}

/// Errors while receiving a message
#[derive(Debug, thiserror::Error)]
pub enum RecvError {
    /// The link is not attached
    #[error("Illegal link state")]
    IllegalState,

    /// The message could not be decoded
    #[error(transparent)]
    MessageDecode(#[from] siderite_amqp_types::codec::Error),

    /// The peer detached the link
    #[error("Remote peer detached the link")]
    RemoteDetached(Option<definitions::Error>),

    /// The peer closed the link
    #[error("Remote peer closed the link")]
    RemoteClosed(Option<definitions::Error>),
}

/// Errors when there is no message to receive right now
#[derive(Debug, thiserror::Error)]
pub enum TryRecvError {
    /// No fully assembled message is currently queued
    #[error("No message is currently available")]
    Empty,

    /// The link is detached or its session has stopped
    #[error("The link is detached")]
    Detached,
}

/// Errors while issuing a link flow (credit or drain)
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// The link is not attached
    #[error("Illegal link state")]
    IllegalState,

    /// The session event loop has stopped
    #[error("Illegal session state")]
    IllegalSessionState,
}

/// Errors while issuing a disposition
#[derive(Debug, thiserror::Error)]
pub enum DispositionError {
    /// The link is not attached
    #[error("Illegal link state")]
    IllegalState,

    /// The session event loop has stopped
    #[error("Illegal session state")]
    IllegalSessionState,
}

/// Errors while detaching a link
#[derive(Debug, thiserror::Error)]
pub enum DetachError {
    /// The link is not attached
    #[error("Illegal link state")]
    IllegalState,

    /// The session event loop has stopped
    #[error("Illegal session state")]
    IllegalSessionState,

    /// The peer detached with an error
    #[error("Remote peer detached with an error: {}", .0)]
    RemoteDetachedWithError(definitions::Error),

    /// The peer answered a non-closing detach with a closing detach
    #[error("Remote peer closed the link while a non-closing detach was requested")]
    ClosedByRemote,

    /// The peer answered a closing detach with a non-closing detach
    #[error("Remote peer detached the link while a closing detach was requested")]
    DetachedByRemote,
}
