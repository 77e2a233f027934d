//! Session errors

use siderite_amqp_types::definitions;
use tokio::task::JoinError;

/// Errors while beginning a session
#[derive(Debug, thiserror::Error)]
pub enum BeginError {
    /// The begin was attempted in an illegal session state
    #[error("Illegal session state")]
    IllegalState,

    /// The connection event loop has stopped
    #[error("Illegal connection state")]
    IllegalConnectionState,

    /// The remote peer ended the session during the handshake
    #[error("Remote peer ended the session")]
    RemoteEnded,

    /// The remote peer ended the session with an error
    #[error("Remote peer ended the session with an error: {}", .0)]
    RemoteEndedWithError(definitions::Error),
}

/// Errors on a mapped session
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The session event loop terminated abnormally
    #[error(transparent)]
    JoinError(#[from] JoinError),

    /// A frame arrived in a state where it is not permitted
    #[error("Illegal session state")]
    IllegalState,

    /// The connection event loop has stopped
    #[error("Illegal connection state")]
    IllegalConnectionState,

    /// A frame referenced a handle with no attached link
    #[error("A frame referenced an unattached handle")]
    UnattachedHandle,

    /// An attach arrived for a handle that is already attached
    #[error("An attach was received using a handle that is already in use")]
    HandleInUse,

    /// An attach arrived with a link name this session never attached
    #[error("Remote peer attached a link name that is not found locally")]
    RemoteAttachingLinkNameNotFound,

    /// The peer sent more transfers than the incoming window allows
    #[error("The peer violated the incoming window")]
    WindowViolation,

    /// The remote peer ended the session
    #[error("Remote peer ended the session")]
    RemoteEnded,

    /// The remote peer ended the session with an error
    #[error("Remote peer ended the session with an error: {}", .0)]
    RemoteEndedWithError(definitions::Error),
}

/// Session-internal errors handled by the event loop before being
/// surfaced as [`Error`]
#[derive(Debug, thiserror::Error)]
pub(crate) enum SessionInnerError {
    #[error("A frame referenced an unattached handle")]
    UnattachedHandle,

    #[error("Remote peer attached a link name that is not found locally")]
    RemoteAttachingLinkNameNotFound,

    #[error("An attach was received using a handle that is already in use")]
    HandleInUse,

    #[error("Illegal session state")]
    IllegalState,

    #[error("Illegal connection state")]
    IllegalConnectionState,

    #[error("A transfer frame was routed to a sender link")]
    TransferFrameToSender,

    #[error("The peer violated the incoming window")]
    WindowViolation,

    #[error("Remote peer ended the session")]
    RemoteEnded,

    #[error("Remote peer ended the session with an error: {}", .0)]
    RemoteEndedWithError(definitions::Error),
}

impl From<SessionInnerError> for Error {
    fn from(error: SessionInnerError) -> Self {
        match error {
            SessionInnerError::UnattachedHandle => Error::UnattachedHandle,
            SessionInnerError::RemoteAttachingLinkNameNotFound => {
                Error::RemoteAttachingLinkNameNotFound
            }
            SessionInnerError::HandleInUse => Error::HandleInUse,
            SessionInnerError::IllegalState => Error::IllegalState,
            SessionInnerError::IllegalConnectionState => Error::IllegalConnectionState,
            SessionInnerError::TransferFrameToSender => Error::IllegalState,
            SessionInnerError::WindowViolation => Error::WindowViolation,
            SessionInnerError::RemoteEnded => Error::RemoteEnded,
            SessionInnerError::RemoteEndedWithError(err) => Error::RemoteEndedWithError(err),
        }
    }
}
