//! Connection errors

use std::io;

use siderite_amqp_types::definitions;
use tokio::task::JoinError;

use crate::transport;

/// Errors on an open connection
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error from the underlying transport
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The connection event loop terminated abnormally
    #[error(transparent)]
    JoinError(#[from] JoinError),

    /// A frame arrived in a state where it is not permitted
    #[error("Illegal connection state")]
    IllegalState,

    /// A frame referenced a channel with no attached session
    #[error("Session for the channel is not found")]
    NotFound,

    /// No more channels can be allocated on this connection
    #[error("All channels up to channel-max are in use")]
    ChannelMaxReached,

    /// The transport failed; the condition describes how
    #[error("Transport error: {0}")]
    Transport(definitions::Error),

    /// The remote peer closed the connection without an error
    #[error("Remote peer closed the connection")]
    RemoteClosed,

    /// The remote peer closed the connection with an error
    #[error("Remote peer closed the connection with an error: {}", .0)]
    RemoteClosedWithError(definitions::Error),

    /// A locally detected protocol violation; sent to the peer in the
    /// close frame
    #[error("Local error: {}", .0)]
    Local(definitions::Error),
}

impl From<transport::Error> for Error {
    fn from(error: transport::Error) -> Self {
        match error {
            transport::Error::Io(err) => Error::Io(err),
            other => Error::Transport(other.into()),
        }
    }
}

impl From<definitions::AmqpError> for Error {
    fn from(condition: definitions::AmqpError) -> Self {
        Error::Local(definitions::Error::from(condition))
    }
}

/// Errors while opening a connection
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    /// IO error from the underlying stream
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The URL could not be parsed
    #[error(transparent)]
    UrlError(#[from] url::ParseError),

    /// The URL scheme is not supported
    #[error("Scheme {0:?} is not supported")]
    InvalidScheme(String),

    /// The URL does not name a host
    #[error("Invalid domain")]
    InvalidDomain,

    /// Protocol header or SASL negotiation failed
    #[error(transparent)]
    Negotiation(#[from] transport::NegotiationError),

    /// The peer answered the open frame with something else
    #[error("Expecting an open frame")]
    IllegalState,

    /// The peer closed the connection during the open handshake
    #[error("Remote peer closed the connection with an error: {}", .0)]
    RemoteClosedWithError(definitions::Error),

    /// The transport failed during the open handshake
    #[error("Transport error: {0}")]
    Transport(definitions::Error),
}

impl From<transport::Error> for OpenError {
    fn from(error: transport::Error) -> Self {
        match error {
            transport::Error::Io(err) => OpenError::Io(err),
            other => OpenError::Transport(other.into()),
        }
    }
}

/// Errors while allocating a session on a connection
#[derive(Debug, thiserror::Error)]
pub(crate) enum AllocSessionError {
    #[error("Illegal connection state")]
    IllegalState,

    #[error("All channels up to channel-max are in use")]
    ChannelMaxReached,

    #[error("The connection event loop has stopped")]
    EventLoopStopped,
}
