//! Transport errors

use std::io;

use siderite_amqp_types::definitions;

/// Errors on the established transport
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error from the underlying stream
    #[error(transparent)]
    Io(#[from] io::Error),

    /// No frame was received within the local idle timeout
    #[error("Idle timeout expired")]
    IdleTimeoutElapsed,

    /// A frame could not be encoded or decoded
    #[error(transparent)]
    Framing(#[from] crate::frames::Error),
}

impl From<Error> for definitions::Error {
    fn from(error: Error) -> Self {
        use siderite_amqp_types::definitions::{AmqpError, ConnectionError};

        match error {
            Error::Io(err) => definitions::Error::new(
                AmqpError::InternalError,
                Some(err.to_string()),
                None,
            ),
            Error::IdleTimeoutElapsed => definitions::Error::new(
                AmqpError::ResourceLimitExceeded,
                Some("Idle timeout expired".to_string()),
                None,
            ),
            Error::Framing(err) => definitions::Error::new(
                ConnectionError::FramingError,
                Some(err.to_string()),
                None,
            ),
        }
    }
}

/// Errors during protocol header or SASL negotiation
#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    /// IO error from the underlying stream
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The incoming bytes are not a protocol header
    #[error("Invalid protocol header {0:?}")]
    InvalidProtocolHeader([u8; 8]),

    /// The peer answered with a different protocol header
    #[error("Protocol header mismatch {0:?}")]
    ProtocolHeaderMismatch([u8; 8]),

    /// The stream closed before negotiation finished
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// The peer does not support the requested SASL mechanism
    #[error("SASL mechanism not supported by peer")]
    MechanismNotSupported,

    /// The peer declined the SASL exchange
    #[error("SASL outcome code {0:?}")]
    SaslOutcome(siderite_amqp_types::sasl::SaslCode),

    /// Negotiation was attempted in an illegal connection state
    #[error("Illegal connection state")]
    IllegalState,

    /// A SASL frame could not be encoded or decoded
    #[error(transparent)]
    Framing(#[from] crate::frames::Error),

    /// The negotiation step is defined but not supported here
    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),
}
