//! Management errors

use siderite_amqp::link::{AttachError as LinkAttachError, DetachError, SendError};
use siderite_amqp_types::messaging::Outcome;

use crate::status::StatusCode;

/// Errors while attaching the management links
#[derive(Debug, thiserror::Error)]
pub enum AttachError {
    /// The request sender could not be attached
    #[error("Failed to attach the request sender: {0}")]
    Sender(LinkAttachError),

    /// The response receiver could not be attached
    #[error("Failed to attach the response receiver: {0}")]
    Receiver(LinkAttachError),
}

/// Errors of a management operation
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request could not be sent
    #[error(transparent)]
    Send(#[from] SendError),

    /// The request was not accepted by the management node
    #[error("The request message was not accepted: {0:?}")]
    NotAccepted(Outcome),

    /// The client was closed while the operation was outstanding
    #[error("The management client was closed before a response arrived")]
    InstanceClosed,

    /// The response carried a non-success status code
    #[error("Status {code}: {}", .description.as_deref().unwrap_or(""))]
    Status {
        /// The status code of the response
        code: StatusCode,

        /// The status description of the response, if any
        description: Option<String>,
    },

    /// The response did not carry a status code under the expected key
    #[error("The response carries no status code")]
    StatusCodeNotFound,

    /// The response could not be decoded
    #[error(transparent)]
    Decode(#[from] siderite_amqp_types::codec::Error),

    /// A field of the response has an unexpected type
    #[error("Invalid type: expecting {expecting}")]
    InvalidType {
        /// What the field was expected to hold
        expecting: &'static str,
    },

    /// Closing one of the links failed
    #[error(transparent)]
    Detach(#[from] DetachError),
}
