//! The response trait of the management protocol

use siderite_amqp_types::messaging::Message;

use crate::error::Error;

/// A management response.
///
/// Status verification happens in the client, which knows the configured
/// status-code key names; the response only decodes the message.
pub trait Response: Sized {
    /// The status code the operation normally completes with. Any 2xx
    /// code is treated as success regardless.
    const STATUS_CODE: u16;

    /// Decodes the response from the correlated message. The status
    /// properties have already been verified and removed.
    fn decode_message(message: Message) -> Result<Self, Error>;
}
