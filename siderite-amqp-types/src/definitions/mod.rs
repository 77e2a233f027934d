//! Definitions from part 2.8 of the AMQP 1.0 specification

use crate::primitives::{Binary, OrderedMap, Symbol};
use crate::value::Value;

mod error;
mod error_cond;

pub use error::Error;
pub use error_cond::{
    AmqpError, ConnectionError, ErrorCondition, LinkError, ServiceError, SessionError,
};

/// The link handle: an unsigned 32-bit integer alias into the session's
/// handle table
pub type Handle = u32;

/// A 32-bit RFC-1982 serial number
pub type SequenceNo = u32;

/// The transfer-id of a transfer frame (session scope)
pub type TransferNumber = SequenceNo;

/// The delivery-id of a delivery (session scope)
pub type DeliveryNumber = SequenceNo;

/// The delivery-tag of a delivery (link scope), up to 32 octets
pub type DeliveryTag = Binary;

/// A duration in milliseconds
pub type Milliseconds = u32;

/// A duration in seconds
pub type Seconds = u32;

/// The message-format field of a transfer frame
pub type MessageFormat = u32;

/// An IETF language tag (BCP-47) as a symbol
pub type IetfLanguageTag = Symbol;

/// A mapping from field name to value, keyed by symbol
pub type Fields = OrderedMap<Symbol, Value>;

/// Major version of the implemented protocol
pub const MAJOR: u8 = 1;

/// Minor version of the implemented protocol
pub const MINOR: u8 = 0;

/// Revision of the implemented protocol
pub const REVISION: u8 = 0;

/// The smallest max-frame-size a peer is allowed to announce; frames of up
/// to this size must always be accepted
pub const MIN_MAX_FRAME_SIZE: usize = 512;

/// IANA-assigned port for AMQP over TCP
pub const AMQP_PORT: u16 = 5672;

/// IANA-assigned port for AMQP over TLS
pub const AMQP_TLS_PORT: u16 = 5671;

/// The role of a link endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Role {
    /// The sending endpoint, encoded as `false`
    #[default]
    Sender,

    /// The receiving endpoint, encoded as `true`
    Receiver,
}

impl From<Role> for Value {
    fn from(role: Role) -> Self {
        Value::Bool(matches!(role, Role::Receiver))
    }
}

impl TryFrom<Value> for Role {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Bool(false) => Ok(Role::Sender),
            Value::Bool(true) => Ok(Role::Receiver),
            _ => Err(value),
        }
    }
}

/// The delivery settlement policy of a sender
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SenderSettleMode {
    /// The sender will send all deliveries initially unsettled
    Unsettled,

    /// The sender will send all deliveries settled to the receiver
    Settled,

    /// The sender MAY send a mixture of settled and unsettled deliveries
    #[default]
    Mixed,
}

impl From<SenderSettleMode> for Value {
    fn from(mode: SenderSettleMode) -> Self {
        Value::UByte(match mode {
            SenderSettleMode::Unsettled => 0,
            SenderSettleMode::Settled => 1,
            SenderSettleMode::Mixed => 2,
        })
    }
}

impl TryFrom<Value> for SenderSettleMode {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::UByte(0) => Ok(SenderSettleMode::Unsettled),
            Value::UByte(1) => Ok(SenderSettleMode::Settled),
            Value::UByte(2) => Ok(SenderSettleMode::Mixed),
            _ => Err(value),
        }
    }
}

/// The delivery settlement policy of a receiver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReceiverSettleMode {
    /// The receiver will spontaneously settle all incoming transfers
    #[default]
    First,

    /// The receiver will only settle after sending the disposition to the
    /// sender and receiving a disposition indicating settlement of the
    /// delivery from the sender
    Second,
}

impl From<ReceiverSettleMode> for Value {
    fn from(mode: ReceiverSettleMode) -> Self {
        Value::UByte(match mode {
            ReceiverSettleMode::First => 0,
            ReceiverSettleMode::Second => 1,
        })
    }
}

impl TryFrom<Value> for ReceiverSettleMode {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::UByte(0) => Ok(ReceiverSettleMode::First),
            Value::UByte(1) => Ok(ReceiverSettleMode::Second),
            _ => Err(value),
        }
    }
}

pub(crate) fn fields_to_value(fields: Option<&Fields>) -> Value {
    match fields {
        Some(fields) => Value::from(fields.clone()),
        None => Value::Null,
    }
}

pub(crate) fn symbol_array_to_value(array: Option<&crate::primitives::Array<Symbol>>) -> Value {
    match array {
        Some(array) => Value::from(array.clone()),
        None => Value::Null,
    }
}
