//! The message-id and correlation-id union

use crate::primitives::{Binary, Uuid};
use crate::value::Value;

/// A message-id or correlation-id value
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MessageId {
    /// message-id-ulong
    ULong(u64),

    /// message-id-uuid
    Uuid(Uuid),

    /// message-id-binary
    Binary(Binary),

    /// message-id-string
    String(String),
}

impl From<u64> for MessageId {
    fn from(value: u64) -> Self {
        MessageId::ULong(value)
    }
}

impl From<Uuid> for MessageId {
    fn from(value: Uuid) -> Self {
        MessageId::Uuid(value)
    }
}

impl From<Binary> for MessageId {
    fn from(value: Binary) -> Self {
        MessageId::Binary(value)
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        MessageId::String(value)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        MessageId::String(value.to_string())
    }
}

impl From<MessageId> for Value {
    fn from(id: MessageId) -> Self {
        match id {
            MessageId::ULong(v) => Value::ULong(v),
            MessageId::Uuid(v) => Value::Uuid(v),
            MessageId::Binary(v) => Value::Binary(v),
            MessageId::String(v) => Value::String(v),
        }
    }
}

impl TryFrom<Value> for MessageId {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::ULong(v) => Ok(MessageId::ULong(v)),
            Value::Uuid(v) => Ok(MessageId::Uuid(v)),
            Value::Binary(v) => Ok(MessageId::Binary(v)),
            Value::String(v) => Ok(MessageId::String(v)),
            _ => Err(value),
        }
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageId::ULong(v) => write!(f, "{}", v),
            MessageId::Uuid(v) => write!(f, "{}", v),
            MessageId::Binary(v) => write!(f, "{:x?}", v.as_slice()),
            MessageId::String(v) => write!(f, "{}", v),
        }
    }
}
