//! Delivery states and outcomes

use crate::codec::{Composite, Error as CodecError, FieldReader};
use crate::definitions::{self, Fields, SequenceNo};
use crate::value::Value;

/// Partial message data seen by the receiver so far
/// <descriptor name="amqp:received:list" code="0x00000000:0x00000023"/>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Received {
    /// The section of the message this state refers to
    pub section_number: SequenceNo,

    /// First unreceived byte within the section
    pub section_offset: u64,
}

impl Composite for Received {
    const CODE: u64 = 0x0000_0000_0000_0023;
    const NAME: &'static str = "amqp:received:list";

    fn to_fields(&self) -> Vec<Value> {
        vec![
            Value::UInt(self.section_number),
            Value::ULong(self.section_offset),
        ]
    }

    fn from_fields(fields: Vec<Value>) -> Result<Self, CodecError> {
        let mut reader = FieldReader::new(fields);
        Ok(Self {
            section_number: reader.required("section-number")?,
            section_offset: reader.required("section-offset")?,
        })
    }
}

/// The delivery reached its terminal outcome successfully
/// <descriptor name="amqp:accepted:list" code="0x00000000:0x00000024"/>
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Accepted {}

impl Composite for Accepted {
    const CODE: u64 = 0x0000_0000_0000_0024;
    const NAME: &'static str = "amqp:accepted:list";

    fn to_fields(&self) -> Vec<Value> {
        Vec::new()
    }

    fn from_fields(_fields: Vec<Value>) -> Result<Self, CodecError> {
        Ok(Self {})
    }
}

/// The message was rejected as invalid and unprocessable
/// <descriptor name="amqp:rejected:list" code="0x00000000:0x00000025"/>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rejected {
    /// The reason for the rejection
    pub error: Option<definitions::Error>,
}

impl Composite for Rejected {
    const CODE: u64 = 0x0000_0000_0000_0025;
    const NAME: &'static str = "amqp:rejected:list";

    fn to_fields(&self) -> Vec<Value> {
        vec![match &self.error {
            Some(error) => error.to_value(),
            None => Value::Null,
        }]
    }

    fn from_fields(fields: Vec<Value>) -> Result<Self, CodecError> {
        let mut reader = FieldReader::new(fields);
        let error = match reader.next_value() {
            Value::Null => None,
            value => Some(definitions::Error::try_from_value(value)?),
        };
        Ok(Self { error })
    }
}

/// The message was not and will not be acted upon
/// <descriptor name="amqp:released:list" code="0x00000000:0x00000026"/>
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Released {}

impl Composite for Released {
    const CODE: u64 = 0x0000_0000_0000_0026;
    const NAME: &'static str = "amqp:released:list";

    fn to_fields(&self) -> Vec<Value> {
        Vec::new()
    }

    fn from_fields(_fields: Vec<Value>) -> Result<Self, CodecError> {
        Ok(Self {})
    }
}

/// The message was modified but not processed
/// <descriptor name="amqp:modified:list" code="0x00000000:0x00000027"/>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Modified {
    /// The delivery count of the message should be incremented
    pub delivery_failed: Option<bool>,

    /// The message should not be redelivered on this link
    pub undeliverable_here: Option<bool>,

    /// Annotations to combine with existing message-annotations
    pub message_annotations: Option<Fields>,
}

impl Composite for Modified {
    const CODE: u64 = 0x0000_0000_0000_0027;
    const NAME: &'static str = "amqp:modified:list";

    fn to_fields(&self) -> Vec<Value> {
        vec![
            self.delivery_failed.into(),
            self.undeliverable_here.into(),
            definitions::fields_to_value(self.message_annotations.as_ref()),
        ]
    }

    fn from_fields(fields: Vec<Value>) -> Result<Self, CodecError> {
        let mut reader = FieldReader::new(fields);
        Ok(Self {
            delivery_failed: reader.optional()?,
            undeliverable_here: reader.optional()?,
            message_annotations: reader.optional()?,
        })
    }
}

/// A terminal outcome of a delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// amqp:accepted:list
    Accepted(Accepted),

    /// amqp:rejected:list
    Rejected(Rejected),

    /// amqp:released:list
    Released(Released),

    /// amqp:modified:list
    Modified(Modified),
}

impl Outcome {
    /// Whether the outcome is `Accepted`
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted(_))
    }

    /// Returns the accepted outcome or maps the others through `op`
    pub fn accepted_or_else<E>(self, op: impl FnOnce(Outcome) -> E) -> Result<Accepted, E> {
        match self {
            Outcome::Accepted(accepted) => Ok(accepted),
            outcome => Err(op(outcome)),
        }
    }

    /// The described-list value of the outcome
    pub fn to_value(&self) -> Value {
        match self {
            Outcome::Accepted(state) => state.to_value(),
            Outcome::Rejected(state) => state.to_value(),
            Outcome::Released(state) => state.to_value(),
            Outcome::Modified(state) => state.to_value(),
        }
    }

    /// Parses an outcome out of a described-list value
    pub fn try_from_value(value: Value) -> Result<Self, CodecError> {
        DeliveryState::try_from_value(value)?
            .into_outcome()
            .ok_or(CodecError::TypeMismatch {
                expecting: "outcome",
                found: "amqp:received:list",
            })
    }
}

/// The state of a delivery at a link endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryState {
    /// amqp:received:list
    Received(Received),

    /// amqp:accepted:list
    Accepted(Accepted),

    /// amqp:rejected:list
    Rejected(Rejected),

    /// amqp:released:list
    Released(Released),

    /// amqp:modified:list
    Modified(Modified),
}

impl DeliveryState {
    /// Whether this state is a terminal outcome
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeliveryState::Received(_))
    }

    /// Converts into an outcome, unless the state is `Received`
    pub fn into_outcome(self) -> Option<Outcome> {
        match self {
            DeliveryState::Received(_) => None,
            DeliveryState::Accepted(state) => Some(Outcome::Accepted(state)),
            DeliveryState::Rejected(state) => Some(Outcome::Rejected(state)),
            DeliveryState::Released(state) => Some(Outcome::Released(state)),
            DeliveryState::Modified(state) => Some(Outcome::Modified(state)),
        }
    }

    /// The described-list value of the state
    pub fn to_value(&self) -> Value {
        match self {
            DeliveryState::Received(state) => state.to_value(),
            DeliveryState::Accepted(state) => state.to_value(),
            DeliveryState::Rejected(state) => state.to_value(),
            DeliveryState::Released(state) => state.to_value(),
            DeliveryState::Modified(state) => state.to_value(),
        }
    }

    /// Parses a delivery state out of a described-list value, dispatching
    /// on the descriptor
    pub fn try_from_value(value: Value) -> Result<Self, CodecError> {
        let described = match &value {
            Value::Described(described) => described,
            other => {
                return Err(CodecError::TypeMismatch {
                    expecting: "delivery-state",
                    found: other.type_name(),
                })
            }
        };

        let descriptor = &described.descriptor;
        if descriptor.matches(Received::CODE, Received::NAME) {
            Received::try_from_value(value).map(DeliveryState::Received)
        } else if descriptor.matches(Accepted::CODE, Accepted::NAME) {
            Accepted::try_from_value(value).map(DeliveryState::Accepted)
        } else if descriptor.matches(Rejected::CODE, Rejected::NAME) {
            Rejected::try_from_value(value).map(DeliveryState::Rejected)
        } else if descriptor.matches(Released::CODE, Released::NAME) {
            Released::try_from_value(value).map(DeliveryState::Released)
        } else if descriptor.matches(Modified::CODE, Modified::NAME) {
            Modified::try_from_value(value).map(DeliveryState::Modified)
        } else {
            Err(CodecError::UnexpectedDescriptor(descriptor.to_string()))
        }
    }
}

impl From<Outcome> for DeliveryState {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Accepted(state) => DeliveryState::Accepted(state),
            Outcome::Rejected(state) => DeliveryState::Rejected(state),
            Outcome::Released(state) => DeliveryState::Released(state),
            Outcome::Modified(state) => DeliveryState::Modified(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_encodes_as_empty_list() {
        let value = Accepted {}.to_value();
        let bytes = value.to_bytes().unwrap();
        // 0x00 smallulong 0x24 list0
        assert_eq!(&bytes[..], &[0x00, 0x53, 0x24, 0x45]);
    }

    #[test]
    fn delivery_state_dispatches_on_descriptor() {
        let state = DeliveryState::Modified(Modified {
            delivery_failed: Some(true),
            undeliverable_here: None,
            message_annotations: None,
        });
        let decoded = DeliveryState::try_from_value(state.to_value()).unwrap();
        assert_eq!(state, decoded);
    }

    #[test]
    fn received_is_not_terminal() {
        let state = DeliveryState::Received(Received::default());
        assert!(!state.is_terminal());
        assert!(state.into_outcome().is_none());
    }
}
