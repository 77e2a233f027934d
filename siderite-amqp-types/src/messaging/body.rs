//! Body sections of a message

use crate::codec::Error as CodecError;
use crate::primitives::Binary;
use crate::value::{Described, Descriptor, Value};

/// A data section: opaque binary data.
/// <descriptor name="amqp:data:binary" code="0x00000000:0x00000075"/>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Data(pub Binary);

impl Data {
    /// Numeric descriptor code
    pub const CODE: u64 = 0x0000_0000_0000_0075;

    /// Symbolic descriptor name
    pub const NAME: &'static str = "amqp:data:binary";

    /// The described value of this section
    pub fn to_value(&self) -> Value {
        Value::Described(Box::new(Described {
            descriptor: Descriptor::Code(Self::CODE),
            value: Value::Binary(self.0.clone()),
        }))
    }
}

impl From<Binary> for Data {
    fn from(binary: Binary) -> Self {
        Self(binary)
    }
}

/// A sequence section: a list of values.
/// <descriptor name="amqp:amqp-sequence:list" code="0x00000000:0x00000076"/>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmqpSequence(pub Vec<Value>);

impl AmqpSequence {
    /// Numeric descriptor code
    pub const CODE: u64 = 0x0000_0000_0000_0076;

    /// Symbolic descriptor name
    pub const NAME: &'static str = "amqp:amqp-sequence:list";

    /// The described value of this section
    pub fn to_value(&self) -> Value {
        Value::Described(Box::new(Described {
            descriptor: Descriptor::Code(Self::CODE),
            value: Value::List(self.0.clone()),
        }))
    }
}

impl From<Vec<Value>> for AmqpSequence {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

/// A value section: a single value.
/// <descriptor name="amqp:amqp-value:*" code="0x00000000:0x00000077"/>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmqpValue(pub Value);

impl AmqpValue {
    /// Numeric descriptor code
    pub const CODE: u64 = 0x0000_0000_0000_0077;

    /// Symbolic descriptor name
    pub const NAME: &'static str = "amqp:amqp-value:*";

    /// The described value of this section
    pub fn to_value(&self) -> Value {
        Value::Described(Box::new(Described {
            descriptor: Descriptor::Code(Self::CODE),
            value: self.0.clone(),
        }))
    }
}

impl From<Value> for AmqpValue {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// The body of a message: zero or more data sections, zero or more sequence
/// sections, or exactly one value section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Body {
    /// No body section at all
    #[default]
    Nothing,

    /// One or more data sections
    Data(Vec<Data>),

    /// One or more sequence sections
    Sequence(Vec<AmqpSequence>),

    /// Exactly one value section
    Value(AmqpValue),
}

impl Body {
    /// Whether no body section is present
    pub fn is_nothing(&self) -> bool {
        matches!(self, Body::Nothing)
    }

    /// Consumes the body and returns the value, if the body is a value
    /// section
    pub fn try_into_value(self) -> Result<Value, CodecError> {
        match self {
            Body::Value(AmqpValue(value)) => Ok(value),
            other => Err(CodecError::TypeMismatch {
                expecting: "amqp-value body",
                found: match other {
                    Body::Nothing => "no body",
                    Body::Data(_) => "data body",
                    Body::Sequence(_) => "amqp-sequence body",
                    Body::Value(_) => unreachable!(),
                },
            }),
        }
    }

    /// Consumes the body and returns the concatenated data sections, if the
    /// body is made of data sections
    pub fn try_into_data(self) -> Result<Vec<Binary>, CodecError> {
        match self {
            Body::Data(data) => Ok(data.into_iter().map(|Data(binary)| binary).collect()),
            other => Err(CodecError::TypeMismatch {
                expecting: "data body",
                found: match other {
                    Body::Nothing => "no body",
                    Body::Data(_) => unreachable!(),
                    Body::Sequence(_) => "amqp-sequence body",
                    Body::Value(_) => "amqp-value body",
                },
            }),
        }
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Value(AmqpValue(value))
    }
}

impl From<AmqpValue> for Body {
    fn from(value: AmqpValue) -> Self {
        Body::Value(value)
    }
}

impl From<Data> for Body {
    fn from(data: Data) -> Self {
        Body::Data(vec![data])
    }
}

impl From<AmqpSequence> for Body {
    fn from(sequence: AmqpSequence) -> Self {
        Body::Sequence(vec![sequence])
    }
}

impl From<&str> for Body {
    fn from(value: &str) -> Self {
        Body::Value(AmqpValue(Value::from(value)))
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Body::Value(AmqpValue(Value::from(value)))
    }
}
