//! Encoder and decoder for the AMQP 1.0 type system

mod decode;
mod encode;
mod error;
mod format_code;

pub use decode::Reader;
pub use error::Error;
pub use format_code::FormatCode;

use bytes::BytesMut;

use crate::value::{Described, Descriptor, Value};

/// A composite type: a described list with a declared descriptor identity.
///
/// Every performative, message section and delivery state implements this.
/// Encoding trims trailing null fields; decoding tolerates short lists by
/// treating missing trailing fields as null, per the composite type rules of
/// part 1.3 of the specification.
pub trait Composite: Sized {
    /// Numeric descriptor code
    const CODE: u64;

    /// Symbolic descriptor name
    const NAME: &'static str;

    /// The fields, in declaration order, as values
    fn to_fields(&self) -> Vec<Value>;

    /// Rebuilds the record from decoded fields. Missing trailing fields are
    /// passed as `Value::Null`.
    fn from_fields(fields: Vec<Value>) -> Result<Self, Error>;

    /// The described-list value of this record
    fn to_value(&self) -> Value {
        let mut fields = self.to_fields();
        while let Some(Value::Null) = fields.last() {
            fields.pop();
        }
        Value::Described(Box::new(Described {
            descriptor: Descriptor::Code(Self::CODE),
            value: Value::List(fields),
        }))
    }

    /// Parses the record out of a described-list value
    fn try_from_value(value: Value) -> Result<Self, Error> {
        let described = match value {
            Value::Described(described) => *described,
            other => {
                return Err(Error::TypeMismatch {
                    expecting: Self::NAME,
                    found: other.type_name(),
                })
            }
        };
        if !described.descriptor.matches(Self::CODE, Self::NAME) {
            return Err(Error::UnexpectedDescriptor(described.descriptor.to_string()));
        }
        match described.value {
            Value::List(fields) => Self::from_fields(fields),
            // some encoders emit `list0`-equivalent null bodies
            Value::Null => Self::from_fields(Vec::new()),
            other => Err(Error::TypeMismatch {
                expecting: "list",
                found: other.type_name(),
            }),
        }
    }

    /// Encodes the record into the buffer
    fn encode(&self, buf: &mut BytesMut) -> Result<(), Error> {
        self.to_value().encode(buf)
    }

    /// Decodes the record from the reader
    fn decode(reader: &mut Reader<'_>) -> Result<Self, Error> {
        Self::try_from_value(Value::decode(reader)?)
    }
}

/// Cursor over the decoded fields of a composite list. Fields past the end
/// of the encoded list read as null.
#[derive(Debug)]
pub struct FieldReader {
    iter: std::vec::IntoIter<Value>,
}

impl FieldReader {
    /// Creates a field reader over decoded fields
    pub fn new(fields: Vec<Value>) -> Self {
        Self {
            iter: fields.into_iter(),
        }
    }

    /// The next raw field value
    pub fn next_value(&mut self) -> Value {
        self.iter.next().unwrap_or(Value::Null)
    }

    /// A mandatory field; null or missing is an error
    pub fn required<T>(&mut self, name: &'static str) -> Result<T, Error>
    where
        T: TryFrom<Value, Error = Value>,
    {
        match self.next_value() {
            Value::Null => Err(Error::MandatoryFieldIsNull(name)),
            value => convert(value),
        }
    }

    /// An optional field; null or missing reads as `None`
    pub fn optional<T>(&mut self) -> Result<Option<T>, Error>
    where
        T: TryFrom<Value, Error = Value>,
    {
        match self.next_value() {
            Value::Null => Ok(None),
            value => convert(value).map(Some),
        }
    }

    /// A defaulted field; null or missing reads as the given default
    pub fn default_or<T>(&mut self, default: T) -> Result<T, Error>
    where
        T: TryFrom<Value, Error = Value>,
    {
        match self.next_value() {
            Value::Null => Ok(default),
            value => convert(value),
        }
    }
}

fn convert<T>(value: Value) -> Result<T, Error>
where
    T: TryFrom<Value, Error = Value>,
{
    let found = value.type_name();
    T::try_from(value).map_err(|_| Error::TypeMismatch {
        expecting: std::any::type_name::<T>(),
        found,
    })
}
