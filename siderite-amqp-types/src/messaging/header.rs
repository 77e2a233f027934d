//! The header section of a message

use crate::codec::{Composite, Error as CodecError, FieldReader};
use crate::definitions::Milliseconds;
use crate::value::Value;

/// Relative message priority; default 4
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority(pub u8);

impl Default for Priority {
    fn default() -> Self {
        Self(4)
    }
}

impl From<u8> for Priority {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl From<Priority> for u8 {
    fn from(value: Priority) -> Self {
        value.0
    }
}

/// Transport headers for a message.
/// <type name="header" class="composite" source="list" provides="section">
///     <descriptor name="amqp:header:list" code="0x00000000:0x00000070"/>
/// </type>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    /// <field name="durable" type="boolean" default="false"/>
    pub durable: bool,

    /// <field name="priority" type="ubyte" default="4"/>
    pub priority: Priority,

    /// <field name="ttl" type="milliseconds"/>
    pub ttl: Option<Milliseconds>,

    /// <field name="first-acquirer" type="boolean" default="false"/>
    pub first_acquirer: bool,

    /// <field name="delivery-count" type="uint" default="0"/>
    pub delivery_count: u32,
}

impl Composite for Header {
    const CODE: u64 = 0x0000_0000_0000_0070;
    const NAME: &'static str = "amqp:header:list";

    fn to_fields(&self) -> Vec<Value> {
        vec![
            Value::Bool(self.durable),
            Value::UByte(self.priority.0),
            self.ttl.into(),
            Value::Bool(self.first_acquirer),
            Value::UInt(self.delivery_count),
        ]
    }

    fn from_fields(fields: Vec<Value>) -> Result<Self, CodecError> {
        let mut reader = FieldReader::new(fields);
        Ok(Self {
            durable: reader.default_or(false)?,
            priority: reader.default_or(4u8)?.into(),
            ttl: reader.optional()?,
            first_acquirer: reader.default_or(false)?,
            delivery_count: reader.default_or(0u32)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_specification() {
        let header = Header::default();
        assert!(!header.durable);
        assert_eq!(header.priority.0, 4);
        assert_eq!(header.delivery_count, 0);
    }

    #[test]
    fn header_round_trip() {
        let header = Header {
            durable: true,
            priority: Priority(9),
            ttl: Some(30_000),
            first_acquirer: false,
            delivery_count: 2,
        };
        let decoded = Header::try_from_value(header.to_value()).unwrap();
        assert_eq!(header, decoded);
    }
}
