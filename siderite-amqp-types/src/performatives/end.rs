//! The end performative

use crate::codec::{Composite, Error as CodecError, FieldReader};
use crate::definitions;
use crate::value::Value;

/// End the session.
/// <type name="end" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:end:list" code="0x00000000:0x00000017"/>
/// </type>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct End {
    /// <field name="error" type="error"/>
    pub error: Option<definitions::Error>,
}

impl Composite for End {
    const CODE: u64 = 0x0000_0000_0000_0017;
    const NAME: &'static str = "amqp:end:list";

    fn to_fields(&self) -> Vec<Value> {
        vec![match &self.error {
            Some(error) => error.to_value(),
            None => Value::Null,
        }]
    }

    fn from_fields(fields: Vec<Value>) -> Result<Self, CodecError> {
        let mut reader = FieldReader::new(fields);
        Ok(Self {
            error: match reader.next_value() {
                Value::Null => None,
                value => Some(definitions::Error::try_from_value(value)?),
            },
        })
    }
}
