//! The close performative

use crate::codec::{Composite, Error as CodecError, FieldReader};
use crate::definitions;
use crate::value::Value;

/// Signal a connection close.
/// <type name="close" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:close:list" code="0x00000000:0x00000018"/>
/// </type>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Close {
    /// <field name="error" type="error"/>
    pub error: Option<definitions::Error>,
}

impl Composite for Close {
    const CODE: u64 = 0x0000_0000_0000_0018;
    const NAME: &'static str = "amqp:close:list";

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
