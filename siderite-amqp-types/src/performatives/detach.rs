//! The detach performative

use crate::codec::{Composite, Error as CodecError, FieldReader};
use crate::definitions::{self, Handle};
use crate::value::Value;

/// Detach the link endpoint from the session.
/// <type name="detach" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:detach:list" code="0x00000000:0x00000016"/>
/// </type>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detach {
    /// <field name="handle" type="handle" mandatory="true"/>
    pub handle: Handle,

    /// <field name="closed" type="boolean" default="false"/>
    ///
    /// A closing detach discards the link endpoint and its unsettled state;
    /// a non-closing detach keeps them available for resume.
    pub closed: bool,

    /// <field name="error" type="error"/>
    pub error: Option<definitions::Error>,
}

impl Composite for Detach {
    const CODE: u64 = 0x0000_0000_0000_0016;
    const NAME: &'static str = "amqp:detach:list";

    fn to_fields(&self) -> Vec<Value> {
        vec![
            Value::UInt(self.handle),
            Value::Bool(self.closed),
            match &self.error {
                Some(error) => error.to_value(),
                None => Value::Null,
            },
        ]
    }

    fn from_fields(fields: Vec<Value>) -> Result<Self, CodecError> {
        let mut reader = FieldReader::new(fields);
        Ok(Self {
            handle: reader.required("handle")?,
            closed: reader.default_or(false)?,
            error: match reader.next_value() {
                Value::Null => None,
                value => Some(definitions::Error::try_from_value(value)?),
            },
        })
    }
}
