//! The begin performative

use crate::codec::{Composite, Error as CodecError, FieldReader};
use crate::definitions::{self, Fields, Handle, TransferNumber};
use crate::primitives::{Array, Symbol};
use crate::value::Value;

/// Begin a session on a channel.
/// <type name="begin" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:begin:list" code="0x00000000:0x00000011"/>
/// </type>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Begin {
    /// <field name="remote-channel" type="ushort"/>
    ///
    /// MUST NOT be set when the session is locally initiated; MUST be set to
    /// the channel of the remote begin when answering a remotely initiated
    /// session.
    pub remote_channel: Option<u16>,

    /// <field name="next-outgoing-id" type="transfer-number" mandatory="true"/>
    pub next_outgoing_id: TransferNumber,

    /// <field name="incoming-window" type="uint" mandatory="true"/>
    pub incoming_window: u32,

    /// <field name="outgoing-window" type="uint" mandatory="true"/>
    pub outgoing_window: u32,

    /// <field name="handle-max" type="handle" default="4294967295"/>
    pub handle_max: Handle,

    /// <field name="offered-capabilities" type="symbol" multiple="true"/>
    pub offered_capabilities: Option<Array<Symbol>>,

    /// <field name="desired-capabilities" type="symbol" multiple="true"/>
    pub desired_capabilities: Option<Array<Symbol>>,

    /// <field name="properties" type="fields"/>
    pub properties: Option<Fields>,
}

impl Composite for Begin {
    const CODE: u64 = 0x0000_0000_0000_0011;
    const NAME: &'static str = "amqp:begin:list";

    fn to_fields(&self) -> Vec<Value> {
        vec![
            self.remote_channel.into(),
            Value::UInt(self.next_outgoing_id),
            Value::UInt(self.incoming_window),
            Value::UInt(self.outgoing_window),
            Value::UInt(self.handle_max),
            definitions::symbol_array_to_value(self.offered_capabilities.as_ref()),
            definitions::symbol_array_to_value(self.desired_capabilities.as_ref()),
            definitions::fields_to_value(self.properties.as_ref()),
        ]
    }

    fn from_fields(fields: Vec<Value>) -> Result<Self, CodecError> {
        let mut reader = FieldReader::new(fields);
        Ok(Self {
            remote_channel: reader.optional()?,
            next_outgoing_id: reader.required("next-outgoing-id")?,
            incoming_window: reader.required("incoming-window")?,
            outgoing_window: reader.required("outgoing-window")?,
            handle_max: reader.default_or(u32::MAX)?,
            offered_capabilities: reader.optional()?,
            desired_capabilities: reader.optional()?,
            properties: reader.optional()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_round_trip() {
        let begin = Begin {
            remote_channel: None,
            next_outgoing_id: 0,
            incoming_window: 2048,
            outgoing_window: 2048,
            handle_max: 255,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        };
        let decoded = Begin::try_from_value(begin.to_value()).unwrap();
        assert_eq!(begin, decoded);
    }
}
