//! The flow performative

use crate::codec::{Composite, Error as CodecError, FieldReader};
use crate::definitions::{self, Fields, Handle, SequenceNo, TransferNumber};
use crate::value::Value;

/// Update the flow state for the session and, optionally, a link.
/// <type name="flow" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:flow:list" code="0x00000000:0x00000013"/>
/// </type>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flow {
    /// <field name="next-incoming-id" type="transfer-number"/>
    ///
    /// Identifies the expected transfer-id of the next incoming transfer
    /// frame. MUST be set if the peer has received the begin frame.
    pub next_incoming_id: Option<TransferNumber>,

    /// <field name="incoming-window" type="uint" mandatory="true"/>
    pub incoming_window: u32,

    /// <field name="next-outgoing-id" type="transfer-number" mandatory="true"/>
    pub next_outgoing_id: TransferNumber,

    /// <field name="outgoing-window" type="uint" mandatory="true"/>
    pub outgoing_window: u32,

    /// <field name="handle" type="handle"/>
    ///
    /// If set, the flow frame carries link flow state in addition to the
    /// session flow state.
    pub handle: Option<Handle>,

    /// <field name="delivery-count" type="sequence-no"/>
    ///
    /// MUST be set if the handle field is set and the sender is the issuer.
    pub delivery_count: Option<SequenceNo>,

    /// <field name="link-credit" type="uint"/>
    pub link_credit: Option<u32>,

    /// <field name="available" type="uint"/>
    pub available: Option<u32>,

    /// <field name="drain" type="boolean" default="false"/>
    pub drain: bool,

    /// <field name="echo" type="boolean" default="false"/>
    pub echo: bool,

    /// <field name="properties" type="fields"/>
    pub properties: Option<Fields>,
}

impl Composite for Flow {
    const CODE: u64 = 0x0000_0000_0000_0013;
    const NAME: &'static str = "amqp:flow:list";

    fn to_fields(&self) -> Vec<Value> {
        vec![
            self.next_incoming_id.into(),
            Value::UInt(self.incoming_window),
            Value::UInt(self.next_outgoing_id),
            Value::UInt(self.outgoing_window),
            self.handle.into(),
            self.delivery_count.into(),
            self.link_credit.into(),
            self.available.into(),
            Value::Bool(self.drain),
            Value::Bool(self.echo),
            definitions::fields_to_value(self.properties.as_ref()),
        ]
    }

    fn from_fields(fields: Vec<Value>) -> Result<Self, CodecError> {
        let mut reader = FieldReader::new(fields);
        Ok(Self {
            next_incoming_id: reader.optional()?,
            incoming_window: reader.required("incoming-window")?,
            next_outgoing_id: reader.required("next-outgoing-id")?,
            outgoing_window: reader.required("outgoing-window")?,
            handle: reader.optional()?,
            delivery_count: reader.optional()?,
            link_credit: reader.optional()?,
            available: reader.optional()?,
            drain: reader.default_or(false)?,
            echo: reader.default_or(false)?,
            properties: reader.optional()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_round_trip() {
        let flow = Flow {
            next_incoming_id: Some(1),
            incoming_window: 2048,
            next_outgoing_id: 1,
            outgoing_window: 2048,
            handle: Some(0),
            delivery_count: Some(0),
            link_credit: Some(100),
            available: None,
            drain: false,
            echo: false,
            properties: None,
        };
        let decoded = Flow::try_from_value(flow.to_value()).unwrap();
        assert_eq!(flow, decoded);
    }
}
