//! The transfer performative

use crate::codec::{Composite, Error as CodecError, FieldReader};
use crate::definitions::{
    DeliveryNumber, DeliveryTag, Handle, MessageFormat, ReceiverSettleMode,
};
use crate::messaging::DeliveryState;
use crate::value::Value;

/// Transfer a message.
/// <type name="transfer" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:transfer:list" code="0x00000000:0x00000014"/>
/// </type>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transfer {
    /// <field name="handle" type="handle" mandatory="true"/>
    pub handle: Handle,

    /// <field name="delivery-id" type="delivery-number"/>
    ///
    /// MUST be set on the first transfer of a multi-transfer delivery; on
    /// continuation transfers the value MUST be omitted or match the first.
    pub delivery_id: Option<DeliveryNumber>,

    /// <field name="delivery-tag" type="delivery-tag"/>
    pub delivery_tag: Option<DeliveryTag>,

    /// <field name="message-format" type="message-format"/>
    ///
    /// MUST be specified on the first transfer of a multi-transfer delivery.
    pub message_format: Option<MessageFormat>,

    /// <field name="settled" type="boolean"/>
    ///
    /// If not set on the first (or only) transfer for a delivery, the
    /// settled flag MUST be interpreted as being false.
    pub settled: Option<bool>,

    /// <field name="more" type="boolean" default="false"/>
    ///
    /// Note that if both the more and aborted fields are set to true, the
    /// aborted field takes precedence.
    pub more: bool,

    /// <field name="rcv-settle-mode" type="receiver-settle-mode"/>
    pub rcv_settle_mode: Option<ReceiverSettleMode>,

    /// <field name="state" type="*" requires="delivery-state"/>
    pub state: Option<DeliveryState>,

    /// <field name="resume" type="boolean" default="false"/>
    pub resume: bool,

    /// <field name="aborted" type="boolean" default="false"/>
    pub aborted: bool,

    /// <field name="batchable" type="boolean" default="false"/>
    pub batchable: bool,
}

impl Composite for Transfer {
    const CODE: u64 = 0x0000_0000_0000_0014;
    const NAME: &'static str = "amqp:transfer:list";

    fn to_fields(&self) -> Vec<Value> {
        vec![
            Value::UInt(self.handle),
            self.delivery_id.into(),
            self.delivery_tag.clone().into(),
            self.message_format.into(),
            self.settled.into(),
            Value::Bool(self.more),
            self.rcv_settle_mode.into(),
            match &self.state {
                Some(state) => state.to_value(),
                None => Value::Null,
            },
            Value::Bool(self.resume),
            Value::Bool(self.aborted),
            Value::Bool(self.batchable),
        ]
    }

    fn from_fields(fields: Vec<Value>) -> Result<Self, CodecError> {
        let mut reader = FieldReader::new(fields);
        Ok(Self {
            handle: reader.required("handle")?,
            delivery_id: reader.optional()?,
            delivery_tag: reader.optional()?,
            message_format: reader.optional()?,
            settled: reader.optional()?,
            more: reader.default_or(false)?,
            rcv_settle_mode: reader.optional()?,
            state: match reader.next_value() {
                Value::Null => None,
                value => Some(DeliveryState::try_from_value(value)?),
            },
            resume: reader.default_or(false)?,
            aborted: reader.default_or(false)?,
            batchable: reader.default_or(false)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::Binary;

    #[test]
    fn transfer_round_trip() {
        let transfer = Transfer {
            handle: 0,
            delivery_id: Some(3),
            delivery_tag: Some(Binary::from(vec![0, 0, 0, 3])),
            message_format: Some(0),
            settled: Some(false),
            more: true,
            ..Default::default()
        };
        let decoded = Transfer::try_from_value(transfer.to_value()).unwrap();
        assert_eq!(transfer, decoded);
    }
}
