//! The attach performative

use crate::codec::{Composite, Error as CodecError, FieldReader};
use crate::definitions::{
    self, DeliveryTag, Fields, Handle, ReceiverSettleMode, Role, SenderSettleMode, SequenceNo,
};
use crate::messaging::{DeliveryState, Source, Target};
use crate::primitives::{Array, OrderedMap, Symbol};
use crate::value::Value;

/// Attach a link to a session.
/// <type name="attach" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:attach:list" code="0x00000000:0x00000012"/>
/// </type>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attach {
    /// <field name="name" type="string" mandatory="true"/>
    ///
    /// Link names MUST be unique per direction between the two containers.
    pub name: String,

    /// <field name="handle" type="handle" mandatory="true"/>
    pub handle: Handle,

    /// <field name="role" type="role" mandatory="true"/>
    pub role: Role,

    /// <field name="snd-settle-mode" type="sender-settle-mode" default="mixed"/>
    pub snd_settle_mode: SenderSettleMode,

    /// <field name="rcv-settle-mode" type="receiver-settle-mode" default="first"/>
    pub rcv_settle_mode: ReceiverSettleMode,

    /// <field name="source" type="*" requires="source"/>
    ///
    /// A link with no source will never produce outgoing messages.
    ///
    /// Boxed to keep the `Performative` variant small.
    pub source: Option<Box<Source>>,

    /// <field name="target" type="*" requires="target"/>
    ///
    /// A link with no target will never permit incoming messages.
    pub target: Option<Box<Target>>,

    /// <field name="unsettled" type="map"/>
    pub unsettled: Option<OrderedMap<DeliveryTag, Option<DeliveryState>>>,

    /// <field name="incomplete-unsettled" type="boolean" default="false"/>
    pub incomplete_unsettled: bool,

    /// <field name="initial-delivery-count" type="sequence-no"/>
    ///
    /// MUST NOT be null if role is sender; ignored if the role is receiver.
    pub initial_delivery_count: Option<SequenceNo>,

    /// <field name="max-message-size" type="ulong"/>
    pub max_message_size: Option<u64>,

    /// <field name="offered-capabilities" type="symbol" multiple="true"/>
    pub offered_capabilities: Option<Array<Symbol>>,

    /// <field name="desired-capabilities" type="symbol" multiple="true"/>
    pub desired_capabilities: Option<Array<Symbol>>,

    /// <field name="properties" type="fields"/>
    pub properties: Option<Fields>,
}

impl Composite for Attach {
    const CODE: u64 = 0x0000_0000_0000_0012;
    const NAME: &'static str = "amqp:attach:list";

    fn to_fields(&self) -> Vec<Value> {
        let unsettled = match &self.unsettled {
            Some(map) => Value::Map(
                map.iter()
                    .map(|(tag, state)| {
                        let state = match state {
                            Some(state) => state.to_value(),
                            None => Value::Null,
                        };
                        (Value::Binary(tag.clone()), state)
                    })
                    .collect(),
            ),
            None => Value::Null,
        };

        vec![
            Value::String(self.name.clone()),
            Value::UInt(self.handle),
            self.role.into(),
            self.snd_settle_mode.into(),
            self.rcv_settle_mode.into(),
            match &self.source {
                Some(source) => source.to_value(),
                None => Value::Null,
            },
            match &self.target {
                Some(target) => target.to_value(),
                None => Value::Null,
            },
            unsettled,
            Value::Bool(self.incomplete_unsettled),
            self.initial_delivery_count.into(),
            self.max_message_size.into(),
            definitions::symbol_array_to_value(self.offered_capabilities.as_ref()),
            definitions::symbol_array_to_value(self.desired_capabilities.as_ref()),
            definitions::fields_to_value(self.properties.as_ref()),
        ]
    }

    fn from_fields(fields: Vec<Value>) -> Result<Self, CodecError> {
        let mut reader = FieldReader::new(fields);
        Ok(Self {
            name: reader.required("name")?,
            handle: reader.required("handle")?,
            role: reader.required("role")?,
            snd_settle_mode: reader.default_or(SenderSettleMode::Mixed)?,
            rcv_settle_mode: reader.default_or(ReceiverSettleMode::First)?,
            source: match reader.next_value() {
                Value::Null => None,
                value => Some(Box::new(Source::try_from_value(value)?)),
            },
            target: match reader.next_value() {
                Value::Null => None,
                value => Some(Box::new(Target::try_from_value(value)?)),
            },
            unsettled: match reader.next_value() {
                Value::Null => None,
                Value::Map(map) => {
                    let mut unsettled = OrderedMap::new();
                    for (key, val) in map.into_iter() {
                        let found = key.type_name();
                        let tag: DeliveryTag =
                            key.try_into().map_err(|_| CodecError::TypeMismatch {
                                expecting: "delivery-tag",
                                found,
                            })?;
                        let state = match val {
                            Value::Null => None,
                            val => Some(DeliveryState::try_from_value(val)?),
                        };
                        unsettled.insert(tag, state);
                    }
                    Some(unsettled)
                }
                other => {
                    return Err(CodecError::TypeMismatch {
                        expecting: "map",
                        found: other.type_name(),
                    })
                }
            },
            incomplete_unsettled: reader.default_or(false)?,
            initial_delivery_count: reader.optional()?,
            max_message_size: reader.optional()?,
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
    fn attach_round_trip() {
        let attach = Attach {
            name: "sender-link-1".to_string(),
            handle: 0,
            role: Role::Sender,
            snd_settle_mode: SenderSettleMode::Unsettled,
            rcv_settle_mode: ReceiverSettleMode::First,
            source: Some(Box::new(Source::default())),
            target: Some(Box::new(Target::from("q1"))),
            unsettled: None,
            incomplete_unsettled: false,
            initial_delivery_count: Some(0),
            max_message_size: Some(1024 * 1024),
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        };
        let decoded = Attach::try_from_value(attach.to_value()).unwrap();
        assert_eq!(attach, decoded);
    }
}
