//! The disposition performative

use crate::codec::{Composite, Error as CodecError, FieldReader};
use crate::definitions::{DeliveryNumber, Role};
use crate::messaging::DeliveryState;
use crate::value::Value;

/// Inform the remote peer of delivery state changes.
/// <type name="disposition" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:disposition:list" code="0x00000000:0x00000015"/>
/// </type>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disposition {
    /// <field name="role" type="role" mandatory="true"/>
    pub role: Role,

    /// <field name="first" type="delivery-number" mandatory="true"/>
    pub first: DeliveryNumber,

    /// <field name="last" type="delivery-number"/>
    ///
    /// If not set, this is taken to be the same as first.
    pub last: Option<DeliveryNumber>,

    /// <field name="settled" type="boolean" default="false"/>
    pub settled: bool,

    /// <field name="state" type="*" requires="delivery-state"/>
    pub state: Option<DeliveryState>,

    /// <field name="batchable" type="boolean" default="false"/>
    pub batchable: bool,
}

impl Composite for Disposition {
    const CODE: u64 = 0x0000_0000_0000_0015;
    const NAME: &'static str = "amqp:disposition:list";

    fn to_fields(&self) -> Vec<Value> {
        vec![
            self.role.into(),
            Value::UInt(self.first),
            self.last.into(),
            Value::Bool(self.settled),
            match &self.state {
                Some(state) => state.to_value(),
                None => Value::Null,
            },
            Value::Bool(self.batchable),
        ]
    }

    fn from_fields(fields: Vec<Value>) -> Result<Self, CodecError> {
        let mut reader = FieldReader::new(fields);
        Ok(Self {
            role: reader.required("role")?,
            first: reader.required("first")?,
            last: reader.optional()?,
            settled: reader.default_or(false)?,
            state: match reader.next_value() {
                Value::Null => None,
                value => Some(DeliveryState::try_from_value(value)?),
            },
            batchable: reader.default_or(false)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::Accepted;

    #[test]
    fn disposition_round_trip() {
        let disposition = Disposition {
            role: Role::Receiver,
            first: 0,
            last: Some(4),
            settled: true,
            state: Some(DeliveryState::Accepted(Accepted {})),
            batchable: false,
        };
        let decoded = Disposition::try_from_value(disposition.to_value()).unwrap();
        assert_eq!(disposition, decoded);
    }
}
