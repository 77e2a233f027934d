//! The open performative

use crate::codec::{Composite, Error as CodecError, FieldReader};
use crate::definitions::{self, Fields, IetfLanguageTag, Milliseconds};
use crate::primitives::{Array, Symbol};
use crate::value::Value;

/// Negotiate connection parameters.
/// <type name="open" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:open:list" code="0x00000000:0x00000010"/>
/// </type>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Open {
    /// <field name="container-id" type="string" mandatory="true"/>
    pub container_id: String,

    /// <field name="hostname" type="string"/>
    pub hostname: Option<String>,

    /// <field name="max-frame-size" type="uint" default="4294967295"/>
    pub max_frame_size: MaxFrameSize,

    /// <field name="channel-max" type="ushort" default="65535"/>
    pub channel_max: ChannelMax,

    /// <field name="idle-time-out" type="milliseconds"/>
    pub idle_time_out: Option<Milliseconds>,

    /// <field name="outgoing-locales" type="ietf-language-tag" multiple="true"/>
    pub outgoing_locales: Option<Array<IetfLanguageTag>>,

    /// <field name="incoming-locales" type="ietf-language-tag" multiple="true"/>
    pub incoming_locales: Option<Array<IetfLanguageTag>>,

    /// <field name="offered-capabilities" type="symbol" multiple="true"/>
    pub offered_capabilities: Option<Array<Symbol>>,

    /// <field name="desired-capabilities" type="symbol" multiple="true"/>
    pub desired_capabilities: Option<Array<Symbol>>,

    /// <field name="properties" type="fields"/>
    pub properties: Option<Fields>,
}

impl Composite for Open {
    const CODE: u64 = 0x0000_0000_0000_0010;
    const NAME: &'static str = "amqp:open:list";

    fn to_fields(&self) -> Vec<Value> {
        vec![
            Value::String(self.container_id.clone()),
            self.hostname.clone().into(),
            Value::UInt(self.max_frame_size.0),
            Value::UShort(self.channel_max.0),
            self.idle_time_out.into(),
            definitions::symbol_array_to_value(self.outgoing_locales.as_ref()),
            definitions::symbol_array_to_value(self.incoming_locales.as_ref()),
            definitions::symbol_array_to_value(self.offered_capabilities.as_ref()),
            definitions::symbol_array_to_value(self.desired_capabilities.as_ref()),
            definitions::fields_to_value(self.properties.as_ref()),
        ]
    }

    fn from_fields(fields: Vec<Value>) -> Result<Self, CodecError> {
        let mut reader = FieldReader::new(fields);
        Ok(Self {
            container_id: reader.required("container-id")?,
            hostname: reader.optional()?,
            max_frame_size: MaxFrameSize(reader.default_or(u32::MAX)?),
            channel_max: ChannelMax(reader.default_or(u16::MAX)?),
            idle_time_out: reader.optional()?,
            outgoing_locales: reader.optional()?,
            incoming_locales: reader.optional()?,
            offered_capabilities: reader.optional()?,
            desired_capabilities: reader.optional()?,
            properties: reader.optional()?,
        })
    }
}

/// Proposed maximum frame size.
///
/// A simple wrapper over u32 with the default set to `u32::MAX`. Both peers
/// MUST accept frames of up to 512 (MIN-MAX-FRAME-SIZE) octets; a peer that
/// receives an oversized frame MUST close the connection with the
/// framing-error condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxFrameSize(pub u32);

impl Default for MaxFrameSize {
    fn default() -> Self {
        MaxFrameSize(u32::MAX)
    }
}

impl From<u32> for MaxFrameSize {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<MaxFrameSize> for u32 {
    fn from(value: MaxFrameSize) -> Self {
        value.0
    }
}

impl From<MaxFrameSize> for usize {
    fn from(value: MaxFrameSize) -> Self {
        value.0 as usize
    }
}

/// The highest channel number that can be used on the connection.
///
/// This value plus one is the maximum number of sessions that can be
/// simultaneously active on the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMax(pub u16);

impl Default for ChannelMax {
    fn default() -> Self {
        Self(u16::MAX)
    }
}

impl From<u16> for ChannelMax {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl From<ChannelMax> for u16 {
    fn from(value: ChannelMax) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_round_trip() {
        let open = Open {
            container_id: "c1".to_string(),
            hostname: Some("example.com".to_string()),
            max_frame_size: MaxFrameSize(65_536),
            channel_max: ChannelMax(9),
            idle_time_out: Some(60_000),
            ..Default::default()
        };
        let decoded = Open::try_from_value(open.to_value()).unwrap();
        assert_eq!(open, decoded);
    }

    #[test]
    fn missing_defaults_are_filled() {
        // only the mandatory container-id
        let open = Open::from_fields(vec![Value::from("c1")]).unwrap();
        assert_eq!(open.max_frame_size.0, u32::MAX);
        assert_eq!(open.channel_max.0, u16::MAX);
        assert_eq!(open.idle_time_out, None);
    }
}
