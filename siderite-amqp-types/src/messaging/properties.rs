//! The properties section of a message

use crate::codec::{Composite, Error as CodecError, FieldReader};
use crate::primitives::{Binary, Symbol, Timestamp};
use crate::value::Value;

use super::message_id::MessageId;
use super::Address;

/// Immutable properties of the message.
/// <type name="properties" class="composite" source="list" provides="section">
///     <descriptor name="amqp:properties:list" code="0x00000000:0x00000073"/>
/// </type>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    /// <field name="message-id" type="*" requires="message-id"/>
    pub message_id: Option<MessageId>,

    /// <field name="user-id" type="binary"/>
    pub user_id: Option<Binary>,

    /// <field name="to" type="*" requires="address"/>
    pub to: Option<Address>,

    /// <field name="subject" type="string"/>
    pub subject: Option<String>,

    /// <field name="reply-to" type="*" requires="address"/>
    pub reply_to: Option<Address>,

    /// <field name="correlation-id" type="*" requires="message-id"/>
    pub correlation_id: Option<MessageId>,

    /// <field name="content-type" type="symbol"/>
    pub content_type: Option<Symbol>,

    /// <field name="content-encoding" type="symbol"/>
    pub content_encoding: Option<Symbol>,

    /// <field name="absolute-expiry-time" type="timestamp"/>
    pub absolute_expiry_time: Option<Timestamp>,

    /// <field name="creation-time" type="timestamp"/>
    pub creation_time: Option<Timestamp>,

    /// <field name="group-id" type="string"/>
    pub group_id: Option<String>,

    /// <field name="group-sequence" type="sequence-no"/>
    pub group_sequence: Option<u32>,

    /// <field name="reply-to-group-id" type="string"/>
    pub reply_to_group_id: Option<String>,
}

impl Properties {
    /// Creates a builder for [`Properties`]
    pub fn builder() -> Builder {
        Builder::new()
    }
}

impl Composite for Properties {
    const CODE: u64 = 0x0000_0000_0000_0073;
    const NAME: &'static str = "amqp:properties:list";

    fn to_fields(&self) -> Vec<Value> {
        vec![
            self.message_id.clone().into(),
            self.user_id.clone().into(),
            self.to.clone().into(),
            self.subject.clone().into(),
            self.reply_to.clone().into(),
            self.correlation_id.clone().into(),
            self.content_type.clone().into(),
            self.content_encoding.clone().into(),
            self.absolute_expiry_time.into(),
            self.creation_time.into(),
            self.group_id.clone().into(),
            self.group_sequence.into(),
            self.reply_to_group_id.clone().into(),
        ]
    }

    fn from_fields(fields: Vec<Value>) -> Result<Self, CodecError> {
        let mut reader = FieldReader::new(fields);
        Ok(Self {
            message_id: reader.optional()?,
            user_id: reader.optional()?,
            to: reader.optional()?,
            subject: reader.optional()?,
            reply_to: reader.optional()?,
            correlation_id: reader.optional()?,
            content_type: reader.optional()?,
            content_encoding: reader.optional()?,
            absolute_expiry_time: reader.optional()?,
            creation_time: reader.optional()?,
            group_id: reader.optional()?,
            group_sequence: reader.optional()?,
            reply_to_group_id: reader.optional()?,
        })
    }
}

/// Builder for [`Properties`]
#[derive(Debug, Clone, Default)]
pub struct Builder {
    properties: Properties,
}

impl Builder {
    /// Creates a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the message-id
    pub fn message_id(mut self, id: impl Into<MessageId>) -> Self {
        self.properties.message_id = Some(id.into());
        self
    }

    /// Sets the to field
    pub fn to(mut self, to: impl Into<Address>) -> Self {
        self.properties.to = Some(to.into());
        self
    }

    /// Sets the subject
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.properties.subject = Some(subject.into());
        self
    }

    /// Sets the reply-to field
    pub fn reply_to(mut self, reply_to: impl Into<Address>) -> Self {
        self.properties.reply_to = Some(reply_to.into());
        self
    }

    /// Sets the correlation-id
    pub fn correlation_id(mut self, id: impl Into<MessageId>) -> Self {
        self.properties.correlation_id = Some(id.into());
        self
    }

    /// Sets the content-type
    pub fn content_type(mut self, content_type: impl Into<Symbol>) -> Self {
        self.properties.content_type = Some(content_type.into());
        self
    }

    /// Sets the group-id
    pub fn group_id(mut self, group_id: impl Into<String>) -> Self {
        self.properties.group_id = Some(group_id.into());
        self
    }

    /// Builds the properties
    pub fn build(self) -> Properties {
        self.properties
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_round_trip() {
        let properties = Properties::builder()
            .message_id("req-1")
            .reply_to("client-node")
            .correlation_id(7u64)
            .build();
        let decoded = Properties::try_from_value(properties.to_value()).unwrap();
        assert_eq!(properties, decoded);
    }

    #[test]
    fn trailing_nulls_are_trimmed() {
        let properties = Properties::builder().message_id(1u64).build();
        match properties.to_value() {
            Value::Described(described) => match described.value {
                Value::List(fields) => assert_eq!(fields.len(), 1),
                other => panic!("expecting a list, got {:?}", other),
            },
            other => panic!("expecting a described value, got {:?}", other),
        }
    }
}
