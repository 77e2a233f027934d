//! The message aggregate

use bytes::{Bytes, BytesMut};

use crate::codec::{Composite, Error as CodecError, Reader};
use crate::value::Value;

use super::annotations::{DeliveryAnnotations, Footer, MessageAnnotations};
use super::app_properties::ApplicationProperties;
use super::body::{AmqpSequence, AmqpValue, Body, Data};
use super::header::Header;
use super::properties::Properties;

/// The message-format value of the bare message format defined by the
/// specification
pub const MESSAGE_FORMAT: u32 = 0;

/// An annotated message consists of the bare message plus sections for
/// headers, annotations and footers, assembled in the fixed order: header,
/// delivery-annotations, message-annotations, properties,
/// application-properties, body, footer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// Transport headers
    pub header: Option<Header>,

    /// Delivery attributes for intermediaries
    pub delivery_annotations: Option<DeliveryAnnotations>,

    /// Message attributes propagated across delivery steps
    pub message_annotations: Option<MessageAnnotations>,

    /// Immutable properties of the message
    pub properties: Option<Properties>,

    /// Structured application data keyed by string
    pub application_properties: Option<ApplicationProperties>,

    /// The body
    pub body: Body,

    /// Footer
    pub footer: Option<Footer>,
}

impl Message {
    /// Creates a builder for [`Message`]
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Encodes the message sections in order into the buffer
    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        if let Some(header) = &self.header {
            header.to_value().encode(buf)?;
        }
        if let Some(delivery_annotations) = &self.delivery_annotations {
            delivery_annotations.to_value().encode(buf)?;
        }
        if let Some(message_annotations) = &self.message_annotations {
            message_annotations.to_value().encode(buf)?;
        }
        if let Some(properties) = &self.properties {
            properties.to_value().encode(buf)?;
        }
        if let Some(application_properties) = &self.application_properties {
            application_properties.to_value().encode(buf)?;
        }
        match &self.body {
            Body::Nothing => {}
            Body::Data(sections) => {
                for section in sections {
                    section.to_value().encode(buf)?;
                }
            }
            Body::Sequence(sections) => {
                for section in sections {
                    section.to_value().encode(buf)?;
                }
            }
            Body::Value(section) => section.to_value().encode(buf)?,
        }
        if let Some(footer) = &self.footer {
            footer.to_value().encode(buf)?;
        }
        Ok(())
    }

    /// Encodes the message into a freshly allocated buffer
    pub fn to_bytes(&self) -> Result<Bytes, CodecError> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decodes a message from the bytes of one or more transfer payloads
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = Reader::new(bytes);
        let mut message = Message::default();

        while !reader.is_empty() {
            let value = Value::decode(&mut reader)?;
            message.take_section(value)?;
        }
        Ok(message)
    }

    fn take_section(&mut self, value: Value) -> Result<(), CodecError> {
        use crate::codec::Composite;

        let descriptor_code = match &value {
            Value::Described(described) => match &described.descriptor {
                crate::value::Descriptor::Code(code) => Some(*code),
                crate::value::Descriptor::Name(name) => section_code_by_name(name.as_str()),
            },
            // a bare map before the body can only be application-properties
            Value::Map(_) => Some(ApplicationProperties::CODE),
            _ => None,
        };

        match descriptor_code {
            Some(Header::CODE) => self.header = Some(Header::try_from_value(value)?),
            Some(DeliveryAnnotations::CODE) => {
                self.delivery_annotations = Some(DeliveryAnnotations::try_from_value(value)?)
            }
            Some(MessageAnnotations::CODE) => {
                self.message_annotations = Some(MessageAnnotations::try_from_value(value)?)
            }
            Some(Properties::CODE) => self.properties = Some(Properties::try_from_value(value)?),
            Some(ApplicationProperties::CODE) => {
                self.application_properties = Some(ApplicationProperties::try_from_value(value)?)
            }
            Some(Data::CODE) => {
                let described = match value {
                    Value::Described(described) => *described,
                    _ => return Err(CodecError::Malformed),
                };
                let found = described.value.type_name();
                let binary = described.value.try_into().map_err(|_| CodecError::TypeMismatch {
                    expecting: "binary",
                    found,
                })?;
                match &mut self.body {
                    Body::Nothing => self.body = Body::Data(vec![Data(binary)]),
                    Body::Data(sections) => sections.push(Data(binary)),
                    // only one body kind is permitted per message
                    _ => return Err(CodecError::Malformed),
                }
            }
            Some(AmqpSequence::CODE) => {
                let described = match value {
                    Value::Described(described) => *described,
                    _ => return Err(CodecError::Malformed),
                };
                let found = described.value.type_name();
                let items = described.value.try_into().map_err(|_| CodecError::TypeMismatch {
                    expecting: "list",
                    found,
                })?;
                match &mut self.body {
                    Body::Nothing => self.body = Body::Sequence(vec![AmqpSequence(items)]),
                    Body::Sequence(sections) => sections.push(AmqpSequence(items)),
                    _ => return Err(CodecError::Malformed),
                }
            }
            Some(AmqpValue::CODE) => {
                let described = match value {
                    Value::Described(described) => *described,
                    _ => return Err(CodecError::Malformed),
                };
                match &self.body {
                    Body::Nothing => self.body = Body::Value(AmqpValue(described.value)),
                    // exactly one value section
                    _ => return Err(CodecError::Malformed),
                }
            }
            Some(Footer::CODE) => self.footer = Some(Footer::try_from_value(value)?),
            _ => {
                return Err(CodecError::UnexpectedDescriptor(format!("{:?}", value)));
            }
        }
        Ok(())
    }
}

fn section_code_by_name(name: &str) -> Option<u64> {
    use crate::codec::Composite;

    match name {
        Header::NAME => Some(Header::CODE),
        "amqp:delivery-annotations:map" => Some(DeliveryAnnotations::CODE),
        "amqp:message-annotations:map" => Some(MessageAnnotations::CODE),
        "amqp:properties:list" => Some(Properties::CODE),
        "amqp:application-properties:map" => Some(ApplicationProperties::CODE),
        "amqp:data:binary" => Some(Data::CODE),
        "amqp:amqp-sequence:list" => Some(AmqpSequence::CODE),
        "amqp:amqp-value:*" => Some(AmqpValue::CODE),
        "amqp:footer:map" => Some(Footer::CODE),
        _ => None,
    }
}

/// Builder for [`Message`]
#[derive(Debug, Clone, Default)]
pub struct Builder {
    message: Message,
}

impl Builder {
    /// Creates a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the header section
    pub fn header(mut self, header: impl Into<Option<Header>>) -> Self {
        self.message.header = header.into();
        self
    }

    /// Sets the delivery-annotations section
    pub fn delivery_annotations(
        mut self,
        annotations: impl Into<Option<DeliveryAnnotations>>,
    ) -> Self {
        self.message.delivery_annotations = annotations.into();
        self
    }

    /// Sets the message-annotations section
    pub fn message_annotations(
        mut self,
        annotations: impl Into<Option<MessageAnnotations>>,
    ) -> Self {
        self.message.message_annotations = annotations.into();
        self
    }

    /// Sets the properties section
    pub fn properties(mut self, properties: impl Into<Option<Properties>>) -> Self {
        self.message.properties = properties.into();
        self
    }

    /// Sets the application-properties section
    pub fn application_properties(
        mut self,
        properties: impl Into<Option<ApplicationProperties>>,
    ) -> Self {
        self.message.application_properties = properties.into();
        self
    }

    /// Sets the body
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.message.body = body.into();
        self
    }

    /// Sets the footer section
    pub fn footer(mut self, footer: impl Into<Option<Footer>>) -> Self {
        self.message.footer = footer.into();
        self
    }

    /// Builds the message
    pub fn build(self) -> Message {
        self.message
    }
}

impl From<&str> for Message {
    fn from(value: &str) -> Self {
        Message {
            body: Body::from(value),
            ..Default::default()
        }
    }
}

impl From<String> for Message {
    fn from(value: String) -> Self {
        Message {
            body: Body::from(value),
            ..Default::default()
        }
    }
}

impl From<Body> for Message {
    fn from(body: Body) -> Self {
        Message {
            body,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::Binary;

    #[test]
    fn message_round_trip_with_all_sections() {
        let mut footer = Footer::new();
        footer.insert("x-checksum", 5u32);

        let message = Message::builder()
            .header(Header {
                durable: true,
                ..Default::default()
            })
            .properties(Properties::builder().message_id("m-1").build())
            .application_properties(
                ApplicationProperties::builder().insert("operation", "READ").build(),
            )
            .body("hello")
            .footer(footer)
            .build();

        let bytes = message.to_bytes().unwrap();
        let decoded = Message::from_slice(&bytes).unwrap();
        assert_eq!(message, decoded);
    }

    #[test]
    fn multiple_data_sections_accumulate() {
        let message = Message::builder()
            .body(Body::Data(vec![
                Data(Binary::from(vec![1, 2])),
                Data(Binary::from(vec![3, 4])),
            ]))
            .build();
        let bytes = message.to_bytes().unwrap();
        let decoded = Message::from_slice(&bytes).unwrap();
        assert_eq!(message, decoded);
    }

    #[test]
    fn mixing_body_kinds_is_rejected() {
        let mut buf = BytesMut::new();
        Data(Binary::from(vec![1])).to_value().encode(&mut buf).unwrap();
        AmqpValue(Value::from("x")).to_value().encode(&mut buf).unwrap();
        assert!(Message::from_slice(&buf).is_err());
    }

    #[test]
    fn two_value_sections_are_rejected() {
        let mut buf = BytesMut::new();
        AmqpValue(Value::from("x")).to_value().encode(&mut buf).unwrap();
        AmqpValue(Value::from("y")).to_value().encode(&mut buf).unwrap();
        assert!(Message::from_slice(&buf).is_err());
    }

    #[test]
    fn bare_map_decodes_as_application_properties() {
        use crate::primitives::OrderedMap;

        let mut map: OrderedMap<Value, Value> = OrderedMap::new();
        map.insert(Value::from("statusCode"), Value::from(202u32));
        let mut buf = BytesMut::new();
        Value::Map(map).encode(&mut buf).unwrap();
        AmqpValue(Value::from("token")).to_value().encode(&mut buf).unwrap();

        let message = Message::from_slice(&buf).unwrap();
        let props = message.application_properties.unwrap();
        assert_eq!(props.get("statusCode"), Some(&crate::primitives::SimpleValue::UInt(202)));
    }
}
