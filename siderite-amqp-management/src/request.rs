//! The request trait of the management protocol

use siderite_amqp_types::messaging::{
    ApplicationProperties, Body, Header, Message, Properties,
};
use siderite_amqp_types::primitives::SimpleValue;

use crate::constants;
use crate::response::Response;

/// A management request.
///
/// A request is a message whose application-properties name the operation,
/// the manageable entity type and optionally the locales; the body carries
/// the operation arguments.
pub trait Request: Sized {
    /// The management operation
    const OPERATION: &'static str;

    /// The response paired with this request
    type Response: Response;

    /// The locales of the request
    fn locales(&mut self) -> Option<String> {
        None
    }

    /// The manageable entity type.
    ///
    /// The working draft makes this mandatory but existing services do not
    /// all comply, hence the option.
    fn manageable_entity_type(&mut self) -> Option<String> {
        None
    }

    /// Extra message sections of the request
    fn encode_header(&mut self) -> Option<Header> {
        None
    }

    /// The properties section of the request; the client fills in the
    /// message-id and reply-to afterwards
    fn encode_properties(&mut self) -> Option<Properties> {
        None
    }

    /// Application-properties beyond the operation/type/locales keys
    fn encode_application_properties(&mut self) -> Option<ApplicationProperties> {
        None
    }

    /// The body of the request
    fn encode_body(self) -> Body;

    /// Assembles the request message
    fn into_message(mut self) -> Message {
        let header = self.encode_header();
        let properties = self.encode_properties();

        let mut application_properties = self.encode_application_properties().unwrap_or_default();
        application_properties
            .as_inner_mut()
            .entry(constants::OPERATION.to_string())
            .or_insert(SimpleValue::String(Self::OPERATION.to_string()));
        if let Some(entity_type) = self.manageable_entity_type() {
            application_properties
                .as_inner_mut()
                .entry(constants::TYPE.to_string())
                .or_insert(SimpleValue::String(entity_type));
        }
        if let Some(locales) = self.locales() {
            application_properties
                .as_inner_mut()
                .entry(constants::LOCALES.to_string())
                .or_insert(SimpleValue::String(locales));
        }

        // `encode_body` consumes self, so it has to come last
        let body = self.encode_body();

        Message::builder()
            .header(header)
            .properties(properties)
            .application_properties(application_properties)
            .body(body)
            .build()
    }
}
