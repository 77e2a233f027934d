//! The put-token request and response

use std::borrow::Cow;

use siderite_amqp_types::messaging::{ApplicationProperties, Body, Message};
use siderite_amqp_types::primitives::{SimpleValue, Timestamp};

use siderite_amqp_management::error::Error;
use siderite_amqp_management::request::Request;
use siderite_amqp_management::response::Response;

use crate::constants::{EXPIRATION, NAME, PUT_TOKEN};

/// Puts a token for one audience onto the `$cbs` node.
///
/// The application-properties carry `operation="put-token"`, the token
/// type, the audience name and the expiration; the body is the bearer
/// token string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutTokenRequest<'a> {
    /// The audience the token applies to
    pub name: Cow<'a, str>,

    /// The token
    pub token: Cow<'a, str>,

    /// When the token expires
    pub expiration: Option<Timestamp>,

    /// The type of the token
    pub token_type: Cow<'a, str>,

    /// The locales of the request
    pub locales: Option<Cow<'a, str>>,
}

impl<'a> PutTokenRequest<'a> {
    /// Creates a new put-token request
    pub fn new(
        name: impl Into<Cow<'a, str>>,
        token: impl Into<Cow<'a, str>>,
        expiration: impl Into<Option<Timestamp>>,
        token_type: impl Into<Cow<'a, str>>,
        locales: impl Into<Option<Cow<'a, str>>>,
    ) -> Self {
        Self {
            name: name.into(),
            token: token.into(),
            expiration: expiration.into(),
            token_type: token_type.into(),
            locales: locales.into(),
        }
    }
}

impl Request for PutTokenRequest<'_> {
    const OPERATION: &'static str = PUT_TOKEN;

    type Response = PutTokenResponse;

    fn manageable_entity_type(&mut self) -> Option<String> {
        Some(self.token_type.to_string())
    }

    fn locales(&mut self) -> Option<String> {
        self.locales.as_ref().map(|locales| locales.to_string())
    }

    fn encode_application_properties(&mut self) -> Option<ApplicationProperties> {
        let expiration = match self.expiration.take() {
            Some(timestamp) => SimpleValue::Timestamp(timestamp),
            None => SimpleValue::Null,
        };
        Some(
            ApplicationProperties::builder()
                .insert(NAME, self.name.to_string())
                .insert(EXPIRATION, expiration)
                .build(),
        )
    }

    fn encode_body(self) -> Body {
        Body::from(self.token.into_owned())
    }
}

/// Acknowledges a put-token request; the body carries nothing of interest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutTokenResponse {}

impl Response for PutTokenResponse {
    const STATUS_CODE: u16 = 202;

    fn decode_message(_message: Message) -> Result<Self, Error> {
        Ok(Self {})
    }
}

#[cfg(test)]
mod tests {
    use siderite_amqp_management::constants::{OPERATION, TYPE};

    use super::*;

    #[test]
    fn request_carries_the_put_token_properties() {
        let request = PutTokenRequest::new(
            "sb://example.servicebus.windows.net/q1",
            "dummy-token",
            None,
            crate::constants::SAS_TOKEN_TYPE,
            None,
        );
        let message = request.into_message();

        let properties = message.application_properties.as_ref().unwrap();
        assert_eq!(
            properties.get(OPERATION),
            Some(&SimpleValue::String(PUT_TOKEN.to_string()))
        );
        assert_eq!(
            properties.get(TYPE),
            Some(&SimpleValue::String(
                crate::constants::SAS_TOKEN_TYPE.to_string()
            ))
        );
        assert_eq!(
            properties.get(NAME),
            Some(&SimpleValue::String(
                "sb://example.servicebus.windows.net/q1".to_string()
            ))
        );
        assert_eq!(
            message.body,
            Body::from("dummy-token"),
        );
    }
}
