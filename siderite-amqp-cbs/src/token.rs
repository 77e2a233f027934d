//! Token types exchanged with the claims-based-security node

use std::borrow::Cow;

use siderite_amqp_types::primitives::Timestamp;

use crate::constants::{JWT_TOKEN_TYPE, SAS_TOKEN_TYPE};

/// A bearer token to be put on the `$cbs` node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CbsToken<'a> {
    /// The token itself
    pub token_value: Cow<'a, str>,

    /// The type of the token, e.g. `servicebus.windows.net:sastoken` or
    /// `jwt`
    pub token_type: Cow<'a, str>,

    /// When the token expires
    pub expires_at: Option<Timestamp>,
}

impl<'a> CbsToken<'a> {
    /// Creates a new token
    pub fn new(
        token_value: impl Into<Cow<'a, str>>,
        token_type: impl Into<Cow<'a, str>>,
        expires_at: impl Into<Option<Timestamp>>,
    ) -> Self {
        Self {
            token_value: token_value.into(),
            token_type: token_type.into(),
            expires_at: expires_at.into(),
        }
    }

    /// Creates a shared-access-signature token
    pub fn sas(token_value: impl Into<Cow<'a, str>>, expires_at: Timestamp) -> Self {
        Self::new(token_value, SAS_TOKEN_TYPE, expires_at)
    }

    /// Creates a JSON-web-token
    pub fn jwt(token_value: impl Into<Cow<'a, str>>, expires_at: Option<Timestamp>) -> Self {
        Self::new(token_value, JWT_TOKEN_TYPE, expires_at)
    }
}

/// An access token handed out by a [`TokenCredential`](crate::TokenCredential)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// The token itself
    pub token: String,

    /// When the token expires
    pub expires_on: Timestamp,
}
