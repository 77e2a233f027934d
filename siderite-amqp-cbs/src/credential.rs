//! Token credentials and the shared-access-key connection string

use std::time::Duration;

use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use siderite_amqp_types::definitions::{AMQP_PORT, AMQP_TLS_PORT};
use siderite_amqp_types::primitives::Timestamp;

use crate::constants::SAS_TOKEN_TYPE;
use crate::token::{AccessToken, CbsToken};

/// Default lifetime of a generated shared-access-signature token
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(60 * 60);

/// Errors while obtaining a token
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// The connection string is not well formed
    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(&'static str),

    /// The shared access key could not be used for signing
    #[error("Invalid shared access key")]
    InvalidKey,
}

/// A source of bearer tokens.
///
/// The trait is the seam through which identity providers plug in; the
/// core never looks further than the token string and its expiry.
pub trait TokenCredential: std::fmt::Debug + Send + Sync {
    /// The type of the tokens handed out, e.g.
    /// `servicebus.windows.net:sastoken` or `jwt`
    fn token_type(&self) -> &str;

    /// Obtains a token for the given audience
    fn get_token(&self, audience: &str) -> Result<AccessToken, CredentialError>;
}

/// A parsed service-dialect connection string:
/// `Endpoint=sb://<ns>/;SharedAccessKeyName=<k>;SharedAccessKey=<v>[;EntityPath=<e>][;UseDevelopmentEmulator=true]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    /// The endpoint, e.g. `sb://example.servicebus.windows.net/`
    pub endpoint: String,

    /// The host part of the endpoint
    pub host: String,

    /// The port to connect to
    pub port: u16,

    /// The name of the shared access key
    pub shared_access_key_name: String,

    /// The value of the shared access key
    pub shared_access_key: String,

    /// The entity the connection string is scoped to, if any
    pub entity_path: Option<String>,

    /// Whether the endpoint is a local development emulator (plain TCP,
    /// port 5672)
    pub use_development_emulator: bool,
}

impl ConnectionString {
    /// Parses a connection string
    pub fn parse(value: &str) -> Result<Self, CredentialError> {
        let mut endpoint = None;
        let mut key_name = None;
        let mut key = None;
        let mut entity_path = None;
        let mut use_development_emulator = false;

        for element in value.split(';').filter(|e| !e.is_empty()) {
            let (name, val) = element
                .split_once('=')
                .ok_or(CredentialError::InvalidConnectionString(
                    "Expecting '=' in every element",
                ))?;
            match name {
                "Endpoint" => endpoint = Some(val.to_string()),
                "SharedAccessKeyName" => key_name = Some(val.to_string()),
                "SharedAccessKey" => key = Some(val.to_string()),
                "EntityPath" => entity_path = Some(val.to_string()),
                "UseDevelopmentEmulator" => {
                    use_development_emulator = val.eq_ignore_ascii_case("true")
                }
                // unknown elements are ignored for forward compatibility
                _ => {}
            }
        }

        let endpoint = endpoint.ok_or(CredentialError::InvalidConnectionString(
            "Endpoint is missing",
        ))?;
        let url = url::Url::parse(&endpoint).map_err(|_| {
            CredentialError::InvalidConnectionString("Endpoint is not a valid URL")
        })?;
        let host = url
            .host_str()
            .ok_or(CredentialError::InvalidConnectionString(
                "Endpoint has no host",
            ))?
            .to_string();
        let port = url.port().unwrap_or(match use_development_emulator {
            true => AMQP_PORT,
            false => AMQP_TLS_PORT,
        });

        Ok(Self {
            endpoint,
            host,
            port,
            shared_access_key_name: key_name.ok_or(CredentialError::InvalidConnectionString(
                "SharedAccessKeyName is missing",
            ))?,
            shared_access_key: key.ok_or(CredentialError::InvalidConnectionString(
                "SharedAccessKey is missing",
            ))?,
            entity_path,
            use_development_emulator,
        })
    }
}

/// A credential that signs shared-access-signature tokens from a shared
/// access key
#[derive(Clone)]
pub struct SasCredential {
    key_name: String,
    key: String,
    token_lifetime: Duration,
}

impl std::fmt::Debug for SasCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never log the key
        f.debug_struct("SasCredential")
            .field("key_name", &self.key_name)
            .field("token_lifetime", &self.token_lifetime)
            .finish()
    }
}

impl SasCredential {
    /// Creates a credential from a key name and key
    pub fn new(key_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            key_name: key_name.into(),
            key: key.into(),
            token_lifetime: DEFAULT_TOKEN_LIFETIME,
        }
    }

    /// Creates a credential from a parsed connection string
    pub fn from_connection_string(connection_string: &ConnectionString) -> Self {
        Self::new(
            connection_string.shared_access_key_name.clone(),
            connection_string.shared_access_key.clone(),
        )
    }

    /// Overrides the lifetime of generated tokens
    pub fn with_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.token_lifetime = lifetime;
        self
    }

    /// Signs a `SharedAccessSignature` for the audience:
    /// `sr=<uri>&sig=<signature>&se=<expiry>&skn=<key name>`, where the
    /// signature is the base64 HMAC-SHA256 of `<url-encoded uri>\n<expiry>`
    pub fn sign(&self, audience: &str, expires_on: Timestamp) -> Result<String, CredentialError> {
        let encoded_uri = url_encode(audience);
        let expiry = expires_on.milliseconds() / 1000;
        let to_sign = format!("{}\n{}", encoded_uri, expiry);

        let mut mac = Hmac::<Sha256>::new_from_slice(self.key.as_bytes())
            .map_err(|_| CredentialError::InvalidKey)?;
        mac.update(to_sign.as_bytes());
        let signature = base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());

        Ok(format!(
            "SharedAccessSignature sr={}&sig={}&se={}&skn={}",
            encoded_uri,
            url_encode(&signature),
            expiry,
            self.key_name
        ))
    }
}

impl TokenCredential for SasCredential {
    fn token_type(&self) -> &str {
        SAS_TOKEN_TYPE
    }

    fn get_token(&self, audience: &str) -> Result<AccessToken, CredentialError> {
        let expires_on = Timestamp::now() + self.token_lifetime;
        let token = self.sign(audience, expires_on)?;
        Ok(AccessToken { token, expires_on })
    }
}

impl<'a> From<AccessToken> for CbsToken<'a> {
    fn from(token: AccessToken) -> Self {
        CbsToken::sas(token.token, token.expires_on)
    }
}

fn url_encode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            other => {
                encoded.push('%');
                encoded.push_str(&format!("{:02X}", other));
            }
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_string_round_trip() {
        let parsed = ConnectionString::parse(
            "Endpoint=sb://example.servicebus.windows.net/;SharedAccessKeyName=RootManageSharedAccessKey;SharedAccessKey=abc123=;EntityPath=q1",
        )
        .unwrap();
        assert_eq!(parsed.host, "example.servicebus.windows.net");
        assert_eq!(parsed.port, AMQP_TLS_PORT);
        assert_eq!(parsed.shared_access_key_name, "RootManageSharedAccessKey");
        assert_eq!(parsed.shared_access_key, "abc123=");
        assert_eq!(parsed.entity_path.as_deref(), Some("q1"));
        assert!(!parsed.use_development_emulator);
    }

    #[test]
    fn development_emulator_uses_plain_port() {
        let parsed = ConnectionString::parse(
            "Endpoint=sb://localhost/;SharedAccessKeyName=k;SharedAccessKey=v;UseDevelopmentEmulator=true",
        )
        .unwrap();
        assert_eq!(parsed.port, AMQP_PORT);
        assert!(parsed.use_development_emulator);
    }

    #[test]
    fn missing_key_is_rejected() {
        let result = ConnectionString::parse("Endpoint=sb://localhost/;SharedAccessKeyName=k");
        assert!(result.is_err());
    }

    #[test]
    fn signature_shape() {
        let credential = SasCredential::new("policy", "secret");
        let token = credential
            .sign(
                "sb://example.servicebus.windows.net/q1",
                Timestamp::from_milliseconds(1_700_000_000_000),
            )
            .unwrap();
        assert!(token.starts_with("SharedAccessSignature sr=sb%3A%2F%2F"));
        assert!(token.contains("&se=1700000000&skn=policy"));
    }

    #[test]
    fn url_encoding_is_uppercase_percent() {
        assert_eq!(url_encode("a b/c"), "a%20b%2Fc");
        assert_eq!(url_encode("safe-chars_.~"), "safe-chars_.~");
    }
}
