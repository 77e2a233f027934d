//! The claims-based-security client

use std::borrow::Cow;
use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use siderite_amqp::session::SessionHandle;
use siderite_amqp_management::client::{Builder as MgmtBuilder, ManagementClient};
use siderite_amqp_management::error::{AttachError, Error as MgmtError};
use siderite_amqp_types::definitions::Fields;
use siderite_amqp_types::primitives::Timestamp;

use crate::constants::{CBS_NODE_ADDRESS, DEFAULT_CBS_CLIENT_NODE};
use crate::put_token::{PutTokenRequest, PutTokenResponse};
use crate::token::CbsToken;

/// A client for the claims-based-security node.
///
/// The client is a management-style request/response pair targeting the
/// reserved `$cbs` node. One client may authorize any number of audiences;
/// successful authorizations are cached until the token expires, so
/// putting a token for an already-authorized audience is a no-op.
///
/// The enclosing connection should be opened with an ANONYMOUS SASL
/// profile.
#[derive(Debug)]
pub struct CbsClient {
    mgmt_client: ManagementClient,
    authorizations: Mutex<HashMap<String, Timestamp>>,
}

impl CbsClient {
    /// Creates a builder for a CBS client
    pub fn builder() -> CbsClientBuilder {
        CbsClientBuilder::default()
    }

    /// Attaches a CBS client to the session
    pub async fn attach(session: &mut SessionHandle) -> Result<Self, AttachError> {
        Self::builder().attach(session).await
    }

    /// Puts a token authorizing the given audience.
    ///
    /// If a previous authorization for the audience has not expired yet
    /// the call returns immediately without another round trip.
    pub async fn put_token<'a>(
        &mut self,
        name: impl Into<Cow<'a, str>>,
        token: CbsToken<'a>,
    ) -> Result<(), MgmtError> {
        let name = name.into();
        if self.is_authorized(&name) {
            debug!(audience = %name, "Authorization is still valid");
            return Ok(());
        }

        let expires_at = token.expires_at;
        let request = PutTokenRequest::new(
            name.clone(),
            token.token_value,
            token.expires_at,
            token.token_type,
            None,
        );
        let _response: PutTokenResponse = self.mgmt_client.call(request).await?;

        if let Some(expires_at) = expires_at {
            self.authorizations
                .lock()
                .insert(name.into_owned(), expires_at);
        }
        Ok(())
    }

    /// Whether a non-expired authorization for the audience is cached
    pub fn is_authorized(&self, name: &str) -> bool {
        match self.authorizations.lock().get(name) {
            Some(expires_at) => !expires_at.is_expired(),
            None => false,
        }
    }

    /// When the cached authorization for the audience expires
    pub fn authorization_expiry(&self, name: &str) -> Option<Timestamp> {
        self.authorizations.lock().get(name).copied()
    }

    /// Closes the CBS client
    pub async fn close(self) -> Result<(), MgmtError> {
        self.mgmt_client.close().await
    }
}

/// Builder for a [`CbsClient`]
#[derive(Debug)]
pub struct CbsClientBuilder {
    inner: MgmtBuilder,
}

impl Default for CbsClientBuilder {
    fn default() -> Self {
        let inner = ManagementClient::builder()
            .management_node_address(CBS_NODE_ADDRESS)
            .client_node_address(DEFAULT_CBS_CLIENT_NODE);
        Self { inner }
    }
}

impl CbsClientBuilder {
    /// Sets the sender link properties
    pub fn sender_properties(mut self, properties: Fields) -> Self {
        self.inner = self.inner.sender_properties(properties);
        self
    }

    /// Sets the receiver link properties
    pub fn receiver_properties(mut self, properties: Fields) -> Self {
        self.inner = self.inner.receiver_properties(properties);
        self
    }

    /// Overrides the node address; the reserved name is `$cbs`
    pub fn cbs_node_address(mut self, addr: impl Into<String>) -> Self {
        self.inner = self.inner.management_node_address(addr);
        self
    }

    /// Sets the client node address
    pub fn client_node_address(mut self, addr: impl Into<String>) -> Self {
        self.inner = self.inner.client_node_address(addr);
        self
    }

    /// Attaches the CBS client to a session
    pub async fn attach(self, session: &mut SessionHandle) -> Result<CbsClient, AttachError> {
        let mgmt_client = self.inner.attach(session).await?;
        Ok(CbsClient {
            mgmt_client,
            authorizations: Mutex::new(HashMap::new()),
        })
    }
}
