//! Builder for a session

use tokio::sync::mpsc;

use siderite_amqp_types::definitions::{Fields, Handle, TransferNumber};
use siderite_amqp_types::primitives::{Array, Symbol};

use crate::connection::ConnectionHandle;

use super::engine::SessionEngine;
use super::{BeginError, Session, SessionHandle, DEFAULT_WINDOW};

/// Builder for a [`SessionHandle`].
///
/// | Field | Default |
/// |-------|---------|
/// | `next_outgoing_id` | 0 |
/// | `incoming_window` | [`DEFAULT_WINDOW`] |
/// | `outgoing_window` | [`DEFAULT_WINDOW`] |
/// | `handle_max` | `u32::MAX` |
#[derive(Debug, Clone)]
pub struct Builder {
    /// The transfer-id of the first transfer
    pub next_outgoing_id: TransferNumber,

    /// The initial incoming window; replenished when half is consumed
    pub incoming_window: u32,

    /// The initial outgoing window
    pub outgoing_window: u32,

    /// The maximum handle that can be allocated for links; bounds the
    /// number of concurrently attached links
    pub handle_max: Handle,

    /// Extension capabilities the sender supports
    pub offered_capabilities: Option<Array<Symbol>>,

    /// Extension capabilities the sender can use if the peer supports them
    pub desired_capabilities: Option<Array<Symbol>>,

    /// Session properties
    pub properties: Option<Fields>,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            next_outgoing_id: 0,
            incoming_window: DEFAULT_WINDOW,
            outgoing_window: DEFAULT_WINDOW,
            handle_max: u32::MAX,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        }
    }
}

impl Builder {
    /// Creates a builder with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial incoming window
    pub fn incoming_window(mut self, incoming_window: u32) -> Self {
        self.incoming_window = incoming_window;
        self
    }

    /// Sets the initial outgoing window
    pub fn outgoing_window(mut self, outgoing_window: u32) -> Self {
        self.outgoing_window = outgoing_window;
        self
    }

    /// Sets the maximum link handle, bounding the number of links
    pub fn handle_max(mut self, handle_max: Handle) -> Self {
        self.handle_max = handle_max;
        self
    }

    /// Sets the offered capabilities
    pub fn offered_capabilities(mut self, capabilities: impl Into<Array<Symbol>>) -> Self {
        self.offered_capabilities = Some(capabilities.into());
        self
    }

    /// Sets the desired capabilities
    pub fn desired_capabilities(mut self, capabilities: impl Into<Array<Symbol>>) -> Self {
        self.desired_capabilities = Some(capabilities.into());
        self
    }

    /// Sets the session properties
    pub fn properties(mut self, properties: Fields) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Begins the session on the connection
    pub async fn begin(self, connection: &mut ConnectionHandle) -> Result<SessionHandle, BeginError> {
        let buffer_size = connection.buffer_size;
        let max_frame_size = connection.max_frame_size;

        let (incoming_tx, incoming_rx) = mpsc::channel(buffer_size);
        let (channel, session_id) = connection
            .allocate_session(incoming_tx)
            .await
            .map_err(|_| BeginError::IllegalConnectionState)?;

        let session = Session::new(
            channel,
            self.next_outgoing_id,
            self.incoming_window,
            self.outgoing_window,
            self.handle_max,
            self.offered_capabilities,
            self.desired_capabilities,
            self.properties,
        );

        let (control_tx, control_rx) = mpsc::channel(buffer_size);
        let (outgoing_link_tx, outgoing_link_rx) = mpsc::channel(buffer_size);

        let engine = SessionEngine::begin_client_session(
            connection.control.clone(),
            session_id,
            session,
            control_rx,
            incoming_rx,
            connection.outgoing.clone(),
            outgoing_link_rx,
        )
        .await?;
        let engine_handle = engine.spawn();

        Ok(SessionHandle {
            control: control_tx,
            engine_handle,
            outgoing: outgoing_link_tx,
            max_frame_size,
            buffer_size,
        })
    }
}
