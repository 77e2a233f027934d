//! Builder for a connection

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use url::Url;

use siderite_amqp_types::definitions::{Fields, IetfLanguageTag, Milliseconds, AMQP_PORT};
use siderite_amqp_types::performatives::{ChannelMax, MaxFrameSize, Open};
use siderite_amqp_types::primitives::{Array, Symbol};
use siderite_amqp_types::states::ConnectionState;

use crate::sasl_profile::SaslProfile;
use crate::transport::{ProtocolHeaderCodec, Transport};

use super::engine::ConnectionEngine;
use super::{Connection, ConnectionHandle, OpenError};

/// Default idle timeout announced in the open frame
pub const DEFAULT_IDLE_TIME_OUT: Milliseconds = 60_000;

/// Default fraction of the remote idle timeout at which empty frames are
/// sent
pub const DEFAULT_IDLE_TIME_OUT_RATIO: f64 = 0.5;

/// Default capacity of the control and frame channels
pub const DEFAULT_BUFFER_SIZE: usize = 2048;

/// Builder for a [`ConnectionHandle`].
///
/// | Field | Default |
/// |-------|---------|
/// | `container_id` | `siderite-` + random UUID |
/// | `max_frame_size` | `u32::MAX` (floor 512) |
/// | `channel_max` | `65535` |
/// | `idle_time_out` | 60 s |
/// | `idle_time_out_ratio` | 0.5 |
/// | `buffer_size` | 2048 |
#[derive(Debug, Clone)]
pub struct Builder {
    /// The id of the source container
    pub container_id: Option<String>,

    /// The name of the target host; defaults to the host of the URL
    pub hostname: Option<String>,

    /// Overrides the port of the URL
    pub port: Option<u16>,

    /// Proposed maximum frame size
    pub max_frame_size: MaxFrameSize,

    /// The maximum channel number that can be used on the connection
    pub channel_max: ChannelMax,

    /// Idle timeout announced to the peer and enforced locally
    pub idle_time_out: Milliseconds,

    /// Fraction of the remote idle timeout at which keep-alive empty
    /// frames are sent
    pub idle_time_out_ratio: f64,

    /// Locales available for outgoing text
    pub outgoing_locales: Option<Array<IetfLanguageTag>>,

    /// Desired locales for incoming text
    pub incoming_locales: Option<Array<IetfLanguageTag>>,

    /// Extension capabilities the sender supports
    pub offered_capabilities: Option<Array<Symbol>>,

    /// Extension capabilities the sender can use if the peer supports them
    pub desired_capabilities: Option<Array<Symbol>>,

    /// Connection properties
    pub properties: Option<Fields>,

    /// Capacity of the internal channels
    pub buffer_size: usize,

    /// SASL profile used before the AMQP header exchange
    pub sasl_profile: Option<SaslProfile>,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            container_id: None,
            hostname: None,
            port: None,
            max_frame_size: MaxFrameSize::default(),
            channel_max: ChannelMax::default(),
            idle_time_out: DEFAULT_IDLE_TIME_OUT,
            idle_time_out_ratio: DEFAULT_IDLE_TIME_OUT_RATIO,
            outgoing_locales: None,
            incoming_locales: None,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            sasl_profile: None,
        }
    }
}

impl Builder {
    /// Creates a builder with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the container id
    pub fn container_id(mut self, container_id: impl Into<String>) -> Self {
        self.container_id = Some(container_id.into());
        self
    }

    /// Sets the hostname carried in the open frame
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Overrides the port of the URL
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the proposed max-frame-size
    pub fn max_frame_size(mut self, max_frame_size: impl Into<MaxFrameSize>) -> Self {
        self.max_frame_size = max_frame_size.into();
        self
    }

    /// Sets the channel-max
    pub fn channel_max(mut self, channel_max: impl Into<ChannelMax>) -> Self {
        self.channel_max = channel_max.into();
        self
    }

    /// Sets the idle timeout in milliseconds
    pub fn idle_time_out(mut self, idle_time_out: Milliseconds) -> Self {
        self.idle_time_out = idle_time_out;
        self
    }

    /// Sets the keep-alive ratio; the effective empty-frame period is the
    /// remote idle timeout times this ratio
    pub fn idle_time_out_ratio(mut self, ratio: f64) -> Self {
        self.idle_time_out_ratio = ratio;
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

    /// Sets the connection properties
    pub fn properties(mut self, properties: Fields) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Sets the channel capacity
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Sets the SASL profile
    pub fn sasl_profile(mut self, profile: impl Into<SaslProfile>) -> Self {
        self.sasl_profile = Some(profile.into());
        self
    }

    /// Connects a TCP stream to the URL and opens the connection.
    ///
    /// Credentials in the URL select a PLAIN SASL profile unless one was
    /// set explicitly. TLS is a transport concern: terminate it outside
    /// and use [`open_with_stream`](Self::open_with_stream).
    pub async fn open(
        mut self,
        url: impl TryInto<Url, Error = url::ParseError>,
    ) -> Result<ConnectionHandle, OpenError> {
        let url = url.try_into()?;
        match url.scheme() {
            "amqp" => {}
            other => return Err(OpenError::InvalidScheme(other.to_string())),
        }
        let host = url.host_str().ok_or(OpenError::InvalidDomain)?.to_string();
        let port = self.port.or_else(|| url.port()).unwrap_or(AMQP_PORT);

        if self.hostname.is_none() {
            self.hostname = Some(host.clone());
        }
        if self.sasl_profile.is_none() {
            self.sasl_profile = SaslProfile::try_from(&url).ok();
        }

        let stream = TcpStream::connect((host.as_str(), port)).await?;
        self.open_with_stream(stream).await
    }

    /// Opens the connection over an already-established byte stream
    /// (a TCP stream, a TLS stream, or anything else that is ordered and
    /// reliable)
    pub async fn open_with_stream<Io>(mut self, stream: Io) -> Result<ConnectionHandle, OpenError>
    where
        Io: AsyncRead + AsyncWrite + std::fmt::Debug + Send + Unpin + 'static,
    {
        let mut framed = Framed::new(stream, ProtocolHeaderCodec::default());

        if let Some(profile) = self.sasl_profile.take() {
            framed = Transport::negotiate_sasl(framed, self.hostname.as_deref(), profile).await?;
        }

        let mut local_state = ConnectionState::Start;
        let idle_time_out = Duration::from_millis(self.idle_time_out as u64);
        let transport = Transport::negotiate_amqp_header(
            framed,
            &mut local_state,
            Some(idle_time_out).filter(|d| !d.is_zero()),
        )
        .await?;

        let container_id = self
            .container_id
            .unwrap_or_else(|| format!("siderite-{}", uuid::Uuid::new_v4()));
        let local_open = Open {
            container_id,
            hostname: self.hostname,
            max_frame_size: self.max_frame_size,
            channel_max: self.channel_max,
            idle_time_out: Some(self.idle_time_out),
            outgoing_locales: self.outgoing_locales,
            incoming_locales: self.incoming_locales,
            offered_capabilities: self.offered_capabilities,
            desired_capabilities: self.desired_capabilities,
            properties: self.properties,
        };

        let mut connection = Connection::new(local_open);
        *connection.local_state_mut() = local_state;

        let (control_tx, control_rx) = mpsc::channel(self.buffer_size);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(self.buffer_size);

        let engine = ConnectionEngine::open(
            transport,
            connection,
            control_rx,
            outgoing_rx,
            self.idle_time_out_ratio,
        )
        .await?;
        let max_frame_size = engine.max_frame_size();
        let handle = engine.spawn();

        Ok(ConnectionHandle {
            control: control_tx,
            handle,
            outgoing: outgoing_tx,
            max_frame_size,
            buffer_size: self.buffer_size,
        })
    }
}
