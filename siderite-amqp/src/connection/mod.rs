//! Implementation of the AMQP 1.0 connection

use std::cmp::min;
use std::collections::BTreeMap;
use std::io;

use futures_util::{Sink, SinkExt};
use slab::Slab;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{instrument, trace};

use siderite_amqp_types::definitions::{self, AmqpError};
use siderite_amqp_types::performatives::{Begin, Close, End, Open};
use siderite_amqp_types::states::ConnectionState;

use crate::control::ConnectionControl;
use crate::frames::amqp::{Frame, FrameBody};
use crate::session::{SessionFrame, SessionFrameBody, SessionIncomingItem};

pub(crate) mod engine;
pub mod builder;
mod error;
mod heartbeat;

pub use builder::Builder;
pub use error::{Error, OpenError};
pub(crate) use error::AllocSessionError;
pub(crate) use heartbeat::HeartBeat;

pub(crate) type SessionId = usize;

/// A handle to an open connection.
///
/// Dropping the handle sends a best-effort close to the event loop.
#[derive(Debug)]
pub struct ConnectionHandle {
    pub(crate) control: mpsc::Sender<ConnectionControl>,
    pub(crate) handle: JoinHandle<Result<(), Error>>,

    /// Outgoing frames from sessions are funneled through this channel
    pub(crate) outgoing: mpsc::Sender<SessionFrame>,

    /// Negotiated after the open exchange; sessions and links size their
    /// transfers against this
    pub(crate) max_frame_size: usize,

    pub(crate) buffer_size: usize,
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        let _ = self.control.try_send(ConnectionControl::Close(None));
    }
}

impl ConnectionHandle {
    /// Creates a builder for a connection
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Whether the connection event loop has stopped
    pub fn is_closed(&self) -> bool {
        self.control.is_closed()
    }

    /// The max-frame-size negotiated on open
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Close the connection
    pub async fn close(&mut self) -> Result<(), Error> {
        // a send failure means the event loop has already stopped; the
        // outcome is picked up from the join handle either way
        let _ = self.control.send(ConnectionControl::Close(None)).await;
        self.on_close().await
    }

    /// Close the connection, carrying an error to the peer
    pub async fn close_with_error(
        &mut self,
        error: impl Into<definitions::Error>,
    ) -> Result<(), Error> {
        let _ = self
            .control
            .send(ConnectionControl::Close(Some(error.into())))
            .await;
        self.on_close().await
    }

    /// Returns when the connection event loop has stopped.
    ///
    /// # Panics
    ///
    /// Panics if awaited more than once (through this method or through
    /// [`close`](Self::close)); the join handle may only be polled to
    /// completion once.
    pub async fn on_close(&mut self) -> Result<(), Error> {
        match (&mut self.handle).await {
            Ok(result) => result,
            Err(err) => Err(Error::JoinError(err)),
        }
    }

    pub(crate) async fn allocate_session(
        &mut self,
        tx: mpsc::Sender<SessionIncomingItem>,
    ) -> Result<(u16, SessionId), AllocSessionError> {
        let (responder, resp_rx) = oneshot::channel();
        self.control
            .send(ConnectionControl::AllocateSession { tx, responder })
            .await
            .map_err(|_| AllocSessionError::EventLoopStopped)?;
        resp_rx
            .await
            .map_err(|_| AllocSessionError::EventLoopStopped)?
    }
}

/// The connection state machine.
///
/// All mutations happen on the connection event loop; the handle posts
/// work through the control channel.
#[derive(Debug)]
pub(crate) struct Connection {
    // local
    local_state: ConnectionState,
    local_open: Open,
    local_sessions: Slab<mpsc::Sender<SessionIncomingItem>>,
    session_by_incoming_channel: BTreeMap<u16, SessionId>,
    session_by_outgoing_channel: BTreeMap<u16, SessionId>,

    // remote
    remote_open: Option<Open>,

    // mutually agreed channel max
    agreed_channel_max: u16,
}

impl Connection {
    pub fn new(local_open: Open) -> Self {
        let agreed_channel_max = local_open.channel_max.0;
        Self {
            local_state: ConnectionState::Start,
            local_open,
            local_sessions: Slab::new(),
            session_by_incoming_channel: BTreeMap::new(),
            session_by_outgoing_channel: BTreeMap::new(),
            remote_open: None,
            agreed_channel_max,
        }
    }

    pub fn local_state(&self) -> &ConnectionState {
        &self.local_state
    }

    pub fn local_state_mut(&mut self) -> &mut ConnectionState {
        &mut self.local_state
    }

    pub fn local_open(&self) -> &Open {
        &self.local_open
    }

    pub fn remote_open(&self) -> Option<&Open> {
        self.remote_open.as_ref()
    }

    pub fn allocate_session(
        &mut self,
        tx: mpsc::Sender<SessionIncomingItem>,
    ) -> Result<(u16, SessionId), AllocSessionError> {
        match &self.local_state {
            ConnectionState::Opened => {}
            _ => return Err(AllocSessionError::IllegalState),
        };

        let entry = self.local_sessions.vacant_entry();
        let session_id = entry.key();
        if session_id > self.agreed_channel_max as usize {
            return Err(AllocSessionError::ChannelMaxReached);
        }
        entry.insert(tx);
        let channel = session_id as u16;
        self.session_by_outgoing_channel.insert(channel, session_id);
        Ok((channel, session_id))
    }

    pub fn deallocate_session(&mut self, session_id: SessionId) {
        if self.local_sessions.contains(session_id) {
            self.local_sessions.remove(session_id);
        }
        self.session_by_outgoing_channel
            .retain(|_, id| *id != session_id);
        self.session_by_incoming_channel
            .retain(|_, id| *id != session_id);
    }

    /// Reacting to a remote open frame
    #[instrument(name = "RECV", skip_all)]
    pub fn on_incoming_open(&mut self, channel: u16, open: Open) -> Result<(), Error> {
        trace!(channel, frame = ?open);
        match &self.local_state {
            ConnectionState::HeaderExchange => self.local_state = ConnectionState::OpenReceived,
            ConnectionState::OpenSent => self.local_state = ConnectionState::Opened,
            ConnectionState::ClosePipe => self.local_state = ConnectionState::CloseSent,
            _ => return Err(AmqpError::IllegalState.into()),
        }

        self.agreed_channel_max = min(self.local_open.channel_max.0, open.channel_max.0);
        self.remote_open = Some(open);
        Ok(())
    }

    /// Reacting to a remote begin frame; the frame is forwarded to the
    /// session that initiated the outgoing begin
    #[instrument(name = "RECV", skip_all)]
    pub async fn on_incoming_begin(&mut self, channel: u16, begin: Begin) -> Result<(), Error> {
        trace!(channel, frame = ?begin);
        match &self.local_state {
            ConnectionState::Opened => {}
            _ => return Err(AmqpError::IllegalState.into()),
        }

        match begin.remote_channel {
            Some(outgoing_channel) => {
                let session_id = *self
                    .session_by_outgoing_channel
                    .get(&outgoing_channel)
                    .ok_or(Error::NotFound)?;
                if self.session_by_incoming_channel.contains_key(&channel) {
                    return Err(AmqpError::NotAllowed.into());
                }
                self.session_by_incoming_channel.insert(channel, session_id);

                let tx = self.local_sessions.get_mut(session_id).ok_or(Error::NotFound)?;
                let sframe = SessionFrame::new(channel, SessionFrameBody::Begin(begin));
                tx.send(sframe).await.map_err(|_| Error::NotFound)?;
            }
            None => {
                // remotely initiated sessions are a listener concern
                return Err(Error::Local(definitions::Error::new(
                    AmqpError::NotImplemented,
                    Some("Remotely initiated sessions are not supported".to_string()),
                    None,
                )));
            }
        }
        Ok(())
    }

    /// Reacting to a remote end frame
    #[instrument(name = "RECV", skip_all)]
    pub async fn on_incoming_end(&mut self, channel: u16, end: End) -> Result<(), Error> {
        trace!(channel, frame = ?end);
        match &self.local_state {
            ConnectionState::Opened => {}
            _ => return Err(AmqpError::IllegalState.into()),
        }

        let session_id = self
            .session_by_incoming_channel
            .remove(&channel)
            .ok_or(Error::NotFound)?;
        let sframe = SessionFrame::new(channel, SessionFrameBody::End(end));
        self.local_sessions
            .get_mut(session_id)
            .ok_or(Error::NotFound)?
            .send(sframe)
            .await
            .map_err(|_| Error::NotFound)?;
        Ok(())
    }

    /// Reacting to a remote close frame. Returns the remote error, if any.
    #[instrument(name = "RECV", skip_all)]
    pub fn on_incoming_close(
        &mut self,
        channel: u16,
        close: Close,
    ) -> Result<Option<definitions::Error>, Error> {
        trace!(channel, frame = ?close);
        match &self.local_state {
            ConnectionState::Opened => self.local_state = ConnectionState::CloseReceived,
            ConnectionState::CloseSent | ConnectionState::Discarding => {
                self.local_state = ConnectionState::End
            }
            _ => return Err(AmqpError::IllegalState.into()),
        };
        Ok(close.error)
    }

    #[instrument(name = "SEND", skip_all)]
    pub async fn send_open<W>(&mut self, writer: &mut W) -> Result<(), Error>
    where
        W: Sink<Frame> + Send + Unpin,
        W::Error: Into<Error>,
    {
        let frame = Frame::new(0, FrameBody::Open(self.local_open.clone()));
        trace!(channel = 0, frame = ?frame.body);
        writer.send(frame).await.map_err(Into::into)?;

        match &self.local_state {
            ConnectionState::HeaderExchange => self.local_state = ConnectionState::OpenSent,
            ConnectionState::OpenReceived => self.local_state = ConnectionState::Opened,
            ConnectionState::HeaderSent => self.local_state = ConnectionState::OpenPipe,
            _ => return Err(AmqpError::IllegalState.into()),
        }
        Ok(())
    }

    #[instrument(name = "SEND", skip_all)]
    pub async fn send_close<W>(
        &mut self,
        writer: &mut W,
        error: Option<definitions::Error>,
    ) -> Result<(), Error>
    where
        W: Sink<Frame> + Send + Unpin,
        W::Error: Into<Error>,
    {
        let discarding = error.is_some();
        let frame = Frame::new(0, FrameBody::Close(Close { error }));
        trace!(channel = 0, frame = ?frame.body);
        writer.send(frame).await.map_err(Into::into)?;

        match &self.local_state {
            ConnectionState::Opened => {
                self.local_state = match discarding {
                    true => ConnectionState::Discarding,
                    false => ConnectionState::CloseSent,
                }
            }
            ConnectionState::CloseReceived => self.local_state = ConnectionState::End,
            ConnectionState::OpenSent => self.local_state = ConnectionState::ClosePipe,
            ConnectionState::OpenPipe => self.local_state = ConnectionState::OpenClosePipe,
            _ => return Err(AmqpError::IllegalState.into()),
        }
        Ok(())
    }

    pub fn on_outgoing_begin(&mut self, channel: u16, begin: Begin) -> Frame {
        Frame::new(channel, FrameBody::Begin(begin))
    }

    pub fn on_outgoing_end(&mut self, channel: u16, end: End) -> Result<Frame, Error> {
        self.session_by_outgoing_channel
            .remove(&channel)
            .ok_or(Error::NotFound)?;
        Ok(Frame::new(channel, FrameBody::End(end)))
    }

    pub fn session_tx_by_incoming_channel(
        &mut self,
        channel: u16,
    ) -> Option<&mut mpsc::Sender<SessionIncomingItem>> {
        let session_id = self.session_by_incoming_channel.get(&channel)?;
        self.local_sessions.get_mut(*session_id)
    }
}

pub(crate) async fn deallocate_session(
    control: &mpsc::Sender<ConnectionControl>,
    session_id: SessionId,
) -> Result<(), Error> {
    control
        .send(ConnectionControl::DeallocateSession(session_id))
        .await
        .map_err(|_| {
            Error::Io(io::Error::new(
                io::ErrorKind::Other,
                "Connection event loop has stopped",
            ))
        })
}
