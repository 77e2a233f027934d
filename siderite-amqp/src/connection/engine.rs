//! The connection event loop

use std::cmp::min;
use std::io;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, trace};

use siderite_amqp_types::definitions::{self, AmqpError, ConnectionError, SessionError};
use siderite_amqp_types::states::ConnectionState;

use crate::control::ConnectionControl;
use crate::frames::amqp::{Frame, FrameBody};
use crate::session::{SessionFrame, SessionFrameBody};
use crate::transport::Transport;
use crate::util::Running;

use super::{Connection, Error, HeartBeat, OpenError};

const ERROR_CLOSE_WAIT_SECS: u64 = 10;

pub(crate) struct ConnectionEngine<Io> {
    transport: Transport<Io>,
    connection: Connection,
    control: mpsc::Receiver<ConnectionControl>,
    outgoing_session_frames: mpsc::Receiver<SessionFrame>,
    heartbeat: HeartBeat,
    remote_error: Option<definitions::Error>,
}

impl<Io> ConnectionEngine<Io>
where
    Io: AsyncRead + AsyncWrite + std::fmt::Debug + Send + Unpin + 'static,
{
    /// Performs the open handshake without starting the event loop
    pub(crate) async fn open(
        transport: Transport<Io>,
        connection: Connection,
        control: mpsc::Receiver<ConnectionControl>,
        outgoing_session_frames: mpsc::Receiver<SessionFrame>,
        idle_time_out_ratio: f64,
    ) -> Result<Self, OpenError> {
        let mut engine = Self {
            transport,
            connection,
            control,
            outgoing_session_frames,
            heartbeat: HeartBeat::never(),
            remote_error: None,
        };

        engine
            .connection
            .send_open(&mut engine.transport)
            .await
            .map_err(open_error)?;

        let frame = match engine.transport.next().await {
            Some(frame) => frame?,
            None => {
                return Err(OpenError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "Expecting an open frame",
                )))
            }
        };

        let Frame { channel, body } = frame;
        match body {
            FrameBody::Open(open) => engine.on_remote_open(channel, open, idle_time_out_ratio)?,
            FrameBody::Close(close) => {
                return match close.error {
                    Some(error) => Err(OpenError::RemoteClosedWithError(error)),
                    None => Err(OpenError::IllegalState),
                }
            }
            _ => return Err(OpenError::IllegalState),
        }

        Ok(engine)
    }

    fn on_remote_open(
        &mut self,
        channel: u16,
        open: siderite_amqp_types::performatives::Open,
        idle_time_out_ratio: f64,
    ) -> Result<(), OpenError> {
        let remote_max_frame_size = open.max_frame_size.0;
        let remote_idle_time_out = open.idle_time_out;

        self.connection
            .on_incoming_open(channel, open)
            .map_err(open_error)?;

        // effective max-frame-size is the min of both proposals
        let max_frame_size = min(
            self.connection.local_open().max_frame_size.0,
            remote_max_frame_size,
        );
        self.transport.set_max_frame_size(max_frame_size as usize);

        // keep the remote alive by sending empty frames at a fraction of
        // its announced idle timeout
        self.heartbeat = match remote_idle_time_out {
            Some(millis) if millis > 0 => {
                let period = (millis as f64 * idle_time_out_ratio) as u64;
                HeartBeat::new(Duration::from_millis(period.max(1)))
            }
            _ => HeartBeat::never(),
        };
        Ok(())
    }

    pub(crate) fn max_frame_size(&self) -> usize {
        self.transport.max_frame_size()
    }

    pub(crate) fn spawn(self) -> JoinHandle<Result<(), Error>> {
        tokio::spawn(self.event_loop())
    }

    async fn forward_to_session(&mut self, channel: u16, sframe: SessionFrame) -> Result<(), Error> {
        match self.connection.local_state() {
            ConnectionState::Opened => {}
            _ => return Err(AmqpError::IllegalState.into()),
        };

        match self.connection.session_tx_by_incoming_channel(channel) {
            Some(tx) => tx.send(sframe).await.map_err(|_| Error::NotFound)?,
            None => return Err(Error::NotFound),
        };
        Ok(())
    }

    async fn on_incoming(&mut self, frame: Frame) -> Result<Running, Error> {
        let Frame { channel, body } = frame;

        match body {
            FrameBody::Open(_) => {
                // the client engine completes the open exchange before the
                // loop starts; a second open is a protocol violation
                return Err(AmqpError::IllegalState.into());
            }
            FrameBody::Begin(begin) => {
                self.connection.on_incoming_begin(channel, begin).await?;
            }
            FrameBody::Attach(attach) => {
                let sframe = SessionFrame::new(channel, SessionFrameBody::Attach(attach));
                self.forward_to_session(channel, sframe).await?;
            }
            FrameBody::Flow(flow) => {
                let sframe = SessionFrame::new(channel, SessionFrameBody::Flow(flow));
                self.forward_to_session(channel, sframe).await?;
            }
            FrameBody::Transfer {
                performative,
                payload,
            } => {
                let sframe = SessionFrame::new(
                    channel,
                    SessionFrameBody::Transfer {
                        performative,
                        payload,
                    },
                );
                self.forward_to_session(channel, sframe).await?;
            }
            FrameBody::Disposition(disposition) => {
                let sframe = SessionFrame::new(channel, SessionFrameBody::Disposition(disposition));
                self.forward_to_session(channel, sframe).await?;
            }
            FrameBody::Detach(detach) => {
                let sframe = SessionFrame::new(channel, SessionFrameBody::Detach(detach));
                self.forward_to_session(channel, sframe).await?;
            }
            FrameBody::End(end) => {
                self.connection.on_incoming_end(channel, end).await?;
            }
            FrameBody::Close(close) => {
                let remote_error = self.connection.on_incoming_close(channel, close)?;
                if matches!(self.connection.local_state(), ConnectionState::CloseReceived) {
                    self.connection.send_close(&mut self.transport, None).await?;
                }
                if let Some(error) = remote_error {
                    self.remote_error = Some(error);
                }
            }
            FrameBody::Empty => {
                // idle-timeout bookkeeping happens inside the transport
            }
        }

        match self.connection.local_state() {
            ConnectionState::End => Ok(Running::Stop),
            _ => Ok(Running::Continue),
        }
    }

    #[instrument(skip_all)]
    async fn on_control(&mut self, control: ConnectionControl) -> Result<Running, Error> {
        debug!(?control);
        match control {
            ConnectionControl::Close(error) => {
                self.connection.send_close(&mut self.transport, error).await?;
            }
            ConnectionControl::AllocateSession { tx, responder } => {
                let result = self.connection.allocate_session(tx);
                responder.send(result).map_err(|_| {
                    Error::Io(io::Error::new(
                        io::ErrorKind::Other,
                        "Session begin future is dropped",
                    ))
                })?;
            }
            ConnectionControl::DeallocateSession(session_id) => {
                self.connection.deallocate_session(session_id);
            }
        }

        match self.connection.local_state() {
            ConnectionState::End => Ok(Running::Stop),
            _ => Ok(Running::Continue),
        }
    }

    #[instrument(name = "SEND", skip_all)]
    async fn on_outgoing_session_frames(&mut self, frame: SessionFrame) -> Result<Running, Error> {
        match self.connection.local_state() {
            ConnectionState::Opened => {}
            _ => return Err(AmqpError::IllegalState.into()),
        }

        let SessionFrame { channel, body } = frame;
        let frame = match body {
            SessionFrameBody::Begin(begin) => self.connection.on_outgoing_begin(channel, begin),
            SessionFrameBody::Attach(attach) => Frame::new(channel, FrameBody::Attach(attach)),
            SessionFrameBody::Flow(flow) => Frame::new(channel, FrameBody::Flow(flow)),
            SessionFrameBody::Transfer {
                performative,
                payload,
            } => Frame::new(
                channel,
                FrameBody::Transfer {
                    performative,
                    payload,
                },
            ),
            SessionFrameBody::Disposition(disposition) => {
                Frame::new(channel, FrameBody::Disposition(disposition))
            }
            SessionFrameBody::Detach(detach) => Frame::new(channel, FrameBody::Detach(detach)),
            SessionFrameBody::End(end) => self.connection.on_outgoing_end(channel, end)?,
        };

        trace!(channel = frame.channel, frame = ?frame.body);
        self.transport.send(frame).await?;
        Ok(Running::Continue)
    }

    async fn on_heartbeat(&mut self) -> Result<Running, Error> {
        match self.connection.local_state() {
            ConnectionState::Start | ConnectionState::HeaderSent | ConnectionState::CloseSent => {
                return Ok(Running::Continue)
            }
            ConnectionState::End => return Ok(Running::Stop),
            _ => {}
        }

        self.transport.send(Frame::empty()).await?;
        Ok(Running::Continue)
    }

    async fn on_error(&mut self, error: &Error) -> Running {
        let close_error = match error {
            Error::Io(_) | Error::JoinError(_) => None,
            Error::Transport(err) => Some(err.clone()),
            Error::IllegalState => {
                Some(definitions::Error::from(AmqpError::IllegalState))
            }
            Error::NotFound => Some(definitions::Error::new(
                SessionError::UnattachedHandle,
                Some("Frame received on a channel with no session".to_string()),
                None,
            )),
            Error::ChannelMaxReached => Some(definitions::Error::new(
                ConnectionError::FramingError,
                Some("Channel max reached".to_string()),
                None,
            )),
            Error::RemoteClosed | Error::RemoteClosedWithError(_) => None,
            Error::Local(err) => Some(err.clone()),
        };

        match close_error {
            Some(err) => {
                let _ = self.connection.send_close(&mut self.transport, Some(err)).await;
                if let Err(elapsed) = self.recv_remote_close_with_timeout().await {
                    error!(?elapsed);
                }
                Running::Stop
            }
            None => Running::Stop,
        }
    }

    async fn recv_remote_close_with_timeout(&mut self) -> Result<(), tokio::time::error::Elapsed> {
        tokio::time::timeout(Duration::from_secs(ERROR_CLOSE_WAIT_SECS), async {
            while let Some(frame) = self.transport.next().await {
                if let Ok(Frame {
                    body: FrameBody::Close(_),
                    ..
                }) = frame
                {
                    break;
                }
            }
        })
        .await
    }

    #[instrument(name = "Connection::event_loop", skip(self), fields(container_id = %self.connection.local_open().container_id))]
    async fn event_loop(mut self) -> Result<(), Error> {
        let mut outcome = Ok(());
        loop {
            let result = tokio::select! {
                _ = self.heartbeat.next() => self.on_heartbeat().await,
                incoming = self.transport.next() => {
                    match incoming {
                        Some(Ok(frame)) => self.on_incoming(frame).await,
                        Some(Err(error)) => Err(error.into()),
                        None => {
                            match self.connection.local_state() {
                                ConnectionState::ClosePipe
                                | ConnectionState::Discarding
                                | ConnectionState::End => Ok(Running::Stop),
                                _ => Err(Error::Io(io::Error::new(
                                    io::ErrorKind::UnexpectedEof,
                                    "Transport closed before the connection",
                                ))),
                            }
                        }
                    }
                },
                control = self.control.recv() => {
                    match control {
                        Some(control) => self.on_control(control).await,
                        None => Ok(Running::Stop),
                    }
                },
                frame = self.outgoing_session_frames.recv() => {
                    match frame {
                        Some(frame) => self.on_outgoing_session_frames(frame).await,
                        None => Ok(Running::Stop),
                    }
                }
            };

            let running = match result {
                Ok(running) => running,
                Err(error) => {
                    error!(?error);
                    let running = self.on_error(&error).await;
                    outcome = Err(error);
                    running
                }
            };

            if let Running::Stop = running {
                break;
            }
        }

        // drain pending work so that no sender is left blocked on a
        // channel whose receiving half is gone
        self.control.close();
        self.outgoing_session_frames.close();

        debug!("Stopped");

        if let Some(error) = self.remote_error.take() {
            return Err(Error::RemoteClosedWithError(error));
        }
        outcome
    }
}

fn open_error(error: Error) -> OpenError {
    match error {
        Error::Io(err) => OpenError::Io(err),
        Error::Transport(err) => OpenError::Transport(err),
        Error::RemoteClosedWithError(err) => OpenError::RemoteClosedWithError(err),
        _ => OpenError::IllegalState,
    }
}
