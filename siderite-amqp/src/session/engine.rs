//! The session event loop

use std::collections::VecDeque;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument};

use siderite_amqp_types::definitions::{self, AmqpError, Handle, SessionError};
use siderite_amqp_types::performatives::Transfer;
use siderite_amqp_types::states::SessionState;

use crate::connection::{self, SessionId};
use crate::control::{ConnectionControl, SessionControl};
use crate::link::LinkFrame;
use crate::util::Running;
use crate::Payload;

use super::{
    Error, BeginError, Session, SessionFrame, SessionFrameBody, SessionIncomingItem,
    SessionInnerError,
};

pub(crate) struct SessionEngine {
    conn_control: mpsc::Sender<ConnectionControl>,
    session_id: SessionId,
    session: Session,
    control: mpsc::Receiver<SessionControl>,
    incoming: mpsc::Receiver<SessionIncomingItem>,
    outgoing: mpsc::Sender<SessionFrame>,
    outgoing_link_frames: mpsc::Receiver<LinkFrame>,

    /// Transfers held back while the remote incoming window is closed.
    /// Flushed when a flow frame reopens it.
    pending_transfers: VecDeque<(Handle, Transfer, Payload)>,

    /// Set once `outgoing_link_frames` has been closed and drained so the
    /// event loop stops polling the exhausted channel
    link_frames_closed: bool,
}

impl SessionEngine {
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn begin_client_session(
        conn_control: mpsc::Sender<ConnectionControl>,
        session_id: SessionId,
        session: Session,
        control: mpsc::Receiver<SessionControl>,
        incoming: mpsc::Receiver<SessionIncomingItem>,
        outgoing: mpsc::Sender<SessionFrame>,
        outgoing_link_frames: mpsc::Receiver<LinkFrame>,
    ) -> Result<Self, BeginError> {
        let mut engine = Self {
            conn_control,
            session_id,
            session,
            control,
            incoming,
            outgoing,
            outgoing_link_frames,
            pending_transfers: VecDeque::new(),
            link_frames_closed: false,
        };

        // send a begin and wait for the remote begin
        engine.session.send_begin(&engine.outgoing).await?;
        let frame = engine
            .incoming
            .recv()
            .await
            .ok_or(BeginError::IllegalConnectionState)?;
        let SessionFrame { channel, body } = frame;
        let remote_begin = match body {
            SessionFrameBody::Begin(begin) => begin,
            SessionFrameBody::End(end) => {
                return Err(match end.error {
                    Some(error) => BeginError::RemoteEndedWithError(error),
                    None => BeginError::RemoteEnded,
                })
            }
            _ => return Err(BeginError::IllegalState),
        };
        engine.session.on_incoming_begin(channel, remote_begin)?;
        Ok(engine)
    }

    pub(crate) fn spawn(self) -> JoinHandle<Result<(), Error>> {
        tokio::spawn(self.event_loop())
    }

    async fn flush_pending_transfers(&mut self) -> Result<(), SessionInnerError> {
        while self.session.remote_incoming_window() > 0 {
            let (input_handle, transfer, payload) = match self.pending_transfers.pop_front() {
                Some(pending) => pending,
                None => break,
            };
            let frame = self
                .session
                .on_outgoing_transfer(input_handle, transfer, payload);
            self.outgoing
                .send(frame)
                .await
                .map_err(|_| SessionInnerError::IllegalConnectionState)?;
        }
        Ok(())
    }

    #[instrument(skip_all)]
    async fn on_incoming(
        &mut self,
        incoming: SessionIncomingItem,
    ) -> Result<Running, SessionInnerError> {
        let SessionFrame { channel, body } = incoming;
        match body {
            SessionFrameBody::Begin(begin) => {
                self.session
                    .on_incoming_begin(channel, begin)
                    .map_err(|_| SessionInnerError::IllegalState)?;
                self.flush_pending_transfers().await?;
            }
            SessionFrameBody::Attach(attach) => {
                self.session.on_incoming_attach(attach).await?;
            }
            SessionFrameBody::Flow(flow) => {
                let echo = self.session.on_incoming_flow(flow).await?;
                // reopened windows release gated transfers before any echo
                self.flush_pending_transfers().await?;
                if let Some(link_flow) = echo {
                    let frame = self.session.on_outgoing_flow(link_flow);
                    self.outgoing
                        .send(frame)
                        .await
                        .map_err(|_| SessionInnerError::IllegalConnectionState)?;
                }
            }
            SessionFrameBody::Transfer {
                performative,
                payload,
            } => {
                let replenish = self
                    .session
                    .on_incoming_transfer(performative, payload)
                    .await?;
                if let Some(frame) = replenish {
                    self.outgoing
                        .send(frame)
                        .await
                        .map_err(|_| SessionInnerError::IllegalConnectionState)?;
                }
            }
            SessionFrameBody::Disposition(disposition) => {
                if let Some(dispositions) = self.session.on_incoming_disposition(disposition)? {
                    for disposition in dispositions {
                        let frame = self.session.on_outgoing_disposition(disposition);
                        self.outgoing
                            .send(frame)
                            .await
                            .map_err(|_| SessionInnerError::IllegalConnectionState)?;
                    }
                }
            }
            SessionFrameBody::Detach(detach) => {
                self.session.on_incoming_detach(detach).await?;
            }
            SessionFrameBody::End(end) => {
                let result = self.session.on_incoming_end(channel, end);
                if matches!(self.session.local_state(), SessionState::EndReceived) {
                    // finish flushing buffered link frames before answering
                    self.close_and_drain_link_frames().await?;
                    self.session.send_end(&self.outgoing, None).await?;
                }
                result?;
            }
        }

        match self.session.local_state() {
            SessionState::Unmapped => Ok(Running::Stop),
            _ => Ok(Running::Continue),
        }
    }

    #[instrument(skip_all)]
    async fn on_control(&mut self, control: SessionControl) -> Result<Running, SessionInnerError> {
        match control {
            SessionControl::End(error) => {
                self.close_and_drain_link_frames().await?;
                self.session.send_end(&self.outgoing, error).await?;
            }
            SessionControl::AllocateLink {
                link_name,
                link_relay,
                responder,
            } => {
                let result = self.session.allocate_link(link_name, link_relay);
                responder
                    .send(result)
                    .map_err(|_| SessionInnerError::UnattachedHandle)?;
            }
            SessionControl::DeallocateLink(output_handle) => {
                self.session.deallocate_link(output_handle);
            }
            SessionControl::Disposition(disposition) => {
                let frame = self.session.on_outgoing_disposition(disposition);
                self.outgoing
                    .send(frame)
                    .await
                    .map_err(|_| SessionInnerError::IllegalConnectionState)?;
            }
        }

        match self.session.local_state() {
            SessionState::Unmapped => Ok(Running::Stop),
            _ => Ok(Running::Continue),
        }
    }

    async fn close_and_drain_link_frames(&mut self) -> Result<(), SessionInnerError> {
        self.outgoing_link_frames.close();
        self.link_frames_closed = true;
        while let Some(frame) = self.outgoing_link_frames.recv().await {
            self.on_outgoing_link_frames(frame).await?;
        }
        Ok(())
    }

    async fn on_outgoing_link_frames(
        &mut self,
        frame: LinkFrame,
    ) -> Result<Running, SessionInnerError> {
        match self.session.local_state() {
            SessionState::Mapped => {}
            _ => return Err(SessionInnerError::IllegalState),
        }

        let outgoing = match frame {
            LinkFrame::Attach(attach) => Some(self.session.on_outgoing_attach(attach)),
            LinkFrame::Flow(link_flow) => Some(self.session.on_outgoing_flow(link_flow)),
            LinkFrame::Transfer {
                performative,
                payload,
            } => {
                let input_handle = performative.handle;
                // a transfer is never sent while the remote incoming
                // window is closed
                if self.session.remote_incoming_window() == 0 {
                    self.pending_transfers
                        .push_back((input_handle, performative, payload));
                    None
                } else {
                    Some(
                        self.session
                            .on_outgoing_transfer(input_handle, performative, payload),
                    )
                }
            }
            LinkFrame::Disposition(disposition) => {
                Some(self.session.on_outgoing_disposition(disposition))
            }
            LinkFrame::Detach(detach) => Some(self.session.on_outgoing_detach(detach)),
        };

        if let Some(frame) = outgoing {
            self.outgoing
                .send(frame)
                .await
                .map_err(|_| SessionInnerError::IllegalConnectionState)?;
        }

        match self.session.local_state() {
            SessionState::Unmapped => Ok(Running::Stop),
            _ => Ok(Running::Continue),
        }
    }

    async fn on_error(&mut self, kind: &SessionInnerError) -> Running {
        let error = match kind {
            SessionInnerError::UnattachedHandle => Some(definitions::Error::from(
                SessionError::UnattachedHandle,
            )),
            SessionInnerError::RemoteAttachingLinkNameNotFound => Some(definitions::Error::new(
                AmqpError::InternalError,
                Some("Link name is not found".to_string()),
                None,
            )),
            SessionInnerError::HandleInUse => {
                Some(definitions::Error::from(SessionError::HandleInUse))
            }
            SessionInnerError::IllegalState => {
                Some(definitions::Error::from(AmqpError::IllegalState))
            }
            SessionInnerError::IllegalConnectionState => return Running::Stop,
            SessionInnerError::TransferFrameToSender => Some(definitions::Error::new(
                AmqpError::NotAllowed,
                Some("A transfer frame was sent to a sender link".to_string()),
                None,
            )),
            SessionInnerError::WindowViolation => {
                Some(definitions::Error::from(SessionError::WindowViolation))
            }
            SessionInnerError::RemoteEnded | SessionInnerError::RemoteEndedWithError(_) => None,
        };

        match self.end_session(error).await {
            Ok(running) => running,
            Err(_) => Running::Stop,
        }
    }

    async fn end_session(
        &mut self,
        error: Option<definitions::Error>,
    ) -> Result<Running, SessionInnerError> {
        match self.session.local_state() {
            SessionState::BeginSent | SessionState::BeginReceived | SessionState::Mapped => {
                self.session.send_end(&self.outgoing, error).await?;
                self.wait_for_remote_end().await?;
            }
            SessionState::EndSent | SessionState::Discarding => {
                self.wait_for_remote_end().await?;
            }
            SessionState::EndReceived => {
                self.session.send_end(&self.outgoing, error).await?;
            }
            SessionState::Unmapped => {}
        }
        Ok(Running::Stop)
    }

    async fn wait_for_remote_end(&mut self) -> Result<(), SessionInnerError> {
        loop {
            let frame = self
                .incoming
                .recv()
                .await
                .ok_or(SessionInnerError::IllegalConnectionState)?;
            if let SessionFrameBody::End(end) = frame.body {
                // incoming frames other than end are discarded while ending
                let _ = self.session.on_incoming_end(frame.channel, end);
                return Ok(());
            }
        }
    }

    #[instrument(name = "Session::event_loop", skip(self), fields(outgoing_channel = %self.session.outgoing_channel()))]
    async fn event_loop(mut self) -> Result<(), Error> {
        let mut outcome: Result<(), SessionInnerError> = Ok(());
        loop {
            let result = tokio::select! {
                incoming = self.incoming.recv() => {
                    match incoming {
                        Some(incoming) => self.on_incoming(incoming).await,
                        None => {
                            match self.session.local_state() {
                                SessionState::Unmapped | SessionState::Discarding => Ok(Running::Stop),
                                // the connection stopped before the session
                                // finished ending
                                _ => Err(SessionInnerError::IllegalConnectionState),
                            }
                        }
                    }
                },
                control = self.control.recv() => {
                    match control {
                        Some(control) => self.on_control(control).await,
                        None => {
                            // every link handle and the session handle are
                            // dropped; end the session cleanly
                            let result = self.end_session(None).await;
                            match result {
                                Ok(_) => Ok(Running::Stop),
                                Err(error) => Err(error),
                            }
                        }
                    }
                },
                frame = self.outgoing_link_frames.recv(), if !self.link_frames_closed => {
                    match frame {
                        Some(frame) => self.on_outgoing_link_frames(frame).await,
                        None => {
                            // every link and the session handle are gone
                            self.link_frames_closed = true;
                            Ok(Running::Continue)
                        }
                    }
                }
            };

            let running = match result {
                Ok(running) => running,
                Err(inner) => {
                    error!(?inner);
                    let running = self.on_error(&inner).await;
                    outcome = Err(inner);
                    running
                }
            };

            if let Running::Stop = running {
                break;
            }
        }

        self.control.close();
        self.outgoing_link_frames.close();

        debug!("Stopped");
        let _ = connection::deallocate_session(&self.conn_control, self.session_id).await;
        outcome.map_err(Into::into)
    }
}
