//! Implementation of the AMQP 1.0 sender

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use siderite_amqp_types::definitions::{
    self, DeliveryTag, Handle, ReceiverSettleMode, SenderSettleMode,
};
use siderite_amqp_types::messaging::{Accepted, DeliveryState, Outcome, Source, Target};
use siderite_amqp_types::performatives::{Detach, Transfer};
use siderite_amqp_types::states::LinkState;

use crate::session::SessionHandle;

use super::builder::{self, role};
use super::delivery::{Sendable, UnsettledMessage};
use super::error::{AttachError, DetachError, SendError};
use super::frame::LinkFrame;
use super::state::SenderFlowState;
use super::SenderUnsettledMap;

/// Conservative allowance for the frame header and the transfer
/// performative when slicing a message across frames
const TRANSFER_FRAME_OVERHEAD: usize = 128;

/// An AMQP 1.0 sender.
///
/// A message is sent as one or more transfer frames sized against the
/// connection's max-frame-size; the call resolves once the delivery is
/// settled by both sides.
///
/// # Example
///
/// ```rust,ignore
/// let mut sender = Sender::attach(&mut session, "rust-sender-link-1", "q1").await?;
/// let outcome = sender.send("hello AMQP").await?;
/// sender.close().await?;
/// ```
#[derive(Debug)]
pub struct Sender {
    pub(crate) name: String,
    pub(crate) output_handle: Handle,
    pub(crate) snd_settle_mode: SenderSettleMode,
    pub(crate) rcv_settle_mode: ReceiverSettleMode,
    pub(crate) source: Option<Source>,
    pub(crate) target: Option<Target>,

    /// The max-message-size in force: the minimum of what both peers
    /// announced, zero meaning unlimited
    pub(crate) max_message_size: u64,
    pub(crate) max_frame_size: usize,

    pub(crate) flow_state: Arc<SenderFlowState>,
    pub(crate) unsettled: SenderUnsettledMap,
    pub(crate) next_delivery_tag: u64,

    pub(crate) incoming: mpsc::Receiver<LinkFrame>,
    pub(crate) outgoing: mpsc::Sender<LinkFrame>,

    pub(crate) state: LinkState,
}

impl Sender {
    /// Creates a builder for a [`Sender`]
    pub fn builder() -> builder::Builder<role::SenderMarker> {
        builder::Builder::<role::SenderMarker>::new()
    }

    /// Attaches a sender link with the default configuration
    pub async fn attach(
        session: &mut SessionHandle,
        name: impl Into<String>,
        addr: impl Into<String>,
    ) -> Result<Sender, AttachError> {
        let addr: String = addr.into();
        Self::builder().name(name).target(addr).attach(session).await
    }

    /// The name of the link
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The max-message-size in force on the link; `None` means the peers
    /// did not impose a limit
    pub fn max_message_size(&self) -> Option<u64> {
        match self.max_message_size {
            0 => None,
            size => Some(size),
        }
    }

    /// The source of the link
    pub fn source(&self) -> &Option<Source> {
        &self.source
    }

    /// The target of the link
    pub fn target(&self) -> &Option<Target> {
        &self.target
    }

    /// Sends a message and waits for the delivery outcome.
    ///
    /// The call first waits for link credit, then slices the message into
    /// transfer frames. On a link attached with the settled sender settle
    /// mode (or a pre-settled [`Sendable`] in mixed mode) the call returns
    /// accepted as soon as the frames are handed to the session.
    pub async fn send(&mut self, sendable: impl Into<Sendable>) -> Result<Outcome, SendError> {
        match self.send_inner(sendable.into()).await? {
            // pre-settled deliveries have no disposition to wait for
            None => Ok(Outcome::Accepted(Accepted {})),
            Some(rx) => match rx.await {
                Ok(Some(state)) => state
                    .into_outcome()
                    .ok_or(SendError::NonTerminalDeliveryState),
                // settled without a state counts as accepted
                Ok(None) => Ok(Outcome::Accepted(Accepted {})),
                Err(_) => Err(SendError::Detached),
            },
        }
    }

    /// Sends a message, giving up after the timeout.
    ///
    /// A timed-out delivery stays in the unsettled map until a disposition
    /// arrives or the link detaches.
    pub async fn send_with_timeout(
        &mut self,
        sendable: impl Into<Sendable>,
        duration: Duration,
    ) -> Result<Outcome, SendError> {
        match tokio::time::timeout(duration, self.send(sendable)).await {
            Ok(outcome) => outcome,
            Err(_elapsed) => Err(SendError::Timeout),
        }
    }

    async fn send_inner(
        &mut self,
        sendable: Sendable,
    ) -> Result<Option<oneshot::Receiver<Option<DeliveryState>>>, SendError> {
        match self.state {
            LinkState::Attached => {}
            _ => return Err(SendError::IllegalState),
        }

        let Sendable {
            message,
            message_format,
            settled,
        } = sendable;

        let mut buf = BytesMut::new();
        message.encode(&mut buf)?;
        let payload = buf.freeze();

        if self.max_message_size > 0 && payload.len() as u64 > self.max_message_size {
            return Err(SendError::MessageSizeExceeded);
        }

        let settled = match self.snd_settle_mode {
            SenderSettleMode::Unsettled => false,
            SenderSettleMode::Settled => true,
            SenderSettleMode::Mixed => settled.unwrap_or(false),
        };

        // park until the receiver grants credit
        self.flow_state.consume(1).await;

        let delivery_tag = DeliveryTag::from(self.next_delivery_tag.to_be_bytes().to_vec());
        self.next_delivery_tag = self.next_delivery_tag.wrapping_add(1);

        // the unsettled entry must exist before the first frame leaves,
        // otherwise a fast disposition could miss it
        let rx = match settled {
            true => None,
            false => {
                let (tx, rx) = oneshot::channel();
                self.unsettled
                    .lock()
                    .insert(delivery_tag.clone(), UnsettledMessage::new(payload.clone(), tx));
                Some(rx)
            }
        };

        let max_payload = self
            .max_frame_size
            .saturating_sub(TRANSFER_FRAME_OVERHEAD)
            .max(1);
        let mut remaining = payload;
        let mut is_first = true;
        loop {
            let chunk = if remaining.len() > max_payload {
                remaining.split_to(max_payload)
            } else {
                std::mem::take(&mut remaining)
            };
            let more = !remaining.is_empty();

            let performative = Transfer {
                handle: self.output_handle,
                // the session assigns the delivery-id on the first frame
                delivery_id: None,
                delivery_tag: is_first.then(|| delivery_tag.clone()),
                message_format: is_first.then_some(message_format),
                settled: is_first.then_some(settled),
                more,
                rcv_settle_mode: None,
                state: None,
                resume: false,
                aborted: false,
                batchable: false,
            };

            self.outgoing
                .send(LinkFrame::Transfer {
                    performative,
                    payload: chunk,
                })
                .await
                .map_err(|_| SendError::IllegalSessionState)?;

            is_first = false;
            if !more {
                break;
            }
        }

        Ok(rx)
    }

    /// Detaches the link, keeping unsettled deliveries available for
    /// resumption
    pub async fn detach(mut self) -> Result<(), DetachError> {
        self.detach_inner(false, None).await
    }

    /// Closes the link, discarding any unsettled deliveries
    pub async fn close(mut self) -> Result<(), DetachError> {
        self.detach_inner(true, None).await
    }

    /// Closes the link, carrying an error to the peer
    pub async fn close_with_error(
        mut self,
        error: impl Into<definitions::Error>,
    ) -> Result<(), DetachError> {
        self.detach_inner(true, Some(error.into())).await
    }

    async fn detach_inner(
        &mut self,
        closed: bool,
        error: Option<definitions::Error>,
    ) -> Result<(), DetachError> {
        match self.state {
            LinkState::Attached => {}
            _ => return Err(DetachError::IllegalState),
        }

        let detach = Detach {
            handle: self.output_handle,
            closed,
            error,
        };
        self.outgoing
            .send(LinkFrame::Detach(detach))
            .await
            .map_err(|_| DetachError::IllegalSessionState)?;
        self.state = match closed {
            true => LinkState::CloseSent,
            false => LinkState::DetachSent,
        };

        loop {
            let frame = self
                .incoming
                .recv()
                .await
                .ok_or(DetachError::IllegalSessionState)?;
            let remote_detach = match frame {
                LinkFrame::Detach(detach) => detach,
                // in-flight frames racing the detach are dropped
                other => {
                    debug!(?other, "Dropping frame while detaching");
                    continue;
                }
            };

            if closed {
                self.state = LinkState::Closed;
                // a closing detach discards the unsettled state; pending
                // sends resolve with a detached error
                self.unsettled.lock().clear();
                if !remote_detach.closed {
                    return Err(DetachError::DetachedByRemote);
                }
            } else {
                self.state = match remote_detach.closed {
                    true => LinkState::Closed,
                    false => LinkState::Detached,
                };
                if remote_detach.closed {
                    self.unsettled.lock().clear();
                    return Err(DetachError::ClosedByRemote);
                }
            }

            return match remote_detach.error {
                Some(error) => Err(DetachError::RemoteDetachedWithError(error)),
                None => Ok(()),
            };
        }
    }
}
