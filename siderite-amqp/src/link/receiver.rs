//! Implementation of the AMQP 1.0 receiver

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use siderite_amqp_types::definitions::{
    self, Handle, ReceiverSettleMode, Role, SenderSettleMode,
};
use siderite_amqp_types::messaging::{
    Accepted, DeliveryState, Message, Modified, Rejected, Released, Source, Target,
};
use siderite_amqp_types::performatives::{Detach, Disposition};
use siderite_amqp_types::states::LinkState;

use crate::session::SessionHandle;
use crate::util::DeliveryInfo;

use super::builder::{self, role};
use super::delivery::Delivery;
use super::error::{
    AttachError, DetachError, DispositionError, FlowError, RecvError, TryRecvError,
};
use super::frame::LinkFrame;
use super::state::ReceiverFlowState;
use super::ReceiverUnsettledMap;

/// Default credit issued when a receiver is attached in the auto credit
/// mode
pub const DEFAULT_CREDIT: u32 = 256;

/// How a receiver manages its link credit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditMode {
    /// The receiver keeps at least half of the given credit outstanding by
    /// issuing flow frames as messages are consumed
    Auto(u32),

    /// The caller issues credit explicitly with
    /// [`set_credit`](Receiver::set_credit)
    Manual,
}

impl Default for CreditMode {
    fn default() -> Self {
        CreditMode::Auto(DEFAULT_CREDIT)
    }
}

/// An AMQP 1.0 receiver.
///
/// In the default configuration the receiver issues [`DEFAULT_CREDIT`]
/// credits on attach, keeps the credit topped up as messages are consumed,
/// and accepts every delivery as it is returned from
/// [`recv`](Receiver::recv). Manual settlement is available by turning
/// auto-accept off in the builder and using
/// [`accept`](Receiver::accept) / [`reject`](Receiver::reject) /
/// [`release`](Receiver::release) / [`modify`](Receiver::modify).
#[derive(Debug)]
pub struct Receiver {
    pub(crate) name: String,
    pub(crate) output_handle: Handle,
    pub(crate) snd_settle_mode: SenderSettleMode,
    pub(crate) rcv_settle_mode: ReceiverSettleMode,
    pub(crate) source: Option<Source>,
    pub(crate) target: Option<Target>,

    pub(crate) flow_state: Arc<ReceiverFlowState>,
    pub(crate) unsettled: ReceiverUnsettledMap,

    pub(crate) incoming: mpsc::Receiver<LinkFrame>,
    pub(crate) outgoing: mpsc::Sender<LinkFrame>,

    pub(crate) credit_mode: CreditMode,
    pub(crate) auto_accept: bool,

    /// Dispositions deferred from `try_recv`, flushed on the next async
    /// call
    pub(crate) pending_dispositions: Vec<Disposition>,

    pub(crate) state: LinkState,
}

impl Receiver {
    /// Creates a builder for a [`Receiver`]
    pub fn builder() -> builder::Builder<role::ReceiverMarker> {
        builder::Builder::<role::ReceiverMarker>::new()
    }

    /// Attaches a receiver link with the default configuration
    pub async fn attach(
        session: &mut SessionHandle,
        name: impl Into<String>,
        addr: impl Into<String>,
    ) -> Result<Receiver, AttachError> {
        let addr: String = addr.into();
        Self::builder().name(name).source(addr).attach(session).await
    }

    /// The name of the link
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The source of the link
    pub fn source(&self) -> &Option<Source> {
        &self.source
    }

    /// The target of the link
    pub fn target(&self) -> &Option<Target> {
        &self.target
    }

    /// Waits for the next fully assembled, non-aborted message.
    ///
    /// Under auto-accept the delivery is accepted and settled before it is
    /// returned; otherwise the caller decides with
    /// [`accept`](Self::accept) and friends.
    pub async fn recv(&mut self) -> Result<Delivery, RecvError> {
        self.flush_pending_dispositions().await;

        loop {
            match self.state {
                LinkState::Attached => {}
                _ => return Err(RecvError::IllegalState),
            }

            let frame = self
                .incoming
                .recv()
                .await
                .ok_or(RecvError::IllegalState)?;
            let delivery = match self.on_incoming_frame(frame)? {
                Some(delivery) => delivery,
                None => continue,
            };

            if self.auto_accept && !delivery.settled {
                self.dispose_inner(
                    delivery.clone_info(),
                    DeliveryState::Accepted(Accepted {}),
                )
                .await
                .map_err(|_| RecvError::IllegalState)?;
            }
            self.replenish_credit().await;
            return Ok(delivery);
        }
    }

    /// Returns an already-arrived message without waiting.
    ///
    /// Deferred dispositions (auto-accept) are issued on the next async
    /// call on this receiver. On links attached in the second receiver
    /// settle mode `try_recv` never auto-accepts.
    pub fn try_recv(&mut self) -> Result<Delivery, TryRecvError> {
        loop {
            let frame = match self.incoming.try_recv() {
                Ok(frame) => frame,
                Err(mpsc::error::TryRecvError::Empty) => return Err(TryRecvError::Empty),
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    return Err(TryRecvError::Detached)
                }
            };
            let delivery = match self.on_incoming_frame(frame) {
                Ok(Some(delivery)) => delivery,
                Ok(None) => continue,
                Err(_) => return Err(TryRecvError::Detached),
            };

            if self.auto_accept
                && !delivery.settled
                && matches!(delivery.rcv_settle_mode, ReceiverSettleMode::First)
            {
                self.pending_dispositions.push(Disposition {
                    role: Role::Receiver,
                    first: delivery.delivery_id,
                    last: None,
                    settled: true,
                    state: Some(DeliveryState::Accepted(Accepted {})),
                    batchable: false,
                });
            }
            return Ok(delivery);
        }
    }

    /// Accepts the delivery
    pub async fn accept(&mut self, delivery: &Delivery) -> Result<(), DispositionError> {
        self.dispose_inner(delivery.clone_info(), DeliveryState::Accepted(Accepted {}))
            .await
    }

    /// Rejects the delivery as invalid and unprocessable
    pub async fn reject(
        &mut self,
        delivery: &Delivery,
        error: impl Into<Option<definitions::Error>>,
    ) -> Result<(), DispositionError> {
        let state = DeliveryState::Rejected(Rejected {
            error: error.into(),
        });
        self.dispose_inner(delivery.clone_info(), state).await
    }

    /// Releases the delivery back to the source
    pub async fn release(&mut self, delivery: &Delivery) -> Result<(), DispositionError> {
        self.dispose_inner(delivery.clone_info(), DeliveryState::Released(Released {}))
            .await
    }

    /// Modifies and releases the delivery
    pub async fn modify(
        &mut self,
        delivery: &Delivery,
        modified: Modified,
    ) -> Result<(), DispositionError> {
        self.dispose_inner(delivery.clone_info(), DeliveryState::Modified(modified))
            .await
    }

    /// Issues the given amount of link credit, replacing the current
    /// amount
    pub async fn set_credit(&mut self, credit: u32) -> Result<(), FlowError> {
        match self.state {
            LinkState::Attached => {}
            _ => return Err(FlowError::IllegalState),
        }
        let flow = self.flow_state.issue_credit(credit, self.output_handle).await;
        self.outgoing
            .send(LinkFrame::Flow(flow))
            .await
            .map_err(|_| FlowError::IllegalSessionState)
    }

    /// Asks the sender to drain the outstanding credit: either use it all
    /// by sending messages or advance its delivery-count to consume it
    pub async fn drain(&mut self) -> Result<(), FlowError> {
        match self.state {
            LinkState::Attached => {}
            _ => return Err(FlowError::IllegalState),
        }
        let flow = self.flow_state.drain(self.output_handle).await;
        self.outgoing
            .send(LinkFrame::Flow(flow))
            .await
            .map_err(|_| FlowError::IllegalSessionState)
    }

    /// Detaches the link, keeping unsettled deliveries available for
    /// resumption
    pub async fn detach(mut self) -> Result<(), DetachError> {
        self.detach_inner(false, None).await
    }

    /// Closes the link, discarding unsettled state
    pub async fn close(mut self) -> Result<(), DetachError> {
        self.detach_inner(true, None).await
    }

    fn on_incoming_frame(&mut self, frame: LinkFrame) -> Result<Option<Delivery>, RecvError> {
        match frame {
            LinkFrame::Transfer {
                performative,
                payload,
            } => {
                let delivery_id = performative
                    .delivery_id
                    .ok_or(RecvError::IllegalState)?;
                let delivery_tag = performative
                    .delivery_tag
                    .ok_or(RecvError::IllegalState)?;
                let settled = performative.settled.unwrap_or(false);
                let rcv_settle_mode = performative
                    .rcv_settle_mode
                    .unwrap_or(self.rcv_settle_mode);

                let message = Message::from_slice(&payload)?;
                Ok(Some(Delivery {
                    delivery_id,
                    delivery_tag,
                    rcv_settle_mode,
                    settled,
                    message,
                }))
            }
            LinkFrame::Detach(detach) => {
                self.state = match detach.closed {
                    true => LinkState::CloseReceived,
                    false => LinkState::DetachReceived,
                };
                match detach.closed {
                    true => Err(RecvError::RemoteClosed(detach.error)),
                    false => Err(RecvError::RemoteDetached(detach.error)),
                }
            }
            other => {
                debug!(?other, "Ignoring frame");
                Ok(None)
            }
        }
    }

    async fn dispose_inner(
        &mut self,
        info: DeliveryInfo,
        state: DeliveryState,
    ) -> Result<(), DispositionError> {
        match info.rcv_settle_mode {
            ReceiverSettleMode::First => {
                // the receiver settles spontaneously
                let disposition = Disposition {
                    role: Role::Receiver,
                    first: info.delivery_id,
                    last: None,
                    settled: true,
                    state: Some(state),
                    batchable: false,
                };
                self.outgoing
                    .send(LinkFrame::Disposition(disposition))
                    .await
                    .map_err(|_| DispositionError::IllegalSessionState)?;
            }
            ReceiverSettleMode::Second => {
                // send unsettled first, then wait for the sender to settle
                let (tx, rx) = oneshot::channel();
                self.unsettled.lock().insert(info.delivery_tag.clone(), tx);

                let disposition = Disposition {
                    role: Role::Receiver,
                    first: info.delivery_id,
                    last: None,
                    settled: false,
                    state: Some(state),
                    batchable: false,
                };
                self.outgoing
                    .send(LinkFrame::Disposition(disposition))
                    .await
                    .map_err(|_| DispositionError::IllegalSessionState)?;

                rx.await.map_err(|_| DispositionError::IllegalState)?;
            }
        }
        Ok(())
    }

    async fn flush_pending_dispositions(&mut self) {
        for disposition in self.pending_dispositions.drain(..) {
            let _ = self
                .outgoing
                .send(LinkFrame::Disposition(disposition))
                .await;
        }
    }

    async fn replenish_credit(&mut self) {
        if let CreditMode::Auto(max_credit) = self.credit_mode {
            let current = self.flow_state.link_credit().await;
            if current <= max_credit / 2 {
                let flow = self
                    .flow_state
                    .issue_credit(max_credit, self.output_handle)
                    .await;
                let _ = self.outgoing.send(LinkFrame::Flow(flow)).await;
            }
        }
    }

    async fn detach_inner(
        &mut self,
        closed: bool,
        error: Option<definitions::Error>,
    ) -> Result<(), DetachError> {
        match self.state {
            LinkState::Attached
            | LinkState::DetachReceived
            | LinkState::CloseReceived => {}
            _ => return Err(DetachError::IllegalState),
        }

        let remote_detach_received = matches!(
            self.state,
            LinkState::DetachReceived | LinkState::CloseReceived
        );

        let detach = Detach {
            handle: self.output_handle,
            closed,
            error,
        };
        self.outgoing
            .send(LinkFrame::Detach(detach))
            .await
            .map_err(|_| DetachError::IllegalSessionState)?;

        let remote_detach = if remote_detach_received {
            Detach {
                handle: self.output_handle,
                closed: matches!(self.state, LinkState::CloseReceived),
                error: None,
            }
        } else {
            loop {
                let frame = self
                    .incoming
                    .recv()
                    .await
                    .ok_or(DetachError::IllegalSessionState)?;
                match frame {
                    LinkFrame::Detach(detach) => break detach,
                    other => {
                        debug!(?other, "Dropping frame while detaching");
                        continue;
                    }
                }
            }
        };

        if closed {
            self.state = LinkState::Closed;
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

        match remote_detach.error {
            Some(error) => Err(DetachError::RemoteDetachedWithError(error)),
            None => Ok(()),
        }
    }
}
