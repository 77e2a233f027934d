//! Implementation of AMQP 1.0 links

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use siderite_amqp_types::definitions::{DeliveryTag, Handle, ReceiverSettleMode};
use siderite_amqp_types::messaging::DeliveryState;
use siderite_amqp_types::performatives::{Attach, Transfer};

use crate::session::SessionInnerError;
use crate::Payload;

pub mod builder;
mod delivery;
mod error;
pub(crate) mod frame;
mod receiver;
mod sender;
mod state;

pub use builder::Builder;
pub use delivery::{Delivery, Sendable};
pub use error::{
    AllocLinkError, AttachError, DetachError, DispositionError, FlowError, RecvError, SendError,
    TryRecvError,
};
pub use receiver::{CreditMode, Receiver};
pub use sender::Sender;

pub(crate) use delivery::UnsettledMessage;
pub(crate) use frame::{LinkFlow, LinkFrame};
pub(crate) use state::{LinkFlowStateInner, ReceiverFlowState, SenderFlowState};

pub(crate) type SenderUnsettledMap = Arc<Mutex<BTreeMap<DeliveryTag, UnsettledMessage>>>;
pub(crate) type ReceiverUnsettledMap = Arc<Mutex<BTreeMap<DeliveryTag, oneshot::Sender<()>>>>;

/// The session-resident half of a link: routes incoming frames to the link
/// endpoint and keeps the state both halves share
#[derive(Debug)]
pub(crate) enum LinkRelay {
    Sender {
        tx: mpsc::Sender<LinkFrame>,
        output_handle: Handle,
        flow_state: Arc<SenderFlowState>,
        unsettled: SenderUnsettledMap,
        receiver_settle_mode: ReceiverSettleMode,
    },
    Receiver {
        tx: mpsc::Sender<LinkFrame>,
        output_handle: Handle,
        flow_state: Arc<ReceiverFlowState>,
        unsettled: ReceiverUnsettledMap,
        incomplete: Option<IncompleteTransfer>,
    },
}

impl LinkRelay {
    pub fn set_output_handle(&mut self, handle: Handle) {
        match self {
            LinkRelay::Sender { output_handle, .. } => *output_handle = handle,
            LinkRelay::Receiver { output_handle, .. } => *output_handle = handle,
        }
    }

    /// Takes over the fields of the remote attach that govern this side's
    /// behavior
    pub fn on_remote_attach_fields(&mut self, attach: &Attach) {
        // the sender needs the receiver settle mode to know whether it has
        // to settle after an unsettled disposition
        if let LinkRelay::Sender {
            receiver_settle_mode,
            ..
        } = self
        {
            *receiver_settle_mode = attach.rcv_settle_mode;
        }
    }

    pub async fn send(
        &mut self,
        frame: LinkFrame,
    ) -> Result<(), mpsc::error::SendError<LinkFrame>> {
        match self {
            LinkRelay::Sender { tx, .. } => tx.send(frame).await,
            LinkRelay::Receiver { tx, .. } => tx.send(frame).await,
        }
    }

    /// Routes an incoming link flow; returns a flow to send back if the
    /// peer requested a drain or an echo
    pub async fn on_incoming_flow(&mut self, flow: LinkFlow) -> Option<LinkFlow> {
        match self {
            LinkRelay::Sender {
                flow_state,
                output_handle,
                ..
            } => flow_state.on_incoming_flow(flow, *output_handle).await,
            LinkRelay::Receiver {
                flow_state,
                output_handle,
                ..
            } => flow_state.on_incoming_flow(flow, *output_handle).await,
        }
    }

    /// Accepts one transfer frame, assembling multi-transfer deliveries.
    ///
    /// Returns the delivery identity of a completed unsettled delivery so
    /// the session can route the eventual disposition.
    pub async fn on_incoming_transfer(
        &mut self,
        transfer: Transfer,
        payload: Payload,
    ) -> Result<Option<(u32, DeliveryTag)>, SessionInnerError> {
        match self {
            LinkRelay::Sender { .. } => Err(SessionInnerError::TransferFrameToSender),
            LinkRelay::Receiver {
                tx,
                flow_state,
                incomplete,
                ..
            } => {
                if transfer.aborted {
                    // the receiver discards everything accumulated so far
                    *incomplete = None;
                    return Ok(None);
                }

                if incomplete.is_none() {
                    // one credit per delivery, not per frame
                    flow_state.on_incoming_delivery().await;
                }

                if transfer.more {
                    match incomplete {
                        Some(partial) => partial.buffer.push(payload),
                        None => *incomplete = Some(IncompleteTransfer::new(transfer, payload)),
                    }
                    return Ok(None);
                }

                let (performative, payload) = match incomplete.take() {
                    Some(mut partial) => {
                        partial.buffer.push(payload);
                        let payload = combine_payloads(partial.buffer);
                        (partial.performative, payload)
                    }
                    None => (transfer, payload),
                };

                let settled = performative.settled.unwrap_or(false);
                let id_and_tag = match (performative.delivery_id, &performative.delivery_tag) {
                    (Some(delivery_id), Some(delivery_tag)) if !settled => {
                        Some((delivery_id, delivery_tag.clone()))
                    }
                    _ => None,
                };

                tx.send(LinkFrame::Transfer {
                    performative,
                    payload,
                })
                .await
                .map_err(|_| SessionInnerError::UnattachedHandle)?;

                Ok(id_and_tag)
            }
        }
    }

    /// Applies an incoming disposition to the delivery with the given tag.
    ///
    /// Returns true when the session should echo a settled disposition
    /// (the receiver runs in the second settle mode and is waiting for the
    /// sender to settle).
    pub fn on_incoming_disposition(
        &mut self,
        settled: bool,
        state: Option<DeliveryState>,
        delivery_tag: DeliveryTag,
    ) -> bool {
        match self {
            LinkRelay::Sender {
                unsettled,
                receiver_settle_mode,
                ..
            } => {
                if settled {
                    if let Some(message) = unsettled.lock().remove(&delivery_tag) {
                        // a settling disposition without a state falls back
                        // to the provisional state seen earlier
                        let state = state.or_else(|| message.state.clone());
                        message.settle_with_state(state);
                    }
                    false
                } else if matches!(receiver_settle_mode, ReceiverSettleMode::Second) {
                    // the receiver holds the delivery until the sender
                    // settles; resolve locally and ask for the echo
                    if let Some(message) = unsettled.lock().remove(&delivery_tag) {
                        message.settle_with_state(state);
                    }
                    true
                } else {
                    // provisional state in the first settle mode
                    if let Some(message) = unsettled.lock().get_mut(&delivery_tag) {
                        message.state = state;
                    }
                    false
                }
            }
            LinkRelay::Receiver { unsettled, .. } => {
                if settled {
                    if let Some(sender) = unsettled.lock().remove(&delivery_tag) {
                        let _ = sender.send(());
                    }
                }
                false
            }
        }
    }
}

/// A partially received multi-transfer delivery
#[derive(Debug)]
pub(crate) struct IncompleteTransfer {
    pub performative: Transfer,
    pub buffer: Vec<Payload>,
}

impl IncompleteTransfer {
    fn new(performative: Transfer, first_payload: Payload) -> Self {
        Self {
            performative,
            buffer: vec![first_payload],
        }
    }
}

fn combine_payloads(buffer: Vec<Payload>) -> Payload {
    if buffer.len() == 1 {
        return buffer.into_iter().next().expect("len checked");
    }
    let total = buffer.iter().map(|p| p.len()).sum();
    let mut combined = BytesMut::with_capacity(total);
    for payload in buffer {
        combined.extend_from_slice(&payload);
    }
    combined.freeze()
}
