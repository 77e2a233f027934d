//! Link flow state shared between a link endpoint and the session loop

use tokio::sync::{Notify, RwLock};

use siderite_amqp_types::definitions::{Fields, Handle, SequenceNo};

use super::frame::LinkFlow;

#[derive(Debug)]
pub(crate) struct LinkFlowStateInner {
    pub initial_delivery_count: SequenceNo,
    pub delivery_count: SequenceNo,
    pub link_credit: u32,
    pub available: u32,
    pub drain: bool,
    pub properties: Option<Fields>,
}

impl LinkFlowStateInner {
    pub fn as_link_flow(&self, output_handle: Handle, echo: bool) -> LinkFlow {
        LinkFlow {
            handle: output_handle,
            delivery_count: Some(self.delivery_count),
            link_credit: Some(self.link_credit),
            available: Some(self.available),
            drain: self.drain,
            echo,
            properties: self.properties.clone(),
        }
    }
}

/// Flow state of a sender link.
///
/// Credit is granted by the session loop when flow frames arrive and
/// consumed by `Sender::send`, which parks on the notifier while the
/// credit is exhausted.
#[derive(Debug)]
pub(crate) struct SenderFlowState {
    lock: RwLock<LinkFlowStateInner>,
    notifier: Notify,
}

impl SenderFlowState {
    pub fn new(inner: LinkFlowStateInner) -> Self {
        Self {
            lock: RwLock::new(inner),
            notifier: Notify::new(),
        }
    }

    /// Handles an incoming flow frame.
    ///
    /// Returns a flow to send back when the receiver requested a drain or
    /// an echo.
    pub async fn on_incoming_flow(
        &self,
        flow: LinkFlow,
        output_handle: Handle,
    ) -> Option<LinkFlow> {
        let mut state = self.lock.write().await;

        // The sender's link-credit MUST be set according to
        // link-credit_snd := delivery-count_rcv + link-credit_rcv
        //   - delivery-count_snd
        // whenever flow information is given by the receiver. If the
        // receiver does not yet know the delivery-count it is assumed to be
        // the initial delivery-count of the attach.
        let delivery_count_rcv = flow.delivery_count.unwrap_or(state.initial_delivery_count);
        if let Some(link_credit_rcv) = flow.link_credit {
            state.link_credit = delivery_count_rcv
                .wrapping_add(link_credit_rcv)
                .wrapping_sub(state.delivery_count);
        }

        state.drain = flow.drain;
        let reply = if flow.drain {
            // When insufficient messages are available to consume the
            // current link-credit the sender advances its delivery-count
            // to consume it all and sends its flow state.
            state.delivery_count = state.delivery_count.wrapping_add(state.link_credit);
            state.link_credit = 0;
            Some(state.as_link_flow(output_handle, false))
        } else if flow.echo {
            Some(state.as_link_flow(output_handle, false))
        } else {
            None
        };

        drop(state);
        // wake senders blocked on credit
        self.notifier.notify_waiters();
        reply
    }

    /// Consumes credit for one delivery, waiting until the receiver has
    /// granted enough
    pub async fn consume(&self, count: u32) {
        loop {
            let notified = self.notifier.notified();
            {
                let mut state = self.lock.write().await;
                if state.link_credit >= count {
                    state.delivery_count = state.delivery_count.wrapping_add(count);
                    state.link_credit -= count;
                    return;
                }
            }
            notified.await;
        }
    }

    /// Consumes credit for one delivery if enough is available
    pub fn try_consume(&self, count: u32) -> bool {
        match self.lock.try_write() {
            Ok(mut state) if state.link_credit >= count => {
                state.delivery_count = state.delivery_count.wrapping_add(count);
                state.link_credit -= count;
                true
            }
            _ => false,
        }
    }

    pub async fn link_credit(&self) -> u32 {
        self.lock.read().await.link_credit
    }
}

/// Flow state of a receiver link.
///
/// Credit is issued by the receiver and consumed by the session loop as
/// transfers arrive.
#[derive(Debug)]
pub(crate) struct ReceiverFlowState {
    lock: RwLock<LinkFlowStateInner>,
}

impl ReceiverFlowState {
    pub fn new(inner: LinkFlowStateInner) -> Self {
        Self {
            lock: RwLock::new(inner),
        }
    }

    /// Handles an incoming flow frame; only the sender-owned fields are
    /// taken over
    pub async fn on_incoming_flow(
        &self,
        flow: LinkFlow,
        output_handle: Handle,
    ) -> Option<LinkFlow> {
        let mut state = self.lock.write().await;

        // delivery-count and available are owned by the sender
        if let Some(delivery_count) = flow.delivery_count {
            state.delivery_count = delivery_count;
        }
        if let Some(available) = flow.available {
            state.available = available;
        }

        match flow.echo {
            true => Some(state.as_link_flow(output_handle, false)),
            false => None,
        }
    }

    /// Books one incoming delivery against the issued credit.
    ///
    /// A sender overdraft is floored at zero rather than trusted.
    pub async fn on_incoming_delivery(&self) {
        let mut state = self.lock.write().await;
        state.delivery_count = state.delivery_count.wrapping_add(1);
        state.link_credit = state.link_credit.saturating_sub(1);
    }

    /// Resets the issued credit and returns the flow to announce it
    pub async fn issue_credit(&self, credit: u32, output_handle: Handle) -> LinkFlow {
        let mut state = self.lock.write().await;
        state.link_credit = credit;
        state.drain = false;
        state.as_link_flow(output_handle, false)
    }

    /// Sets the drain flag and returns the flow requesting the drain
    pub async fn drain(&self, output_handle: Handle) -> LinkFlow {
        let mut state = self.lock.write().await;
        state.drain = true;
        let mut flow = state.as_link_flow(output_handle, false);
        flow.drain = true;
        flow
    }

    pub async fn link_credit(&self) -> u32 {
        self.lock.read().await.link_credit
    }
}
