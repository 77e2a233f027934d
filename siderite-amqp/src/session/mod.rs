//! Implementation of the AMQP 1.0 session

use std::collections::HashMap;

use slab::Slab;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{instrument, trace};

use siderite_amqp_types::definitions::{
    self, DeliveryNumber, DeliveryTag, Fields, Handle, Role, SequenceNo, TransferNumber,
};
use siderite_amqp_types::performatives::{
    Attach, Begin, Detach, Disposition, End, Flow, Transfer,
};
use siderite_amqp_types::primitives::{Array, Symbol};
use siderite_amqp_types::states::SessionState;

use crate::connection::ConnectionHandle;
use crate::control::SessionControl;
use crate::link::{AllocLinkError, LinkFlow, LinkFrame, LinkRelay};
use crate::util::{is_consecutive, Constant};
use crate::Payload;

mod builder;
mod error;
pub(crate) mod engine;
pub(crate) mod frame;

pub use builder::Builder;
pub use error::{BeginError, Error};
pub(crate) use error::SessionInnerError;
pub(crate) use frame::{SessionFrame, SessionFrameBody, SessionIncomingItem};

/// Default incoming-window and outgoing-window
pub const DEFAULT_WINDOW: u32 = 2048;

/// A handle to a mapped session.
///
/// Dropping the handle sends a best-effort end to the event loop.
#[derive(Debug)]
pub struct SessionHandle {
    pub(crate) control: mpsc::Sender<SessionControl>,
    pub(crate) engine_handle: JoinHandle<Result<(), Error>>,

    /// Outgoing frames from links are funneled through this channel
    pub(crate) outgoing: mpsc::Sender<LinkFrame>,

    /// Negotiated on the parent connection; links size transfers by it
    pub(crate) max_frame_size: usize,

    pub(crate) buffer_size: usize,
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        let _ = self.control.try_send(SessionControl::End(None));
    }
}

impl SessionHandle {
    /// Creates a builder for a session
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Begins a session on the connection with the default configuration
    pub async fn begin(connection: &mut ConnectionHandle) -> Result<SessionHandle, BeginError> {
        Self::builder().begin(connection).await
    }

    /// Whether the session event loop has stopped
    pub fn is_ended(&self) -> bool {
        self.control.is_closed()
    }

    /// End the session
    pub async fn end(&mut self) -> Result<(), Error> {
        // a send failure means the event loop has already stopped; the
        // outcome is picked up from the join handle either way
        let _ = self.control.send(SessionControl::End(None)).await;
        self.on_end().await
    }

    /// End the session, carrying an error to the peer
    pub async fn end_with_error(
        &mut self,
        error: impl Into<definitions::Error>,
    ) -> Result<(), Error> {
        let _ = self
            .control
            .send(SessionControl::End(Some(error.into())))
            .await;
        self.on_end().await
    }

    /// Returns when the session event loop has stopped.
    ///
    /// # Panics
    ///
    /// Panics if awaited more than once (through this method or through
    /// [`end`](Self::end)); the join handle may only be polled to
    /// completion once.
    pub async fn on_end(&mut self) -> Result<(), Error> {
        match (&mut self.engine_handle).await {
            Ok(result) => result,
            Err(err) => Err(Error::JoinError(err)),
        }
    }
}

pub(crate) async fn allocate_link(
    control: &mpsc::Sender<SessionControl>,
    link_name: String,
    link_relay: LinkRelay,
) -> Result<Handle, AllocLinkError> {
    let (responder, resp_rx) = oneshot::channel();
    control
        .send(SessionControl::AllocateLink {
            link_name,
            link_relay,
            responder,
        })
        .await
        // the event loop stopping means the session is unmapped
        .map_err(|_| AllocLinkError::IllegalSessionState)?;
    resp_rx
        .await
        .map_err(|_| AllocLinkError::IllegalSessionState)?
}

/// The session state machine.
///
/// All mutations happen on the session event loop.
#[derive(Debug)]
pub(crate) struct Session {
    outgoing_channel: u16,

    // local state
    local_state: SessionState,
    initial_outgoing_id: Constant<TransferNumber>,
    initial_incoming_window: Constant<u32>,
    next_outgoing_id: TransferNumber,
    incoming_window: u32,
    outgoing_window: u32,
    handle_max: Handle,

    // remote state
    incoming_channel: Option<u16>,
    next_incoming_id: TransferNumber,
    remote_incoming_window: SequenceNo,
    remote_outgoing_window: SequenceNo,

    offered_capabilities: Option<Array<Symbol>>,
    desired_capabilities: Option<Array<Symbol>>,
    properties: Option<Fields>,

    // local links
    link_name_by_output_handle: Slab<String>,
    link_by_name: HashMap<String, Option<LinkRelay>>,
    link_by_input_handle: HashMap<Handle, LinkRelay>,
    // the role key is the remote peer's role on the delivery
    delivery_tag_by_id: HashMap<(Role, DeliveryNumber), (Handle, DeliveryTag)>,
}

impl Session {
    #[allow(clippy::too_many_arguments)]
    fn new(
        outgoing_channel: u16,
        next_outgoing_id: TransferNumber,
        incoming_window: u32,
        outgoing_window: u32,
        handle_max: Handle,
        offered_capabilities: Option<Array<Symbol>>,
        desired_capabilities: Option<Array<Symbol>>,
        properties: Option<Fields>,
    ) -> Self {
        Self {
            outgoing_channel,
            local_state: SessionState::Unmapped,
            initial_outgoing_id: Constant::new(next_outgoing_id),
            initial_incoming_window: Constant::new(incoming_window),
            next_outgoing_id,
            incoming_window,
            outgoing_window,
            handle_max,
            incoming_channel: None,
            next_incoming_id: 0,
            remote_incoming_window: 0,
            remote_outgoing_window: 0,
            offered_capabilities,
            desired_capabilities,
            properties,
            link_name_by_output_handle: Slab::new(),
            link_by_name: HashMap::new(),
            link_by_input_handle: HashMap::new(),
            delivery_tag_by_id: HashMap::new(),
        }
    }

    pub fn local_state(&self) -> &SessionState {
        &self.local_state
    }

    pub fn outgoing_channel(&self) -> u16 {
        self.outgoing_channel
    }

    pub fn remote_incoming_window(&self) -> SequenceNo {
        self.remote_incoming_window
    }

    pub fn allocate_link(
        &mut self,
        link_name: String,
        mut link_relay: LinkRelay,
    ) -> Result<Handle, AllocLinkError> {
        match &self.local_state {
            SessionState::Mapped => {}
            _ => return Err(AllocLinkError::IllegalSessionState),
        };
        if self.link_by_name.contains_key(&link_name) {
            return Err(AllocLinkError::DuplicatedLinkName);
        }

        let entry = self.link_name_by_output_handle.vacant_entry();
        if entry.key() > self.handle_max as usize {
            return Err(AllocLinkError::HandleMaxReached);
        }
        let handle = entry.key() as Handle;
        entry.insert(link_name.clone());
        link_relay.set_output_handle(handle);
        self.link_by_name.insert(link_name, Some(link_relay));
        Ok(handle)
    }

    pub fn deallocate_link(&mut self, output_handle: Handle) {
        if let Some(name) = self
            .link_name_by_output_handle
            .try_remove(output_handle as usize)
        {
            self.link_by_name.remove(&name);
        }
    }

    pub fn on_incoming_begin(&mut self, channel: u16, begin: Begin) -> Result<(), BeginError> {
        match self.local_state {
            SessionState::Unmapped => self.local_state = SessionState::BeginReceived,
            SessionState::BeginSent => self.local_state = SessionState::Mapped,
            _ => return Err(BeginError::IllegalState),
        }

        self.incoming_channel = Some(channel);
        self.next_incoming_id = begin.next_outgoing_id;
        self.remote_incoming_window = begin.incoming_window;
        self.remote_outgoing_window = begin.outgoing_window;
        Ok(())
    }

    pub async fn on_incoming_attach(&mut self, attach: Attach) -> Result<(), SessionInnerError> {
        let link = self
            .link_by_name
            .get_mut(&attach.name)
            .ok_or(SessionInnerError::RemoteAttachingLinkNameNotFound)?;
        let mut relay = link.take().ok_or(SessionInnerError::HandleInUse)?;

        // only the sender needs the remote settle mode; it has to echo a
        // disposition when rcv-settle-mode is second
        relay.on_remote_attach_fields(&attach);

        let input_handle = attach.handle;
        relay
            .send(LinkFrame::Attach(attach))
            .await
            .map_err(|_| SessionInnerError::UnattachedHandle)?;
        self.link_by_input_handle.insert(input_handle, relay);
        Ok(())
    }

    /// Session flow state is updated from every flow frame; link flow
    /// state is forwarded to the owning link
    pub async fn on_incoming_flow(
        &mut self,
        flow: Flow,
    ) -> Result<Option<LinkFlow>, SessionInnerError> {
        // When the endpoint receives a flow frame from its peer, it MUST
        // update the next-incoming-id directly from the next-outgoing-id of
        // the frame, and it MUST update the remote-outgoing-window directly
        // from the outgoing-window of the frame.
        self.next_incoming_id = flow.next_outgoing_id;
        self.remote_outgoing_window = flow.outgoing_window;

        match flow.next_incoming_id {
            Some(next_incoming_id) => {
                // remote-incoming-window = next-incoming-id_flow
                //   + incoming-window_flow - next-outgoing-id_endpoint
                self.remote_incoming_window = next_incoming_id
                    .wrapping_add(flow.incoming_window)
                    .wrapping_sub(self.next_outgoing_id);
            }
            None => {
                // remote-incoming-window = initial-outgoing-id_endpoint
                //   + incoming-window_flow - next-outgoing-id_endpoint
                self.remote_incoming_window = self
                    .initial_outgoing_id
                    .value()
                    .wrapping_add(flow.incoming_window)
                    .wrapping_sub(self.next_outgoing_id);
            }
        }

        if let Ok(link_flow) = LinkFlow::try_from(flow) {
            let relay = self
                .link_by_input_handle
                .get_mut(&link_flow.handle)
                .ok_or(SessionInnerError::UnattachedHandle)?;
            return Ok(relay.on_incoming_flow(link_flow).await);
        }
        Ok(None)
    }

    /// Returns a replenishing session flow when the incoming window has
    /// dropped to its threshold
    pub async fn on_incoming_transfer(
        &mut self,
        transfer: Transfer,
        payload: Payload,
    ) -> Result<Option<SessionFrame>, SessionInnerError> {
        // Upon receiving a transfer, the receiving endpoint will increment
        // the next-incoming-id to match the implicit transfer-id of the
        // incoming transfer plus one, as well as decrementing the
        // remote-outgoing-window and its incoming-window.
        if self.incoming_window == 0 {
            return Err(SessionInnerError::WindowViolation);
        }
        self.next_incoming_id = self.next_incoming_id.wrapping_add(1);
        self.remote_outgoing_window = self.remote_outgoing_window.saturating_sub(1);
        self.incoming_window -= 1;

        let input_handle = transfer.handle;
        let relay = self
            .link_by_input_handle
            .get_mut(&input_handle)
            .ok_or(SessionInnerError::UnattachedHandle)?;

        let id_and_tag = relay.on_incoming_transfer(transfer, payload).await?;
        if let Some((delivery_id, delivery_tag)) = id_and_tag {
            self.delivery_tag_by_id
                .insert((Role::Sender, delivery_id), (input_handle, delivery_tag));
        }

        // replenish the window once half of it has been consumed
        if self.incoming_window <= *self.initial_incoming_window.value() / 2 {
            self.incoming_window = *self.initial_incoming_window.value();
            let flow = Flow {
                next_incoming_id: Some(self.next_incoming_id),
                incoming_window: self.incoming_window,
                next_outgoing_id: self.next_outgoing_id,
                outgoing_window: self.outgoing_window,
                ..Default::default()
            };
            return Ok(Some(SessionFrame::new(
                self.outgoing_channel,
                SessionFrameBody::Flow(flow),
            )));
        }
        Ok(None)
    }

    /// Returns settled dispositions to echo back for deliveries running in
    /// the second receiver settle mode
    #[instrument(skip_all)]
    pub fn on_incoming_disposition(
        &mut self,
        disposition: Disposition,
    ) -> Result<Option<Vec<Disposition>>, SessionInnerError> {
        let first = disposition.first;
        let last = disposition.last.unwrap_or(first);

        if disposition.settled {
            for delivery_id in first..=last {
                let key = (disposition.role, delivery_id);
                if let Some((handle, delivery_tag)) = self.delivery_tag_by_id.remove(&key) {
                    if let Some(relay) = self.link_by_input_handle.get_mut(&handle) {
                        let _ = relay.on_incoming_disposition(
                            disposition.settled,
                            disposition.state.clone(),
                            delivery_tag,
                        );
                    }
                }
            }
            return Ok(None);
        }

        let mut delivery_ids = Vec::new();
        for delivery_id in first..=last {
            let key = (disposition.role, delivery_id);
            if let Some((handle, delivery_tag)) = self.delivery_tag_by_id.get(&key) {
                if let Some(relay) = self.link_by_input_handle.get_mut(handle) {
                    // in the second settle mode the receiver first sends an
                    // unsettled disposition and waits for the sender to settle
                    let echo = relay.on_incoming_disposition(
                        disposition.settled,
                        disposition.state.clone(),
                        delivery_tag.clone(),
                    );
                    if echo {
                        delivery_ids.push(delivery_id);
                    }
                }
            }
        }
        for delivery_id in &delivery_ids {
            self.delivery_tag_by_id
                .remove(&(disposition.role, *delivery_id));
        }

        // a disposition may span deliveries on multiple links; echo the
        // largest consecutive ranges together
        let chunk_indices = consecutive_chunk_indices(&delivery_ids);
        let mut dispositions = Vec::with_capacity(chunk_indices.len() + 1);
        let mut prev = 0;
        for index in chunk_indices.into_iter().chain(std::iter::once(delivery_ids.len())) {
            let slice = &delivery_ids[prev..index];
            if let (Some(first), last) = (slice.first(), slice.last()) {
                dispositions.push(Disposition {
                    role: Role::Sender,
                    first: *first,
                    last: last.copied().filter(|l| l != first),
                    settled: true,
                    state: disposition.state.clone(),
                    batchable: false,
                });
            }
            prev = index;
        }
        match dispositions.is_empty() {
            true => Ok(None),
            false => Ok(Some(dispositions)),
        }
    }

    #[instrument(skip_all)]
    pub async fn on_incoming_detach(&mut self, detach: Detach) -> Result<(), SessionInnerError> {
        trace!(frame = ?detach);
        let mut relay = self
            .link_by_input_handle
            .remove(&detach.handle)
            .ok_or(SessionInnerError::UnattachedHandle)?;
        relay
            .send(LinkFrame::Detach(detach))
            .await
            .map_err(|_| SessionInnerError::UnattachedHandle)?;
        Ok(())
    }

    #[instrument(skip_all)]
    pub fn on_incoming_end(&mut self, _channel: u16, end: End) -> Result<(), SessionInnerError> {
        trace!(frame = ?end);
        match self.local_state {
            SessionState::BeginSent | SessionState::BeginReceived | SessionState::Mapped => {
                self.local_state = SessionState::EndReceived;
                match end.error {
                    Some(error) => Err(SessionInnerError::RemoteEndedWithError(error)),
                    None => Err(SessionInnerError::RemoteEnded),
                }
            }
            SessionState::EndSent | SessionState::Discarding => {
                self.local_state = SessionState::Unmapped;
                if let Some(error) = end.error {
                    return Err(SessionInnerError::RemoteEndedWithError(error));
                }
                Ok(())
            }
            _ => Err(SessionInnerError::IllegalState),
        }
    }

    pub async fn send_begin(
        &mut self,
        writer: &mpsc::Sender<SessionFrame>,
    ) -> Result<(), BeginError> {
        let begin = Begin {
            remote_channel: self.incoming_channel,
            next_outgoing_id: self.next_outgoing_id,
            incoming_window: self.incoming_window,
            outgoing_window: self.outgoing_window,
            handle_max: self.handle_max,
            offered_capabilities: self.offered_capabilities.clone(),
            desired_capabilities: self.desired_capabilities.clone(),
            properties: self.properties.clone(),
        };
        let frame = SessionFrame::new(self.outgoing_channel, SessionFrameBody::Begin(begin));

        match &self.local_state {
            SessionState::Unmapped => {
                writer
                    .send(frame)
                    .await
                    .map_err(|_| BeginError::IllegalConnectionState)?;
                self.local_state = SessionState::BeginSent;
            }
            SessionState::BeginReceived => {
                writer
                    .send(frame)
                    .await
                    .map_err(|_| BeginError::IllegalConnectionState)?;
                self.local_state = SessionState::Mapped;
            }
            _ => return Err(BeginError::IllegalState),
        }
        Ok(())
    }

    pub async fn send_end(
        &mut self,
        writer: &mpsc::Sender<SessionFrame>,
        error: Option<definitions::Error>,
    ) -> Result<(), SessionInnerError> {
        match self.local_state {
            SessionState::Mapped => match error.is_some() {
                true => self.local_state = SessionState::Discarding,
                false => self.local_state = SessionState::EndSent,
            },
            SessionState::EndReceived => self.local_state = SessionState::Unmapped,
            _ => return Err(SessionInnerError::IllegalState),
        }

        let frame = SessionFrame::new(self.outgoing_channel, SessionFrameBody::End(End { error }));
        writer
            .send(frame)
            .await
            .map_err(|_| SessionInnerError::IllegalConnectionState)?;
        Ok(())
    }

    pub fn on_outgoing_attach(&mut self, attach: Attach) -> SessionFrame {
        SessionFrame::new(self.outgoing_channel, SessionFrameBody::Attach(attach))
    }

    pub fn on_outgoing_flow(&mut self, link_flow: LinkFlow) -> SessionFrame {
        let flow = Flow {
            // session flow state
            next_incoming_id: Some(self.next_incoming_id),
            incoming_window: self.incoming_window,
            next_outgoing_id: self.next_outgoing_id,
            outgoing_window: self.outgoing_window,
            // link flow state
            handle: Some(link_flow.handle),
            delivery_count: link_flow.delivery_count,
            link_credit: link_flow.link_credit,
            available: link_flow.available,
            drain: link_flow.drain,
            echo: link_flow.echo,
            properties: link_flow.properties,
        };
        SessionFrame::new(self.outgoing_channel, SessionFrameBody::Flow(flow))
    }

    /// Assigns the delivery-id and performs the window bookkeeping for one
    /// outgoing transfer. The caller must have checked that the remote
    /// incoming window is open.
    pub fn on_outgoing_transfer(
        &mut self,
        input_handle: Handle,
        mut transfer: Transfer,
        payload: Payload,
    ) -> SessionFrame {
        let settled = transfer.settled.unwrap_or(false);

        // only the first transfer of a delivery carries the tag
        if let Some(delivery_tag) = &transfer.delivery_tag {
            let delivery_id = self.next_outgoing_id;
            transfer.delivery_id = Some(delivery_id);

            if !settled {
                self.delivery_tag_by_id.insert(
                    (Role::Receiver, delivery_id),
                    (input_handle, delivery_tag.clone()),
                );
            }
        }

        // Upon sending a transfer, the sending endpoint will increment its
        // next-outgoing-id and decrement its remote-incoming-window.
        self.next_outgoing_id = self.next_outgoing_id.wrapping_add(1);
        self.remote_incoming_window -= 1;

        SessionFrame::new(
            self.outgoing_channel,
            SessionFrameBody::Transfer {
                performative: transfer,
                payload,
            },
        )
    }

    pub fn on_outgoing_disposition(&mut self, disposition: Disposition) -> SessionFrame {
        SessionFrame::new(
            self.outgoing_channel,
            SessionFrameBody::Disposition(disposition),
        )
    }

    pub fn on_outgoing_detach(&mut self, detach: Detach) -> SessionFrame {
        self.deallocate_link(detach.handle);
        SessionFrame::new(self.outgoing_channel, SessionFrameBody::Detach(detach))
    }
}

fn consecutive_chunk_indices(delivery_ids: &[DeliveryNumber]) -> Vec<usize> {
    delivery_ids
        .windows(2)
        .enumerate()
        .filter_map(|(i, pair)| {
            if is_consecutive(pair[0], pair[1]) {
                None
            } else {
                Some(i + 1)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::consecutive_chunk_indices;

    #[test]
    fn chunking_splits_on_gaps() {
        assert!(consecutive_chunk_indices(&[1, 2, 3]).is_empty());
        assert_eq!(consecutive_chunk_indices(&[1, 2, 4, 5]), vec![2]);
        assert_eq!(consecutive_chunk_indices(&[1, 3, 5]), vec![1, 2]);
    }
}
