//! Builder for sender and receiver links

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use siderite_amqp_types::definitions::{
    Fields, ReceiverSettleMode, Role, SenderSettleMode, SequenceNo,
};
use siderite_amqp_types::messaging::{Source, Target};
use siderite_amqp_types::performatives::Attach;
use siderite_amqp_types::primitives::{Array, Symbol};
use siderite_amqp_types::states::LinkState;

use crate::session::{self, SessionHandle};

use super::error::AttachError;
use super::frame::LinkFrame;
use super::receiver::{CreditMode, Receiver};
use super::sender::Sender;
use super::state::{LinkFlowStateInner, ReceiverFlowState, SenderFlowState};
use super::{LinkRelay, ReceiverUnsettledMap, SenderUnsettledMap};

/// Type-state markers for the link role
pub mod role {
    /// Marker for a sender link builder
    #[derive(Debug)]
    pub struct SenderMarker {}

    /// Marker for a receiver link builder
    #[derive(Debug)]
    pub struct ReceiverMarker {}
}

/// Builder for a [`Sender`] or [`Receiver`] link
#[derive(Debug)]
pub struct Builder<R> {
    /// The name of the link; defaults to a generated unique name
    pub name: Option<String>,

    /// The proposed sender settle mode
    pub snd_settle_mode: SenderSettleMode,

    /// The proposed receiver settle mode
    pub rcv_settle_mode: ReceiverSettleMode,

    /// The source terminus
    pub source: Option<Source>,

    /// The target terminus
    pub target: Option<Target>,

    /// The sender's initial delivery-count
    pub initial_delivery_count: SequenceNo,

    /// The largest message this endpoint accepts
    pub max_message_size: Option<u64>,

    /// Extension capabilities the endpoint supports
    pub offered_capabilities: Option<Array<Symbol>>,

    /// Extension capabilities the endpoint can use if the peer supports
    /// them
    pub desired_capabilities: Option<Array<Symbol>>,

    /// Link properties carried in flow frames
    pub properties: Option<Fields>,

    /// Receiver credit management
    pub credit_mode: CreditMode,

    /// Whether deliveries are accepted as they are received
    pub auto_accept: bool,

    role: PhantomData<R>,
}

impl<R> Default for Builder<R> {
    fn default() -> Self {
        Self {
            name: None,
            snd_settle_mode: SenderSettleMode::default(),
            rcv_settle_mode: ReceiverSettleMode::default(),
            source: None,
            target: None,
            initial_delivery_count: 0,
            max_message_size: None,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
            credit_mode: CreditMode::default(),
            auto_accept: true,
            role: PhantomData,
        }
    }
}

impl<R> Builder<R> {
    /// Creates a builder with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the link name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the proposed sender settle mode
    pub fn sender_settle_mode(mut self, mode: SenderSettleMode) -> Self {
        self.snd_settle_mode = mode;
        self
    }

    /// Sets the proposed receiver settle mode
    pub fn receiver_settle_mode(mut self, mode: ReceiverSettleMode) -> Self {
        self.rcv_settle_mode = mode;
        self
    }

    /// Sets the largest message this endpoint accepts
    pub fn max_message_size(mut self, max_message_size: u64) -> Self {
        self.max_message_size = Some(max_message_size);
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

    /// Sets the link properties
    pub fn properties(mut self, properties: Fields) -> Self {
        self.properties = Some(properties);
        self
    }

    fn name_or_generated(&mut self, prefix: &str) -> String {
        self.name
            .take()
            .unwrap_or_else(|| format!("{}-{}", prefix, uuid::Uuid::new_v4()))
    }
}

impl Builder<role::SenderMarker> {
    /// Sets the target address or terminus
    pub fn target(mut self, target: impl Into<Target>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Sets the source terminus
    pub fn source(mut self, source: impl Into<Source>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the sender's initial delivery-count
    pub fn initial_delivery_count(mut self, count: SequenceNo) -> Self {
        self.initial_delivery_count = count;
        self
    }

    /// Attaches the sender to a session
    pub async fn attach(mut self, session: &mut SessionHandle) -> Result<Sender, AttachError> {
        let name = self.name_or_generated("siderite-sender");
        let buffer_size = session.buffer_size;
        let (incoming_tx, mut incoming_rx) = mpsc::channel(buffer_size);

        let flow_state = Arc::new(SenderFlowState::new(LinkFlowStateInner {
            initial_delivery_count: self.initial_delivery_count,
            delivery_count: self.initial_delivery_count,
            link_credit: 0,
            available: 0,
            drain: false,
            properties: self.properties.clone(),
        }));
        let unsettled: SenderUnsettledMap = Arc::new(Mutex::new(BTreeMap::new()));

        let relay = LinkRelay::Sender {
            tx: incoming_tx,
            output_handle: 0,
            flow_state: flow_state.clone(),
            unsettled: unsettled.clone(),
            receiver_settle_mode: self.rcv_settle_mode,
        };
        let output_handle = session::allocate_link(&session.control, name.clone(), relay).await?;

        let attach = Attach {
            name: name.clone(),
            handle: output_handle,
            role: Role::Sender,
            snd_settle_mode: self.snd_settle_mode,
            rcv_settle_mode: self.rcv_settle_mode,
            source: Some(Box::new(self.source.take().unwrap_or_default())),
            target: self.target.take().map(Box::new),
            unsettled: None,
            incomplete_unsettled: false,
            // MUST NOT be null if role is sender
            initial_delivery_count: Some(self.initial_delivery_count),
            max_message_size: self.max_message_size,
            offered_capabilities: self.offered_capabilities.take(),
            desired_capabilities: self.desired_capabilities.take(),
            properties: None,
        };
        session
            .outgoing
            .send(LinkFrame::Attach(attach))
            .await
            .map_err(|_| AttachError::IllegalSessionState)?;

        let remote_attach = recv_remote_attach(&mut incoming_rx).await?;

        // the receiving peer answers with the target it actually attached
        if remote_attach.target.is_none() {
            return Err(refused_attach(&mut incoming_rx).await);
        }

        // the peer's max-message-size caps what this side may send
        let max_message_size = match (self.max_message_size, remote_attach.max_message_size) {
            (Some(local), Some(remote)) if local > 0 && remote > 0 => local.min(remote),
            (_, Some(remote)) => remote,
            (Some(local), None) => local,
            (None, None) => 0,
        };

        Ok(Sender {
            name,
            output_handle,
            snd_settle_mode: remote_attach.snd_settle_mode,
            rcv_settle_mode: remote_attach.rcv_settle_mode,
            source: remote_attach.source.map(|boxed| *boxed),
            target: remote_attach.target.map(|boxed| *boxed),
            max_message_size,
            max_frame_size: session.max_frame_size,
            flow_state,
            unsettled,
            next_delivery_tag: 0,
            incoming: incoming_rx,
            outgoing: session.outgoing.clone(),
            state: LinkState::Attached,
        })
    }
}

impl Builder<role::ReceiverMarker> {
    /// Sets the source address or terminus
    pub fn source(mut self, source: impl Into<Source>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the target terminus
    pub fn target(mut self, target: impl Into<Target>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Sets the credit mode
    pub fn credit_mode(mut self, credit_mode: CreditMode) -> Self {
        self.credit_mode = credit_mode;
        self
    }

    /// Turns automatic accept-and-settle of received deliveries on or off
    pub fn auto_accept(mut self, auto_accept: bool) -> Self {
        self.auto_accept = auto_accept;
        self
    }

    /// Attaches the receiver to a session
    pub async fn attach(mut self, session: &mut SessionHandle) -> Result<Receiver, AttachError> {
        let name = self.name_or_generated("siderite-receiver");
        let buffer_size = session.buffer_size;
        let (incoming_tx, mut incoming_rx) = mpsc::channel(buffer_size);

        let flow_state = Arc::new(ReceiverFlowState::new(LinkFlowStateInner {
            initial_delivery_count: 0,
            delivery_count: 0,
            link_credit: 0,
            available: 0,
            drain: false,
            properties: self.properties.clone(),
        }));
        let unsettled: ReceiverUnsettledMap = Arc::new(Mutex::new(BTreeMap::new()));

        let relay = LinkRelay::Receiver {
            tx: incoming_tx,
            output_handle: 0,
            flow_state: flow_state.clone(),
            unsettled: unsettled.clone(),
            incomplete: None,
        };
        let output_handle = session::allocate_link(&session.control, name.clone(), relay).await?;

        let attach = Attach {
            name: name.clone(),
            handle: output_handle,
            role: Role::Receiver,
            snd_settle_mode: self.snd_settle_mode,
            rcv_settle_mode: self.rcv_settle_mode,
            source: self.source.take().map(Box::new),
            target: Some(Box::new(self.target.take().unwrap_or_default())),
            unsettled: None,
            incomplete_unsettled: false,
            // ignored if the role is receiver
            initial_delivery_count: None,
            max_message_size: self.max_message_size,
            offered_capabilities: self.offered_capabilities.take(),
            desired_capabilities: self.desired_capabilities.take(),
            properties: None,
        };
        session
            .outgoing
            .send(LinkFrame::Attach(attach))
            .await
            .map_err(|_| AttachError::IllegalSessionState)?;

        let remote_attach = recv_remote_attach(&mut incoming_rx).await?;

        // the sending peer answers with the source it actually attached
        if remote_attach.source.is_none() {
            return Err(refused_attach(&mut incoming_rx).await);
        }

        let mut receiver = Receiver {
            name,
            output_handle,
            snd_settle_mode: remote_attach.snd_settle_mode,
            rcv_settle_mode: remote_attach.rcv_settle_mode,
            source: remote_attach.source.map(|boxed| *boxed),
            target: remote_attach.target.map(|boxed| *boxed),
            flow_state,
            unsettled,
            incoming: incoming_rx,
            outgoing: session.outgoing.clone(),
            credit_mode: self.credit_mode,
            auto_accept: self.auto_accept,
            pending_dispositions: Vec::new(),
            state: LinkState::Attached,
        };

        // announce the initial credit
        if let CreditMode::Auto(credit) = receiver.credit_mode {
            receiver
                .set_credit(credit)
                .await
                .map_err(|_| AttachError::IllegalSessionState)?;
        }

        Ok(receiver)
    }
}

async fn recv_remote_attach(
    incoming: &mut mpsc::Receiver<LinkFrame>,
) -> Result<Attach, AttachError> {
    match incoming.recv().await {
        Some(LinkFrame::Attach(attach)) => Ok(attach),
        Some(LinkFrame::Detach(detach)) => Err(AttachError::RemoteAttachRefused(detach.error)),
        Some(_) => Err(AttachError::NonAttachFrameReceived),
        None => Err(AttachError::IllegalSessionState),
    }
}

/// A peer refuses an attachment by answering with an attach that carries
/// no terminus and then detaching
async fn refused_attach(incoming: &mut mpsc::Receiver<LinkFrame>) -> AttachError {
    match incoming.recv().await {
        Some(LinkFrame::Detach(detach)) => AttachError::RemoteAttachRefused(detach.error),
        _ => AttachError::RemoteAttachRefused(None),
    }
}
