//! Deliveries on the way in and messages on the way out

use tokio::sync::oneshot;

use siderite_amqp_types::definitions::{
    DeliveryNumber, DeliveryTag, MessageFormat, ReceiverSettleMode,
};
use siderite_amqp_types::messaging::{Body, DeliveryState, Message, MESSAGE_FORMAT};
use siderite_amqp_types::Value;

use crate::util::DeliveryInfo;
use crate::Payload;

/// A message received on a link, together with the delivery identity
/// needed to issue a disposition for it
#[derive(Debug)]
pub struct Delivery {
    pub(crate) delivery_id: DeliveryNumber,
    pub(crate) delivery_tag: DeliveryTag,
    pub(crate) rcv_settle_mode: ReceiverSettleMode,
    pub(crate) settled: bool,
    pub(crate) message: Message,
}

impl Delivery {
    /// The delivery-id assigned by the sending session
    pub fn delivery_id(&self) -> DeliveryNumber {
        self.delivery_id
    }

    /// The delivery-tag assigned by the sending link
    pub fn delivery_tag(&self) -> &DeliveryTag {
        &self.delivery_tag
    }

    /// Whether the sender sent the delivery settled
    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// The received message
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Consumes the delivery into the message
    pub fn into_message(self) -> Message {
        self.message
    }

    /// A reference to the message body
    pub fn body(&self) -> &Body {
        &self.message.body
    }

    /// Consumes the delivery into the body value, failing if the body is
    /// not a single value section
    pub fn try_into_value(self) -> Result<Value, siderite_amqp_types::codec::Error> {
        self.message.body.try_into_value()
    }

    pub(crate) fn clone_info(&self) -> DeliveryInfo {
        DeliveryInfo {
            delivery_id: self.delivery_id,
            delivery_tag: self.delivery_tag.clone(),
            rcv_settle_mode: self.rcv_settle_mode,
        }
    }
}

/// A message prepared for sending.
///
/// Allows pre-settling a message on links attached in the mixed sender
/// settle mode.
#[derive(Debug)]
pub struct Sendable {
    pub(crate) message: Message,
    pub(crate) message_format: MessageFormat,
    pub(crate) settled: Option<bool>,
}

impl Sendable {
    /// Creates a builder for [`Sendable`]
    pub fn builder() -> Builder {
        Builder::new()
    }
}

impl From<Message> for Sendable {
    fn from(message: Message) -> Self {
        Self {
            message,
            message_format: MESSAGE_FORMAT,
            settled: None,
        }
    }
}

impl From<Body> for Sendable {
    fn from(body: Body) -> Self {
        Message::from(body).into()
    }
}

impl From<&str> for Sendable {
    fn from(value: &str) -> Self {
        Message::from(value).into()
    }
}

impl From<String> for Sendable {
    fn from(value: String) -> Self {
        Message::from(value).into()
    }
}

/// Builder for [`Sendable`]
#[derive(Debug, Default)]
pub struct Builder {
    message: Option<Message>,
    message_format: Option<MessageFormat>,
    settled: Option<bool>,
}

impl Builder {
    /// Creates a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the message
    pub fn message(mut self, message: impl Into<Message>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the message-format
    pub fn message_format(mut self, message_format: MessageFormat) -> Self {
        self.message_format = Some(message_format);
        self
    }

    /// Pre-settles the message (only honored in the mixed settle mode)
    pub fn settled(mut self, settled: bool) -> Self {
        self.settled = Some(settled);
        self
    }

    /// Builds the sendable
    pub fn build(self) -> Sendable {
        Sendable {
            message: self.message.unwrap_or_default(),
            message_format: self.message_format.unwrap_or(MESSAGE_FORMAT),
            settled: self.settled,
        }
    }
}

/// A sent but unsettled delivery, resolved when the peer's disposition
/// arrives or the link is torn down
#[derive(Debug)]
pub(crate) struct UnsettledMessage {
    /// Kept so that the delivery could be resumed after a non-closing
    /// detach
    pub payload: Payload,
    pub state: Option<DeliveryState>,
    pub sender: oneshot::Sender<Option<DeliveryState>>,
}

impl UnsettledMessage {
    pub fn new(payload: Payload, sender: oneshot::Sender<Option<DeliveryState>>) -> Self {
        Self {
            payload,
            state: None,
            sender,
        }
    }

    pub fn settle_with_state(self, state: Option<DeliveryState>) {
        let _ = self.sender.send(state);
    }
}
