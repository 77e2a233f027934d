//! Common utilities shared by the engines

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::time::{Instant, Sleep};

use siderite_amqp_types::definitions::{DeliveryNumber, DeliveryTag, ReceiverSettleMode};

/// Whether an event loop should keep running after handling an event
#[derive(Debug)]
pub(crate) enum Running {
    Continue,
    Stop,
}

/// A resettable deadline used to enforce the local idle timeout.
///
/// The deadline is re-armed every time a frame arrives; if it fires, no
/// traffic was seen for the whole duration.
#[derive(Debug)]
pub(crate) struct IdleTimeout {
    delay: Pin<Box<Sleep>>,
    duration: Duration,
}

impl IdleTimeout {
    pub fn new(duration: Duration) -> Self {
        let delay = Box::pin(tokio::time::sleep(duration));
        Self { delay, duration }
    }

    pub fn reset(&mut self) {
        let next = Instant::now() + self.duration;
        self.delay.as_mut().reset(next);
    }
}

impl Future for IdleTimeout {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.delay.as_mut().poll(cx)
    }
}

/// A field that is set once and never mutated afterwards
#[derive(Debug)]
pub(crate) struct Constant<T> {
    value: T,
}

impl<T> Constant<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

impl<T> std::ops::Deref for Constant<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

/// The identity of a received delivery, detached from its message so that
/// dispositions can be issued after the message has been consumed
#[derive(Debug, Clone)]
pub struct DeliveryInfo {
    pub(crate) delivery_id: DeliveryNumber,
    pub(crate) delivery_tag: DeliveryTag,
    pub(crate) rcv_settle_mode: ReceiverSettleMode,
}

impl DeliveryInfo {
    /// The delivery-id of the delivery (session scope)
    pub fn delivery_id(&self) -> DeliveryNumber {
        self.delivery_id
    }

    /// The delivery-tag of the delivery (link scope)
    pub fn delivery_tag(&self) -> &DeliveryTag {
        &self.delivery_tag
    }
}

pub(crate) fn is_consecutive(left: DeliveryNumber, right: DeliveryNumber) -> bool {
    right.wrapping_sub(left) == 1
}

#[cfg(test)]
mod tests {
    use super::is_consecutive;

    #[test]
    fn consecutive_wraps_around() {
        assert!(is_consecutive(1, 2));
        assert!(is_consecutive(u32::MAX, 0));
        assert!(!is_consecutive(2, 2));
        assert!(!is_consecutive(3, 2));
    }
}
