//! Periodic ticks driving empty-frame keep-alives

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::Stream;
use tokio::time::{Interval, MissedTickBehavior};

/// A stream that ticks at the negotiated keep-alive period, or never if
/// the peer did not announce an idle timeout
#[derive(Debug)]
pub struct HeartBeat {
    interval: Option<Interval>,
}

impl HeartBeat {
    /// A heartbeat that never ticks
    pub fn never() -> Self {
        Self { interval: None }
    }

    /// A heartbeat ticking at the given period, starting one period from
    /// now
    pub fn new(period: Duration) -> Self {
        let start = tokio::time::Instant::now() + period;
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval: Some(interval),
        }
    }
}

impl Stream for HeartBeat {
    type Item = ();

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match &mut self.get_mut().interval {
            Some(interval) => match interval.poll_tick(cx) {
                Poll::Ready(_) => Poll::Ready(Some(())),
                Poll::Pending => Poll::Pending,
            },
            None => Poll::Pending,
        }
    }
}
