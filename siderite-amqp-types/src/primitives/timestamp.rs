//! An absolute point in time

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// An absolute point in time, encoded as a 64-bit two's-complement count of
/// milliseconds since the unix epoch (ms64).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from milliseconds since the unix epoch
    pub fn from_milliseconds(millis: i64) -> Self {
        Self(millis)
    }

    /// Milliseconds since the unix epoch
    pub fn milliseconds(&self) -> i64 {
        self.0
    }

    /// The current wall-clock time
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Self(millis)
    }

    /// Whether this point in time lies in the past
    pub fn is_expired(&self) -> bool {
        *self <= Self::now()
    }
}

impl From<i64> for Timestamp {
    fn from(millis: i64) -> Self {
        Self(millis)
    }
}

impl From<Timestamp> for i64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

impl std::ops::Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Self::Output {
        Timestamp(self.0.saturating_add(rhs.as_millis() as i64))
    }
}

impl std::ops::Sub<Duration> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: Duration) -> Self::Output {
        Timestamp(self.0.saturating_sub(rhs.as_millis() as i64))
    }
}
