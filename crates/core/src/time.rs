//! Clock abstraction for token expiry
//!
//! Expiry is wall-clock based (`expires_at` is an absolute UTC timestamp),
//! so the clock yields `DateTime<Utc>` rather than a monotonic instant.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;

/// Source of the current time
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mock clock for deterministic expiry tests
///
/// Clones share the same underlying time.
#[derive(Debug, Clone)]
pub struct MockClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Create a mock clock frozen at the current wall-clock time
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(start: DateTime<Utc>) -> Self {
        Self { current: Arc::new(Mutex::new(start)) }
    }

    /// Advance the clock by `duration`
    pub fn advance(&self, duration: std::time::Duration) {
        let delta = ChronoDuration::from_std(duration).unwrap_or(ChronoDuration::zero());
        let mut current = self.current.lock();
        *current += delta;
    }

    pub fn advance_secs(&self, secs: i64) {
        let mut current = self.current.lock();
        *current += ChronoDuration::seconds(secs);
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.current.lock() = now;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock()
    }
}
