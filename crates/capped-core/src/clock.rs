//! Time abstraction for testability
//!
//! Records default their timestamp to "now". Going through [`Clock`] lets
//! tests pin or advance time instead of sleeping.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};

/// Wall-clock milliseconds since the Unix epoch
pub type Millis = i64;

/// Time source used when a push does not carry its own timestamp
pub trait Clock: Send + Sync {
    /// Get the current UTC datetime
    fn now_utc(&self) -> DateTime<Utc>;

    /// Current time in milliseconds since the Unix epoch
    fn now_millis(&self) -> Millis {
        self.now_utc().timestamp_millis()
    }
}

/// Real clock implementation using system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for deterministic tests
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    /// Create a clock frozen at the given millisecond
    pub fn new(start: Millis) -> Self {
        Self {
            millis: AtomicI64::new(start),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Millis) {
        self.millis.fetch_add(by, Ordering::SeqCst);
    }

    /// Jump to an absolute time
    pub fn set(&self, to: Millis) {
        self.millis.store(to, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.now_millis()).unwrap_or_default()
    }

    fn now_millis(&self) -> Millis {
        self.millis.load(Ordering::SeqCst)
    }
}
