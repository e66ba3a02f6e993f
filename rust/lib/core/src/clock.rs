//! Trusted clock collaborator.
//!
//! Every recorded date (registration, verification, event timestamps) comes
//! from a [`Clock`] injected at construction. Tests use [`ManualClock`].

use std::sync::atomic::{AtomicI64, Ordering};

use crate::types::Timestamp;

/// Source of monotonic, non-decreasing timestamps (unix seconds).
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock that never goes backwards.
///
/// If the system time steps back, the last returned value is repeated
/// until real time catches up.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let wall = chrono::Utc::now().timestamp();
        let prev = self.last.fetch_max(wall, Ordering::SeqCst);
        prev.max(wall)
    }
}

/// Clock driven by hand. Starts at the given instant and only moves when
/// told to.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    /// Move the clock forward by `secs`. Negative values are ignored.
    pub fn advance(&self, secs: i64) {
        if secs > 0 {
            self.now.fetch_add(secs, Ordering::SeqCst);
        }
    }

    /// Jump to `ts`, unless that would move the clock backwards.
    pub fn set(&self, ts: Timestamp) {
        self.now.fetch_max(ts, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}
