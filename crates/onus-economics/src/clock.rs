//! Time sources
//!
//! Every time-dependent calculation reads the current time through
//! [`TimeSource`], so decay, expiry and payout math can be replayed against a
//! [`ManualClock`] without waiting on wall time.

use crate::types::Timestamp;
use parking_lot::RwLock;
use std::sync::Arc;

/// Source of the current Unix time in seconds
pub trait TimeSource: Send + Sync {
    /// Current time
    fn now(&self) -> Timestamp;
}

/// Wall clock backed by `chrono::Utc`
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now().timestamp()
    }
}

/// Manually advanced clock for simulation and tests.
///
/// Clones share the same underlying time.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Arc<RwLock<Timestamp>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(RwLock::new(start)),
        }
    }

    /// Move time forward by `secs` (negative values are ignored)
    pub fn advance(&self, secs: i64) -> Timestamp {
        let mut now = self.now.write();
        *now += secs.max(0);
        *now
    }

    /// Move time forward by whole minutes
    pub fn advance_minutes(&self, minutes: i64) -> Timestamp {
        self.advance(minutes * 60)
    }

    /// Jump to an absolute time; going backwards is ignored
    pub fn set(&self, timestamp: Timestamp) {
        let mut now = self.now.write();
        *now = (*now).max(timestamp);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new(1_000);
        let view = clock.clone();

        clock.advance_minutes(2);
        assert_eq!(view.now(), 1_120);
    }

    #[test]
    fn test_manual_clock_is_monotonic() {
        let clock = ManualClock::new(500);
        clock.advance(-100);
        clock.set(10);
        assert_eq!(clock.now(), 500);

        clock.set(900);
        assert_eq!(clock.now(), 900);
    }

    #[test]
    fn test_system_clock_is_recent() {
        // 2024-01-01
        assert!(SystemClock.now() > 1_704_067_200);
    }
}
