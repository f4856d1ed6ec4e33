// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! Clock abstraction for testable time handling.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// A clock that provides the current wall-clock time.
///
/// Everything in the kernel that stamps a record (`created_at`,
/// `updated_at`, escalation `next_due`) goes through this trait instead of
/// calling `Utc::now()` directly, so tests can control time deterministically.
pub trait Clock: Clone + Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Real system clock.
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fake clock for testing with controllable, monotonically-advancing time.
#[derive(Clone)]
pub struct FakeClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self { current: Arc::new(Mutex::new(DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default())) }
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        let mut cur = self.current.lock();
        *cur += chrono::Duration::from_std(duration).unwrap_or_default();
    }

    /// Set the clock to a specific instant.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.current.lock() = at;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances_monotonically() {
        let clock = FakeClock::new();
        let t0 = clock.now();
        clock.advance(Duration::from_secs(30));
        let t1 = clock.now();
        assert!(t1 > t0);
        assert_eq!((t1 - t0).num_seconds(), 30);
    }
}
