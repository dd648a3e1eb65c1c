//! Fixed-delay reconnect schedule.
//!
//! The control loop never sleeps through the backoff. It asks the schedule
//! whether an attempt is due and keeps servicing local inputs and the
//! watchdog in between.

use pinelock_core::MonoTime;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ReconnectSchedule {
    delay: Duration,
    last_failure: Option<MonoTime>,
    failures: u32,
}

impl ReconnectSchedule {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_failure: None,
            failures: 0,
        }
    }

    /// Whether a connection attempt may be made at `now`.
    ///
    /// The first attempt is always due. After a failure the next one is due
    /// once the delay has passed; a counter that moved backwards counts as
    /// passed.
    pub fn is_due(&self, now: MonoTime) -> bool {
        match self.last_failure {
            None => true,
            Some(failed_at) => now.has_elapsed(failed_at, self.delay),
        }
    }

    pub fn record_failure(&mut self, now: MonoTime) {
        self.last_failure = Some(now);
        self.failures = self.failures.saturating_add(1);
    }

    pub fn record_success(&mut self) {
        self.last_failure = None;
        self.failures = 0;
    }

    /// Failures since the last successful connect.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}
