//! Liveness watchdog hook.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// External liveness check that must be fed regularly or it resets the
/// device.
pub trait Watchdog: Send {
    fn feed(&mut self);
}

/// Watchdog for hosts without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopWatchdog;

impl Watchdog for NoopWatchdog {
    fn feed(&mut self) {}
}

/// Watchdog that counts feeds; clones share the counter.
#[derive(Debug, Clone, Default)]
pub struct CountingWatchdog {
    feeds: Arc<AtomicU64>,
}

impl CountingWatchdog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feeds(&self) -> u64 {
        self.feeds.load(Ordering::Relaxed)
    }
}

impl Watchdog for CountingWatchdog {
    fn feed(&mut self) {
        self.feeds.fetch_add(1, Ordering::Relaxed);
    }
}
