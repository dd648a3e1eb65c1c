//! Time capability consumed by the control loop.
//!
//! Two notions of time are kept apart:
//!
//! - **Wall time** (`DateTime<Utc>`) comes from the real-time clock chip and
//!   may be missing entirely. It is used for credential validity windows and
//!   for outbound timestamps.
//! - **Monotonic time** ([`MonoTime`]) is a free-running 32-bit millisecond
//!   counter, the equivalent of a microcontroller `millis()`. Every timer in
//!   the engine (auto-relock, buzzer, debounce, alarm windows) is measured
//!   with it.
//!
//! The counter wraps after roughly 49.7 days. [`MonoTime::elapsed_since`]
//! reports a backwards step as `None`, and [`MonoTime::has_elapsed`] treats
//! that as "period exceeded", so a wrap can only make a timer fire, never
//! stall it.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Point on the wrapping millisecond counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MonoTime(u32);

impl MonoTime {
    #[must_use]
    pub const fn from_millis(ms: u32) -> Self {
        MonoTime(ms)
    }

    #[must_use]
    pub fn as_millis(self) -> u32 {
        self.0
    }

    /// Time elapsed since `earlier`, or `None` if the counter is behind
    /// `earlier` (it wrapped or was reset).
    #[must_use]
    pub fn elapsed_since(self, earlier: MonoTime) -> Option<Duration> {
        self.0
            .checked_sub(earlier.0)
            .map(|ms| Duration::from_millis(u64::from(ms)))
    }

    /// Whether at least `period` has passed since `earlier`.
    ///
    /// A counter that moved backwards counts as elapsed.
    #[must_use]
    pub fn has_elapsed(self, earlier: MonoTime, period: Duration) -> bool {
        match self.elapsed_since(earlier) {
            Some(elapsed) => elapsed >= period,
            None => true,
        }
    }

    /// Counter advanced by `delta`, wrapping like the hardware counter does.
    #[must_use]
    pub fn wrapping_add(self, delta: Duration) -> Self {
        let ms = u32::try_from(delta.as_millis() % (u128::from(u32::MAX) + 1)).unwrap_or(0);
        MonoTime(self.0.wrapping_add(ms))
    }

    /// Whole seconds since the counter last started from zero.
    #[must_use]
    pub fn uptime_secs(self) -> i64 {
        i64::from(self.0 / 1000)
    }
}

/// Source of wall and monotonic time.
pub trait Clock: Send + Sync {
    /// Current wall time, or `None` when no real-time clock is available.
    fn wall(&self) -> Option<DateTime<Utc>>;

    /// Current value of the monotonic millisecond counter.
    fn monotonic(&self) -> MonoTime;

    /// Timestamp for outbound messages: Unix seconds when the wall clock is
    /// available, uptime seconds otherwise.
    fn timestamp(&self) -> i64 {
        self.wall()
            .map(|now| now.timestamp())
            .unwrap_or_else(|| self.monotonic().uptime_secs())
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn wall(&self) -> Option<DateTime<Utc>> {
        (**self).wall()
    }

    fn monotonic(&self) -> MonoTime {
        (**self).monotonic()
    }
}

/// Clock backed by the host: `chrono::Utc::now()` for wall time and a
/// process-start `Instant` for the monotonic counter.
#[derive(Debug, Clone)]
pub struct SystemClock {
    started: Instant,
    rtc_available: bool,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            rtc_available: true,
        }
    }

    /// A clock that reports no wall time, as a board without a working RTC
    /// would.
    pub fn without_rtc() -> Self {
        Self {
            started: Instant::now(),
            rtc_available: false,
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn wall(&self) -> Option<DateTime<Utc>> {
        self.rtc_available.then(Utc::now)
    }

    fn monotonic(&self) -> MonoTime {
        MonoTime::default().wrapping_add(self.started.elapsed())
    }
}

/// Hand-driven clock for tests and simulation.
///
/// Clones share the same underlying time, so a test can keep one handle and
/// pass another to the engine.
///
/// # Examples
///
/// ```
/// use pinelock_core::{Clock, ManualClock, MonoTime};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// let engine_clock = clock.clone();
///
/// clock.advance(Duration::from_millis(250));
/// assert_eq!(engine_clock.monotonic(), MonoTime::from_millis(250));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    mono: Arc<AtomicU32>,
    wall: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl ManualClock {
    /// Starts at monotonic zero with no wall time.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts at monotonic zero with the given wall time.
    pub fn with_wall(now: DateTime<Utc>) -> Self {
        let clock = Self::new();
        clock.set_wall(Some(now));
        clock
    }

    pub fn set_wall(&self, now: Option<DateTime<Utc>>) {
        if let Ok(mut wall) = self.wall.lock() {
            *wall = now;
        }
    }

    pub fn set_monotonic(&self, at: MonoTime) {
        self.mono.store(at.as_millis(), Ordering::SeqCst);
    }

    /// Advance both counters. The monotonic counter wraps at `u32::MAX`.
    pub fn advance(&self, delta: Duration) {
        let next = self.monotonic().wrapping_add(delta);
        self.mono.store(next.as_millis(), Ordering::SeqCst);

        if let Ok(mut wall) = self.wall.lock()
            && let Some(now) = wall.as_mut()
            && let Ok(delta) = chrono::Duration::from_std(delta)
        {
            *now += delta;
        }
    }
}

impl Clock for ManualClock {
    fn wall(&self) -> Option<DateTime<Utc>> {
        self.wall.lock().ok().and_then(|wall| *wall)
    }

    fn monotonic(&self) -> MonoTime {
        MonoTime(self.mono.load(Ordering::SeqCst))
    }
}
