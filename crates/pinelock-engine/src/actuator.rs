//! Lock actuator with timed auto-relock.
//!
//! # States
//!
//! - `Locked`: output de-energized, `opened_at` empty
//! - `Unlocked`: output energized, `opened_at` set to the monotonic time of
//!   the unlock
//!
//! Both `lock()` and `unlock()` are accepted from either state. The caller
//! publishes a status after every call, including a repeated lock.

use pinelock_core::{LockState, MonoTime};
use pinelock_hardware::{DigitalOutput, HardwareError};
use std::time::Duration;
use tracing::{info, warn};

pub struct LockActuator {
    output: Box<dyn DigitalOutput>,
    state: LockState,
    opened_at: Option<MonoTime>,
    relock_after: Duration,
}

impl LockActuator {
    /// Take ownership of the lock output and drive it to locked.
    ///
    /// # Errors
    /// Returns the hardware error if the output cannot be driven; the node
    /// must not start with the lock in an unknown state.
    pub fn new(mut output: Box<dyn DigitalOutput>, relock_after: Duration) -> Result<Self, HardwareError> {
        output.set_active(false)?;
        Ok(Self {
            output,
            state: LockState::Locked,
            opened_at: None,
            relock_after,
        })
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    pub fn is_locked(&self) -> bool {
        self.state.is_locked()
    }

    pub fn opened_at(&self) -> Option<MonoTime> {
        self.opened_at
    }

    pub fn lock(&mut self) -> LockState {
        self.drive(false);
        self.state = LockState::Locked;
        self.opened_at = None;
        info!("Lock LOCKED");
        self.state
    }

    /// Energize the lock. Unlocking while unlocked restarts the relock timer.
    pub fn unlock(&mut self, now: MonoTime) -> LockState {
        self.drive(true);
        self.state = LockState::Unlocked;
        self.opened_at = Some(now);
        info!(relock_ms = self.relock_after.as_millis() as u64, "Lock UNLOCKED");
        self.state
    }

    /// Relock once the unlock duration has passed.
    ///
    /// Returns `true` if the lock was re-engaged on this tick. A counter that
    /// moved backwards since the unlock counts as expired.
    pub fn tick(&mut self, now: MonoTime) -> bool {
        match self.opened_at {
            Some(opened_at) if now.has_elapsed(opened_at, self.relock_after) => {
                info!("Auto-relock");
                self.lock();
                true
            }
            _ => false,
        }
    }

    fn drive(&mut self, energized: bool) {
        if let Err(e) = self.output.set_active(energized) {
            warn!(error = %e, energized, "Failed to drive lock output");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinelock_hardware::mock::{MockOutput, MockOutputHandle};
    use rstest::rstest;

    fn actuator(relock_ms: u64) -> (LockActuator, MockOutputHandle) {
        let (output, handle) = MockOutput::new();
        let actuator = LockActuator::new(Box::new(output), Duration::from_millis(relock_ms)).unwrap();
        (actuator, handle)
    }

    fn at(ms: u32) -> MonoTime {
        MonoTime::from_millis(ms)
    }

    #[test]
    fn test_starts_locked_with_output_off() {
        let (actuator, output) = actuator(5000);
        assert!(actuator.is_locked());
        assert!(!output.is_active());
        assert_eq!(output.writes(), 1);
    }

    #[test]
    fn test_unlock_then_lock() {
        let (mut actuator, output) = actuator(5000);

        assert_eq!(actuator.unlock(at(100)), LockState::Unlocked);
        assert!(output.is_active());
        assert_eq!(actuator.opened_at(), Some(at(100)));

        assert_eq!(actuator.lock(), LockState::Locked);
        assert!(!output.is_active());
        assert_eq!(actuator.opened_at(), None);
    }

    #[test]
    fn test_lock_when_locked_still_drives_output() {
        let (mut actuator, output) = actuator(5000);
        actuator.lock();
        assert_eq!(output.writes(), 2);
    }

    #[rstest]
    #[case(1_000, 5_999, false)]
    #[case(1_000, 6_000, true)]
    #[case(1_000, 60_000, true)]
    fn test_auto_relock(#[case] unlocked_at: u32, #[case] now: u32, #[case] relocked: bool) {
        let (mut actuator, _) = actuator(5000);
        actuator.unlock(at(unlocked_at));

        assert_eq!(actuator.tick(at(now)), relocked);
        assert_eq!(actuator.is_locked(), relocked);
    }

    #[test]
    fn test_relock_survives_counter_wrap() {
        let (mut actuator, _) = actuator(5000);
        actuator.unlock(at(u32::MAX - 1_000));

        assert!(!actuator.tick(at(u32::MAX - 10)));
        assert!(actuator.tick(at(200)));
        assert!(actuator.is_locked());
    }

    #[test]
    fn test_tick_while_locked_is_noop() {
        let (mut actuator, output) = actuator(5000);
        assert!(!actuator.tick(at(1_000_000)));
        assert_eq!(output.writes(), 1);
    }

    #[test]
    fn test_repeat_unlock_restarts_timer() {
        let (mut actuator, _) = actuator(5000);
        actuator.unlock(at(0));
        actuator.unlock(at(4_000));

        assert!(!actuator.tick(at(6_000)));
        assert!(actuator.tick(at(9_000)));
    }
}
