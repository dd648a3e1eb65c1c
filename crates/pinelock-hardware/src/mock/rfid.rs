//! Mock RFID reader for tests and simulation.

use crate::{
    HardwareError, Result,
    traits::{RfidReader, RfidReading},
};
use pinelock_core::CardUid;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct ReaderState {
    card: Option<CardUid>,
    missed_reads: u32,
    unresponsive: bool,
    reinit_count: u32,
}

/// Simulated reader whose field is controlled through a [`MockRfidHandle`].
///
/// # Examples
///
/// ```
/// use pinelock_core::CardUid;
/// use pinelock_hardware::mock::MockRfid;
/// use pinelock_hardware::{RfidReader, RfidReading};
///
/// let (mut reader, handle) = MockRfid::new();
/// assert_eq!(reader.poll().unwrap(), RfidReading::NoCard);
///
/// let uid = CardUid::from_bytes(&[0x04, 0xAB, 0xCD, 0xEF]);
/// handle.present_card(uid.clone());
/// assert_eq!(reader.poll().unwrap(), RfidReading::Card(uid));
/// ```
#[derive(Debug)]
pub struct MockRfid {
    state: Arc<Mutex<ReaderState>>,
}

impl MockRfid {
    pub fn new() -> (Self, MockRfidHandle) {
        let state = Arc::new(Mutex::new(ReaderState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockRfidHandle { state },
        )
    }

    fn state(&self) -> Result<MutexGuard<'_, ReaderState>> {
        self.state
            .lock()
            .map_err(|_| HardwareError::communication("Mock reader state poisoned"))
    }
}

impl RfidReader for MockRfid {
    fn poll(&mut self) -> Result<RfidReading> {
        let mut state = self.state()?;

        if state.unresponsive {
            return Ok(RfidReading::Unresponsive);
        }

        if state.missed_reads > 0 {
            state.missed_reads -= 1;
            return Ok(RfidReading::NoCard);
        }

        Ok(state
            .card
            .clone()
            .map_or(RfidReading::NoCard, RfidReading::Card))
    }

    fn reinitialize(&mut self) -> Result<()> {
        let mut state = self.state()?;
        state.reinit_count += 1;
        state.unresponsive = false;
        Ok(())
    }
}

/// Handle controlling a [`MockRfid`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MockRfidHandle {
    state: Arc<Mutex<ReaderState>>,
}

impl MockRfidHandle {
    /// Place a card in the field; it stays until removed.
    pub fn present_card(&self, uid: CardUid) {
        self.with_state(|state| state.card = Some(uid));
    }

    /// Take the card out of the field.
    pub fn remove_card(&self) {
        self.with_state(|state| state.card = None);
    }

    /// Make the next `count` polls miss the card, as a flickering antenna
    /// would.
    pub fn miss_reads(&self, count: u32) {
        self.with_state(|state| state.missed_reads = count);
    }

    /// Make the reader report its fault signature until reinitialized.
    pub fn set_unresponsive(&self, unresponsive: bool) {
        self.with_state(|state| state.unresponsive = unresponsive);
    }

    /// Number of reinitialize requests the reader has received.
    pub fn reinit_count(&self) -> u32 {
        self.state.lock().map(|state| state.reinit_count).unwrap_or(0)
    }

    fn with_state(&self, f: impl FnOnce(&mut ReaderState)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid() -> CardUid {
        CardUid::from_bytes(&[0xDE, 0xAD, 0xBE, 0xEF])
    }

    #[test]
    fn test_present_and_remove() {
        let (mut reader, handle) = MockRfid::new();

        handle.present_card(uid());
        assert_eq!(reader.poll().unwrap(), RfidReading::Card(uid()));
        assert_eq!(reader.poll().unwrap(), RfidReading::Card(uid()));

        handle.remove_card();
        assert_eq!(reader.poll().unwrap(), RfidReading::NoCard);
    }

    #[test]
    fn test_missed_reads() {
        let (mut reader, handle) = MockRfid::new();
        handle.present_card(uid());
        handle.miss_reads(2);

        assert_eq!(reader.poll().unwrap(), RfidReading::NoCard);
        assert_eq!(reader.poll().unwrap(), RfidReading::NoCard);
        assert_eq!(reader.poll().unwrap(), RfidReading::Card(uid()));
    }

    #[test]
    fn test_unresponsive_until_reinitialized() {
        let (mut reader, handle) = MockRfid::new();
        handle.set_unresponsive(true);

        assert_eq!(reader.poll().unwrap(), RfidReading::Unresponsive);
        reader.reinitialize().unwrap();

        assert_eq!(handle.reinit_count(), 1);
        assert_eq!(reader.poll().unwrap(), RfidReading::NoCard);
    }
}
