//! Mock keypad for tests and simulation.

use crate::{
    HardwareError, Result,
    traits::{Keypad, KeypadKey},
};
use tokio::sync::mpsc;

/// Simulated keypad fed through a channel.
///
/// Each queued entry is what one poll observes: `Some(key)` while a key is
/// held, `None` for an idle scan. An empty queue reads as idle.
///
/// # Examples
///
/// ```
/// use pinelock_hardware::mock::MockKeypad;
/// use pinelock_hardware::{Keypad, KeypadKey};
///
/// let (mut keypad, handle) = MockKeypad::new();
/// handle.press(KeypadKey::Digit(4)).unwrap();
///
/// assert_eq!(keypad.read_key().unwrap(), Some(KeypadKey::Digit(4)));
/// assert_eq!(keypad.read_key().unwrap(), None);
/// ```
#[derive(Debug)]
pub struct MockKeypad {
    scan_rx: mpsc::UnboundedReceiver<Option<KeypadKey>>,
}

impl MockKeypad {
    pub fn new() -> (Self, MockKeypadHandle) {
        let (scan_tx, scan_rx) = mpsc::unbounded_channel();
        (Self { scan_rx }, MockKeypadHandle { scan_tx })
    }
}

impl Keypad for MockKeypad {
    fn read_key(&mut self) -> Result<Option<KeypadKey>> {
        match self.scan_rx.try_recv() {
            Ok(scan) => Ok(scan),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => {
                Err(HardwareError::disconnected("Keypad scan channel closed"))
            }
        }
    }
}

/// Handle for driving a [`MockKeypad`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MockKeypadHandle {
    scan_tx: mpsc::UnboundedSender<Option<KeypadKey>>,
}

impl MockKeypadHandle {
    /// Queue a scan that sees `key` held down.
    ///
    /// # Errors
    ///
    /// Returns an error if the keypad has been dropped.
    pub fn press(&self, key: KeypadKey) -> Result<()> {
        self.send(Some(key))
    }

    /// Queue an idle scan.
    ///
    /// # Errors
    ///
    /// Returns an error if the keypad has been dropped.
    pub fn release(&self) -> Result<()> {
        self.send(None)
    }

    /// Queue one held scan per legend character, e.g. `"4821#"`.
    ///
    /// # Errors
    ///
    /// Returns an error on an unknown legend or if the keypad has been
    /// dropped.
    pub fn type_keys(&self, keys: &str) -> Result<()> {
        for c in keys.chars() {
            let key = KeypadKey::from_char(c)
                .ok_or_else(|| HardwareError::invalid_data(format!("No key labelled {c:?}")))?;
            self.press(key)?;
        }
        Ok(())
    }

    fn send(&self, scan: Option<KeypadKey>) -> Result<()> {
        self.scan_tx
            .send(scan)
            .map_err(|_| HardwareError::disconnected("Keypad scan channel closed"))
    }
}
