//! Peripheral trait definitions.
//!
//! The control loop is single-threaded and cooperative, so every trait here
//! is a non-blocking *poll*: one call reads the current state of the device
//! and returns immediately. Electrical scanning, bus protocols and chip
//! drivers live behind these traits and are not part of this crate.

use crate::error::{HardwareError, Result};
use pinelock_core::CardUid;

/// Key on the 4x4 membrane keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeypadKey {
    /// Numeric digit (0-9).
    Digit(u8),

    /// `*`, clears the pending PIN.
    Star,

    /// `#`, submits the pending PIN.
    Hash,

    /// Letter keys `A`-`D`, currently unassigned.
    Letter(char),
}

/// Key layout of the 4x4 keypad matrix, row by row.
pub const KEYPAD_LAYOUT: [[char; 4]; 4] = [
    ['1', '2', '3', 'A'],
    ['4', '5', '6', 'B'],
    ['7', '8', '9', 'C'],
    ['*', '0', '#', 'D'],
];

impl KeypadKey {
    /// Create a digit key.
    ///
    /// # Errors
    ///
    /// Returns an error if the digit is greater than 9.
    ///
    /// # Examples
    ///
    /// ```
    /// use pinelock_hardware::KeypadKey;
    ///
    /// assert_eq!(KeypadKey::digit(5).unwrap().as_char(), '5');
    /// assert!(KeypadKey::digit(10).is_err());
    /// ```
    pub fn digit(d: u8) -> Result<Self> {
        if d > 9 {
            return Err(HardwareError::invalid_data(format!(
                "Digit must be 0-9, got {d}"
            )));
        }
        Ok(Self::Digit(d))
    }

    /// Map a keypad legend character to a key.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '0'..='9' => c.to_digit(10).and_then(|d| u8::try_from(d).ok()).map(Self::Digit),
            '*' => Some(Self::Star),
            '#' => Some(Self::Hash),
            'A'..='D' => Some(Self::Letter(c)),
            _ => None,
        }
    }

    /// Key at a matrix position.
    ///
    /// # Errors
    ///
    /// Returns an error if the row or column is outside the 4x4 matrix.
    pub fn from_matrix(row: usize, col: usize) -> Result<Self> {
        KEYPAD_LAYOUT
            .get(row)
            .and_then(|keys| keys.get(col))
            .and_then(|&c| Self::from_char(c))
            .ok_or_else(|| {
                HardwareError::invalid_data(format!("No key at matrix position ({row}, {col})"))
            })
    }

    /// The legend printed on the key.
    pub fn as_char(&self) -> char {
        match self {
            Self::Digit(d) => char::from(b'0' + d),
            Self::Star => '*',
            Self::Hash => '#',
            Self::Letter(c) => *c,
        }
    }
}

/// Numeric keypad.
pub trait Keypad: Send {
    /// Read the key currently held down, if any.
    ///
    /// A key held across several polls is reported on each of them; turning
    /// that into discrete presses is the caller's job.
    ///
    /// # Errors
    ///
    /// Returns an error if the keypad cannot be scanned.
    fn read_key(&mut self) -> Result<Option<KeypadKey>>;
}

/// Outcome of one RFID reader poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RfidReading {
    /// No transponder in the field.
    NoCard,

    /// A transponder answered with this UID.
    Card(CardUid),

    /// The reader returned its fault signature and must be reinitialized.
    Unresponsive,
}

/// Values of the reader version register that indicate a hung chip.
pub const UNRESPONSIVE_VERSION_REGISTER: [u8; 2] = [0x00, 0xFF];

/// Whether a version register read signals an unresponsive reader.
pub fn is_unresponsive_version(value: u8) -> bool {
    UNRESPONSIVE_VERSION_REGISTER.contains(&value)
}

/// RFID/NFC proximity reader.
pub trait RfidReader: Send {
    /// Check whether a transponder is readable right now.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader cannot be reached on its bus.
    fn poll(&mut self) -> Result<RfidReading>;

    /// Reset and reinitialize the reader chip.
    ///
    /// # Errors
    ///
    /// Returns an error if the reset sequence fails.
    fn reinitialize(&mut self) -> Result<()>;
}

/// Binary sensor input (vibration switch, door reed contact).
pub trait DigitalInput: Send {
    /// Current level of the input; `true` means triggered / open.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be read.
    fn is_active(&mut self) -> Result<bool>;
}

/// Binary output (lock MOSFET, buzzer).
pub trait DigitalOutput: Send {
    /// Drive the output; `true` energizes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be driven.
    fn set_active(&mut self, active: bool) -> Result<()>;
}
