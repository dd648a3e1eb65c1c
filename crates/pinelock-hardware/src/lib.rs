//! Peripheral abstraction layer for the PineLock node.
//!
//! The engine never talks to a bus directly. It consumes the traits defined
//! here, each a non-blocking poll or a single write:
//!
//! - [`Keypad`]: the key currently held on the 4x4 matrix
//! - [`RfidReader`]: whether a transponder is in the field, and its UID
//! - [`DigitalInput`]: vibration switch and door contact
//! - [`DigitalOutput`]: lock MOSFET and buzzer
//!
//! Real drivers implement these traits outside this workspace. The
//! [`mock`] module provides controllable stand-ins for tests and for
//! running the node without hardware.
//!
//! ```
//! use pinelock_hardware::mock::MockKeypad;
//! use pinelock_hardware::{Keypad, KeypadKey};
//!
//! let (mut keypad, handle) = MockKeypad::new();
//! handle.type_keys("4821#").unwrap();
//!
//! let mut pressed = Vec::new();
//! while let Some(key) = keypad.read_key().unwrap() {
//!     pressed.push(key.as_char());
//! }
//! assert_eq!(pressed, vec!['4', '8', '2', '1', '#']);
//! assert_eq!(keypad.read_key().unwrap(), None::<KeypadKey>);
//! ```

pub mod error;
pub mod mock;
pub mod traits;

pub use error::{HardwareError, Result};
pub use traits::{
    DigitalInput, DigitalOutput, KEYPAD_LAYOUT, Keypad, KeypadKey, RfidReader, RfidReading,
    UNRESPONSIVE_VERSION_REGISTER, is_unresponsive_version,
};
