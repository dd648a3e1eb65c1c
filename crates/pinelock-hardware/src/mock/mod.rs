//! Mock device implementations for testing and simulation.
//!
//! Each mock comes paired with a handle that drives it from the outside,
//! so a test can hold the handle while the engine owns the device.

pub mod io;
pub mod keypad;
pub mod rfid;

pub use io::{MockInput, MockInputHandle, MockOutput, MockOutputHandle};
pub use keypad::{MockKeypad, MockKeypadHandle};
pub use rfid::{MockRfid, MockRfidHandle};
