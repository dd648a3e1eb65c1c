//! Behaviour of the PineLock access-control node.
//!
//! # Components
//!
//! - [`LockActuator`]: lock output with timed auto-relock
//! - [`InputAggregator`]: keypad PIN entry and RFID presence
//! - [`AlarmController`]: vibration and door monitoring, buzzer
//! - [`Device`]: owned node state, turns inputs and controller messages into
//!   outbound messages
//! - [`Runtime`]: the control loop binding a [`Device`] to a transport
//!
//! # Example
//!
//! ```
//! use pinelock_core::{DeviceConfig, ManualClock};
//! use pinelock_engine::{Device, Peripherals, prepare_store};
//! use pinelock_hardware::mock::{MockInput, MockKeypad, MockOutput, MockRfid};
//! use pinelock_storage::MemoryKeyValue;
//!
//! let mut config = DeviceConfig::default();
//! config.access.default_pins = vec!["4821".into()];
//!
//! let (keypad, keys) = MockKeypad::new();
//! let peripherals = Peripherals {
//!     keypad: Box::new(keypad),
//!     rfid: Box::new(MockRfid::new().0),
//!     lock_output: Box::new(MockOutput::new().0),
//!     buzzer_output: Box::new(MockOutput::new().0),
//!     vibration_input: Box::new(MockInput::new().0),
//!     door_input: Box::new(MockInput::new().0),
//! };
//! let store = prepare_store(&config.access, Box::new(MemoryKeyValue::new()));
//! let mut device = Device::new(&config, peripherals, store, Box::new(ManualClock::new())).unwrap();
//!
//! keys.type_keys("4821#").unwrap();
//! for _ in 0..5 {
//!     device.tick();
//! }
//! assert!(!device.is_locked());
//! ```

pub mod actuator;
pub mod alarm;
pub mod device;
pub mod error;
pub mod input;
pub mod runtime;

pub use actuator::LockActuator;
pub use alarm::{AlarmController, AlarmEvent, Buzzer, DoorMonitor, DoorUpdate, VibrationMonitor};
pub use device::{Device, Peripherals, prepare_store};
pub use error::{EngineError, Result};
pub use input::{InputAggregator, InputEvent, PinEntry, PresenceChange, RfidPresence};
pub use runtime::Runtime;
