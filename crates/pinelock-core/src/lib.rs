//! Shared domain types for the PineLock access-control node.
//!
//! Everything the other crates agree on lives here: the error taxonomy,
//! credential identifiers, lock and access records, the time capability and
//! the device configuration.

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod types;

pub use clock::{Clock, ManualClock, MonoTime, SystemClock};
pub use config::DeviceConfig;
pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
