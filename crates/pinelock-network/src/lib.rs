//! Message channel between the PineLock node and its controller.
//!
//! # Components
//!
//! - [`Transport`]: connect / subscribe / publish / poll, bounded by timeouts
//! - [`TcpTransport`]: the line broker protocol over TCP
//! - [`MemoryTransport`]: in-process broker for tests and simulation
//! - [`ReconnectSchedule`]: fixed-delay retry timer checked by the control loop
//! - [`Watchdog`]: liveness hook fed by the control loop

mod backoff;
mod error;
mod memory;
mod tcp;
mod transport;
mod watchdog;

pub use backoff::ReconnectSchedule;
pub use error::{Result, TransportError};
pub use memory::{MemoryTransport, MemoryTransportHandle};
pub use tcp::{TcpTransport, TcpTransportConfig};
pub use transport::{Delivery, Transport};
pub use watchdog::{CountingWatchdog, NoopWatchdog, Watchdog};
