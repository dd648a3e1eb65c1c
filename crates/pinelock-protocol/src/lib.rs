//! Wire formats for the PineLock node.
//!
//! Two layers live here. [`codec`] frames the line-oriented broker protocol
//! spoken over TCP. [`inbound`] and [`outbound`] define the JSON bodies
//! exchanged on the per-device topics built by [`topics`].

pub mod codec;
pub mod error;
pub mod inbound;
pub mod outbound;
pub mod topics;

pub use codec::{BrokerCodec, BrokerFrame};
pub use error::{ProtocolError, Result};
pub use inbound::{Command, ConfigSnapshot, InboundMessage};
pub use outbound::{OutboundMessage, StatusReport};
pub use topics::{InboundTopic, Topics};
