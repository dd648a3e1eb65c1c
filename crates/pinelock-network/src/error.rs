use pinelock_protocol::ProtocolError;
use thiserror::Error;

/// Errors raised by a [`Transport`](crate::Transport).
///
/// Any of these after a successful connect leaves the transport
/// disconnected; the control loop schedules a reconnect.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Operation needs an open session
    #[error("Not connected to broker")]
    NotConnected,

    /// Broker did not answer in time
    #[error("Broker timeout after {0}ms")]
    Timeout(u64),

    /// Broker refused the session
    #[error("Broker rejected connection: {0}")]
    Rejected(String),

    /// Session ended underneath us
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Broker sent a frame that violates the protocol
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Specialized result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;
