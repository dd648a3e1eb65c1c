use thiserror::Error;

/// Errors raised while decoding broker frames or device messages.
///
/// Every variant describes input that is rejected without touching device
/// state. The control loop logs it and carries on.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Topic is outside this device's namespace or has an unknown suffix
    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    /// Payload is not the JSON shape the topic expects
    #[error("Malformed {topic} payload: {source}")]
    Malformed {
        topic: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Command action is not recognised
    #[error("Unknown command action: {0:?}")]
    UnknownAction(String),

    /// Command is missing a field its action requires
    #[error("Command {action} is missing required field {field}")]
    MissingField {
        action: &'static str,
        field: &'static str,
    },

    /// Validity bound is neither RFC 3339 nor Unix seconds
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Validity window is inverted
    #[error("Invalid validity window: {0}")]
    InvalidWindow(#[source] pinelock_core::Error),

    /// Frame exceeds the configured maximum length
    #[error("Frame too large: {size} bytes (max {max_size})")]
    FrameTooLarge { size: usize, max_size: usize },

    /// Frame is not valid broker syntax
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Outbound payload could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Specialized result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;
