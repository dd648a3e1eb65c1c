use thiserror::Error;

/// Errors that stop the node from starting.
///
/// Once the control loop runs, nothing is fatal: faults are logged and the
/// loop carries on.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration failed validation
    #[error("Configuration error: {0}")]
    Config(#[from] pinelock_core::Error),

    /// Peripheral could not be brought to a safe initial state
    #[error("Hardware error: {0}")]
    Hardware(#[from] pinelock_hardware::HardwareError),
}

/// Specialized result type for engine setup
pub type Result<T> = std::result::Result<T, EngineError>;
