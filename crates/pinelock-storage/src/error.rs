use pinelock_core::CredentialKind;
use thiserror::Error;

/// Reasons a credential table operation is refused.
///
/// None of these mutate the table: a rejected add or remove leaves every
/// existing entry untouched.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Identifier failed format validation for its table
    #[error("Invalid {kind} identifier: {source}")]
    InvalidFormat {
        kind: CredentialKind,
        #[source]
        source: pinelock_core::Error,
    },

    /// Table is full and the identifier is not already present
    #[error("{kind} table is full ({capacity} entries)")]
    CapacityReached {
        kind: CredentialKind,
        capacity: usize,
    },

    /// No entry with this identifier
    #[error("{kind} identifier not found")]
    NotFound { kind: CredentialKind },
}

/// Failures of the persistence backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend state is unusable
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Specialized result type for persistence operations
pub type StorageResult<T> = Result<T, StorageError>;
