//! Credential tables for the PineLock node and their persistence.
//!
//! [`CredentialStore`] is the only writer of the PIN and RFID tables. It
//! validates identifiers on the way in, answers access checks, and writes a
//! flat snapshot to a [`KeyValueStore`] after every change.

pub mod error;
pub mod persistence;
pub mod snapshot;
pub mod store;
pub mod table;
pub mod validity;

pub use error::{CredentialError, StorageError, StorageResult};
pub use persistence::{FileKeyValue, KeyValueStore, MemoryKeyValue};
pub use store::{CredentialStore, RestoreReport, SkippedEntry, SnapshotReport, StoreLimits};
pub use table::{AddOutcome, CredentialEntry, CredentialId, CredentialTable, IdentifierLimits};
pub use validity::TemporalValidity;
