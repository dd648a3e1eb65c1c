//! Fixed-capacity credential table keyed by identifier.

use crate::error::CredentialError;
use crate::validity::TemporalValidity;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use pinelock_core::{CardUid, CredentialKind, PinCode, TimeWindow};
use std::fmt;
use std::hash::Hash;

/// Format limits applied to identifiers before they enter a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentifierLimits {
    pub max_pin_length: usize,
    pub max_uid_length: usize,
}

/// Identifier type stored in one credential table.
pub trait CredentialId: Clone + Eq + Hash + fmt::Display {
    const KIND: CredentialKind;

    /// Validate and normalize a raw identifier.
    ///
    /// # Errors
    /// Returns the core format error when the identifier is malformed.
    fn parse(raw: &str, limits: &IdentifierLimits) -> pinelock_core::Result<Self>;

    fn as_str(&self) -> &str;
}

impl CredentialId for PinCode {
    const KIND: CredentialKind = CredentialKind::Pin;

    fn parse(raw: &str, limits: &IdentifierLimits) -> pinelock_core::Result<Self> {
        PinCode::new(raw, limits.max_pin_length)
    }

    fn as_str(&self) -> &str {
        PinCode::as_str(self)
    }
}

impl CredentialId for CardUid {
    const KIND: CredentialKind = CredentialKind::Rfid;

    fn parse(raw: &str, limits: &IdentifierLimits) -> pinelock_core::Result<Self> {
        CardUid::new(raw, limits.max_uid_length)
    }

    fn as_str(&self) -> &str {
        CardUid::as_str(self)
    }
}

/// Stored attributes of one credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialEntry {
    pub active: bool,
    pub window: Option<TimeWindow>,
}

impl TemporalValidity for CredentialEntry {
    fn is_active(&self) -> bool {
        self.active
    }

    fn window(&self) -> Option<&TimeWindow> {
        self.window.as_ref()
    }
}

/// Result of a successful add.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// New identifier, table grew by one.
    Inserted,
    /// Existing identifier, fields overwritten in place.
    Updated,
}

/// Credentials of one kind, in insertion order.
///
/// Order only matters for persistence enumeration; lookups go through the
/// identifier hash. Removal shifts later entries down so the remaining order
/// is preserved.
#[derive(Debug, Clone)]
pub struct CredentialTable<K: CredentialId> {
    entries: IndexMap<K, CredentialEntry>,
    capacity: usize,
}

impl<K: CredentialId> CredentialTable<K> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: IndexMap::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert or overwrite an entry.
    ///
    /// # Errors
    /// Returns `CredentialError::CapacityReached` when the table is full and
    /// `id` is new. Updating an existing identifier always succeeds.
    pub fn upsert(&mut self, id: K, entry: CredentialEntry) -> Result<AddOutcome, CredentialError> {
        if let Some(existing) = self.entries.get_mut(&id) {
            *existing = entry;
            return Ok(AddOutcome::Updated);
        }

        if self.entries.len() >= self.capacity {
            return Err(CredentialError::CapacityReached {
                kind: K::KIND,
                capacity: self.capacity,
            });
        }

        self.entries.insert(id, entry);
        Ok(AddOutcome::Inserted)
    }

    /// # Errors
    /// Returns `CredentialError::NotFound` if `id` is not stored.
    pub fn remove(&mut self, id: &K) -> Result<CredentialEntry, CredentialError> {
        self.entries
            .shift_remove(id)
            .ok_or(CredentialError::NotFound { kind: K::KIND })
    }

    pub fn get(&self, id: &K) -> Option<&CredentialEntry> {
        self.entries.get(id)
    }

    pub fn is_valid(&self, id: &K, now: Option<DateTime<Utc>>) -> bool {
        self.entries
            .get(id)
            .is_some_and(|entry| entry.is_valid_at(now))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &CredentialEntry)> {
        self.entries.iter()
    }
}
