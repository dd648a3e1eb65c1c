//! The credential store: both tables, their limits and their persistence.

use crate::error::{CredentialError, StorageResult};
use crate::persistence::KeyValueStore;
use crate::snapshot::{decode_table, encode_table};
use crate::table::{AddOutcome, CredentialEntry, CredentialId, CredentialTable, IdentifierLimits};
use chrono::{DateTime, Utc};
use pinelock_core::config::AccessSection;
use pinelock_core::{CardUid, CredentialKind, PinCode, TimeWindow};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Capacity and format limits for both tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    pub max_pin_codes: usize,
    pub max_rfid_cards: usize,
    pub identifiers: IdentifierLimits,
}

impl From<&AccessSection> for StoreLimits {
    fn from(access: &AccessSection) -> Self {
        Self {
            max_pin_codes: access.max_pin_codes,
            max_rfid_cards: access.max_rfid_cards,
            identifiers: IdentifierLimits {
                max_pin_length: access.max_pin_length,
                max_uid_length: access.max_uid_length,
            },
        }
    }
}

/// Outcome of reading the persisted snapshot back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub pins: usize,
    pub cards: usize,
    /// Persisted slots that were unreadable, malformed or over capacity.
    pub skipped: usize,
}

/// One entry of a config snapshot that could not be added.
#[derive(Debug)]
pub struct SkippedEntry {
    pub kind: CredentialKind,
    pub identifier: String,
    pub error: CredentialError,
}

/// Outcome of a full-config replace.
#[derive(Debug, Default)]
pub struct SnapshotReport {
    pub pins: usize,
    pub cards: usize,
    pub skipped: Vec<SkippedEntry>,
}

/// Owner of the PIN and RFID credential tables.
///
/// Every mutation is followed by a write of the whole snapshot to the
/// backend. A failed write is logged; the in-memory tables keep the change.
pub struct CredentialStore {
    pins: CredentialTable<PinCode>,
    cards: CredentialTable<CardUid>,
    limits: StoreLimits,
    backend: Box<dyn KeyValueStore>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("pins", &self.pins.len())
            .field("cards", &self.cards.len())
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

/// Log-safe rendering of an identifier. PIN digits never reach the log.
fn loggable(kind: CredentialKind, raw: &str) -> String {
    match kind {
        CredentialKind::Pin => "*".repeat(raw.len()),
        CredentialKind::Rfid => raw.trim().to_uppercase(),
    }
}

fn add_to<K: CredentialId>(
    table: &mut CredentialTable<K>,
    limits: &IdentifierLimits,
    raw: &str,
    entry: CredentialEntry,
) -> Result<AddOutcome, CredentialError> {
    let id = K::parse(raw, limits).map_err(|source| CredentialError::InvalidFormat {
        kind: K::KIND,
        source,
    })?;
    table.upsert(id, entry)
}

fn remove_from<K: CredentialId>(
    table: &mut CredentialTable<K>,
    limits: &IdentifierLimits,
    raw: &str,
) -> Result<(), CredentialError> {
    // A malformed identifier cannot be stored, so it cannot be found either.
    let id = K::parse(raw, limits).map_err(|_| CredentialError::NotFound { kind: K::KIND })?;
    table.remove(&id).map(|_| ())
}

fn is_valid_in<K: CredentialId>(
    table: &CredentialTable<K>,
    limits: &IdentifierLimits,
    raw: &str,
    now: Option<DateTime<Utc>>,
) -> bool {
    K::parse(raw, limits).is_ok_and(|id| table.is_valid(&id, now))
}

fn restore_table<K: CredentialId>(
    table: &mut CredentialTable<K>,
    limits: &IdentifierLimits,
    entries: &BTreeMap<String, String>,
) -> usize {
    let (decoded, issues) = decode_table(K::KIND, entries, table.capacity());
    let mut skipped = issues.len();

    for issue in issues {
        warn!(kind = %K::KIND, slot = issue.index, reason = %issue.reason, "Skipping unreadable credential slot");
    }

    for slot in decoded {
        let entry = CredentialEntry {
            active: slot.active,
            window: None,
        };
        if let Err(e) = add_to(table, limits, &slot.id, entry) {
            warn!(kind = %K::KIND, slot = slot.index, error = %e, "Skipping persisted credential");
            skipped += 1;
        }
    }

    skipped
}

impl CredentialStore {
    /// Create an empty store. Call [`CredentialStore::restore`] before the
    /// first validation to load what was persisted.
    pub fn new(limits: StoreLimits, backend: Box<dyn KeyValueStore>) -> Self {
        Self {
            pins: CredentialTable::with_capacity(limits.max_pin_codes),
            cards: CredentialTable::with_capacity(limits.max_rfid_cards),
            limits,
            backend,
        }
    }

    pub fn limits(&self) -> &StoreLimits {
        &self.limits
    }

    /// Replace the in-memory tables with the persisted snapshot.
    ///
    /// Corrupt, malformed or excess slots are skipped with a warning. An
    /// empty backend leaves both tables empty.
    ///
    /// # Errors
    /// Returns an error if the backend itself cannot be read; the tables are
    /// then left empty.
    pub fn restore(&mut self) -> StorageResult<RestoreReport> {
        self.pins.clear();
        self.cards.clear();

        let entries = self.backend.load()?;
        let ids = self.limits.identifiers;
        let skipped = restore_table(&mut self.pins, &ids, &entries)
            + restore_table(&mut self.cards, &ids, &entries);

        let report = RestoreReport {
            pins: self.pins.len(),
            cards: self.cards.len(),
            skipped,
        };
        info!(
            pins = report.pins,
            cards = report.cards,
            skipped = report.skipped,
            "Restored credentials"
        );
        Ok(report)
    }

    /// Seed PINs from local configuration when the store holds nothing.
    ///
    /// Returns the number of PINs added. Does nothing if either table is
    /// already populated.
    pub fn seed_defaults(&mut self, default_pins: &[String]) -> usize {
        if default_pins.is_empty() || !self.pins.is_empty() || !self.cards.is_empty() {
            return 0;
        }

        let ids = self.limits.identifiers;
        let mut added = 0;
        for raw in default_pins {
            let entry = CredentialEntry {
                active: true,
                window: None,
            };
            match add_to(&mut self.pins, &ids, raw, entry) {
                Ok(_) => added += 1,
                Err(e) => warn!(error = %e, "Ignoring default PIN"),
            }
        }

        if added > 0 {
            info!(count = added, "Seeded default PIN codes");
            self.persist();
        }
        added
    }

    /// Insert or overwrite a credential and persist.
    ///
    /// # Errors
    /// Returns `CredentialError::InvalidFormat` if the identifier is
    /// malformed for its table and `CredentialError::CapacityReached` if the
    /// table is full and the identifier is new. The tables are unchanged on
    /// error.
    pub fn add(
        &mut self,
        kind: CredentialKind,
        identifier: &str,
        active: bool,
        window: Option<TimeWindow>,
    ) -> Result<AddOutcome, CredentialError> {
        let entry = CredentialEntry { active, window };
        let ids = self.limits.identifiers;
        let outcome = match kind {
            CredentialKind::Pin => add_to(&mut self.pins, &ids, identifier, entry),
            CredentialKind::Rfid => add_to(&mut self.cards, &ids, identifier, entry),
        }?;

        info!(
            kind = %kind,
            id = %loggable(kind, identifier),
            active,
            windowed = window.is_some(),
            ?outcome,
            "Credential stored"
        );
        self.persist();
        Ok(outcome)
    }

    /// Remove a credential and persist.
    ///
    /// # Errors
    /// Returns `CredentialError::NotFound` if no such identifier is stored.
    pub fn remove(&mut self, kind: CredentialKind, identifier: &str) -> Result<(), CredentialError> {
        let ids = self.limits.identifiers;
        match kind {
            CredentialKind::Pin => remove_from(&mut self.pins, &ids, identifier),
            CredentialKind::Rfid => remove_from(&mut self.cards, &ids, identifier),
        }?;

        info!(kind = %kind, id = %loggable(kind, identifier), "Credential removed");
        self.persist();
        Ok(())
    }

    /// Whether `identifier` may open the door at `now`.
    ///
    /// `now` is `None` when the wall clock is unavailable, in which case
    /// validity windows are not enforced.
    pub fn validate(&self, kind: CredentialKind, identifier: &str, now: Option<DateTime<Utc>>) -> bool {
        let ids = &self.limits.identifiers;
        let valid = match kind {
            CredentialKind::Pin => is_valid_in(&self.pins, ids, identifier, now),
            CredentialKind::Rfid => is_valid_in(&self.cards, ids, identifier, now),
        };
        debug!(kind = %kind, id = %loggable(kind, identifier), valid, "Credential checked");
        valid
    }

    /// Empty one table and persist.
    pub fn clear(&mut self, kind: CredentialKind) {
        match kind {
            CredentialKind::Pin => self.pins.clear(),
            CredentialKind::Rfid => self.cards.clear(),
        }
        debug!(kind = %kind, "Credential table cleared");
        self.persist();
    }

    pub fn count(&self, kind: CredentialKind) -> usize {
        match kind {
            CredentialKind::Pin => self.pins.len(),
            CredentialKind::Rfid => self.cards.len(),
        }
    }

    /// Stored identifiers of one table, in table order.
    pub fn identifiers(&self, kind: CredentialKind) -> Vec<String> {
        match kind {
            CredentialKind::Pin => self.pins.iter().map(|(id, _)| id.as_str().to_string()).collect(),
            CredentialKind::Rfid => self.cards.iter().map(|(id, _)| id.as_str().to_string()).collect(),
        }
    }

    /// Replace both tables with a full snapshot from the controller.
    ///
    /// Both tables are cleared, then every listed identifier is added as an
    /// active credential without a window. Entries that fail are skipped and
    /// reported; they do not abort the rest. The result is persisted once.
    pub fn apply_snapshot(&mut self, pins: &[String], cards: &[String]) -> SnapshotReport {
        self.pins.clear();
        self.cards.clear();

        let ids = self.limits.identifiers;
        let mut report = SnapshotReport::default();
        let active = || CredentialEntry {
            active: true,
            window: None,
        };

        for raw in pins {
            match add_to(&mut self.pins, &ids, raw, active()) {
                Ok(_) => report.pins += 1,
                Err(error) => {
                    warn!(id = %loggable(CredentialKind::Pin, raw), error = %error, "Skipping PIN from config");
                    report.skipped.push(SkippedEntry {
                        kind: CredentialKind::Pin,
                        identifier: raw.clone(),
                        error,
                    });
                }
            }
        }

        for raw in cards {
            match add_to(&mut self.cards, &ids, raw, active()) {
                Ok(_) => report.cards += 1,
                Err(error) => {
                    warn!(id = %raw, error = %error, "Skipping card from config");
                    report.skipped.push(SkippedEntry {
                        kind: CredentialKind::Rfid,
                        identifier: raw.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            pins = report.pins,
            cards = report.cards,
            skipped = report.skipped.len(),
            "Applied credential snapshot"
        );
        self.persist();
        report
    }

    fn persist(&mut self) {
        let mut entries = BTreeMap::new();
        encode_table(&self.pins, &mut entries);
        encode_table(&self.cards, &mut entries);

        if let Err(e) = self.backend.store(&entries) {
            warn!(error = %e, "Failed to persist credentials; keeping in-memory state");
        }
    }
}
