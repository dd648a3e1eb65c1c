//! Flat key encoding of the credential tables.
//!
//! Each table is stored under its kind prefix, keyed by table index:
//!
//! ```text
//! pin.count      = "2"
//! pin.0.id       = "4821"
//! pin.0.active   = "true"
//! pin.1.id       = "1234"
//! pin.1.active   = "false"
//! rfid.count     = "0"
//! ```
//!
//! Validity windows are not written; the controller re-pushes them with the
//! next config sync.

use crate::table::{CredentialId, CredentialTable};
use pinelock_core::CredentialKind;
use std::collections::BTreeMap;

/// One entry read back from the store, not yet format-checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedEntry {
    pub index: usize,
    pub id: String,
    pub active: bool,
}

/// Why a persisted slot could not be read back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotIssue {
    pub index: usize,
    pub reason: String,
}

fn count_key(kind: CredentialKind) -> String {
    format!("{kind}.count")
}

fn id_key(kind: CredentialKind, index: usize) -> String {
    format!("{kind}.{index}.id")
}

fn active_key(kind: CredentialKind, index: usize) -> String {
    format!("{kind}.{index}.active")
}

/// Write one table into `out`.
pub fn encode_table<K: CredentialId>(table: &CredentialTable<K>, out: &mut BTreeMap<String, String>) {
    out.insert(count_key(K::KIND), table.len().to_string());
    for (index, (id, entry)) in table.iter().enumerate() {
        out.insert(id_key(K::KIND, index), id.as_str().to_string());
        out.insert(active_key(K::KIND, index), entry.active.to_string());
    }
}

/// Read one table's slots back.
///
/// A missing or unparseable count reads as an empty table. Slots with a
/// missing id or an unparseable active flag are reported and skipped. At
/// most `capacity` slots are read; a larger count is reported once.
pub fn decode_table(
    kind: CredentialKind,
    entries: &BTreeMap<String, String>,
    capacity: usize,
) -> (Vec<PersistedEntry>, Vec<SlotIssue>) {
    let mut decoded = Vec::new();
    let mut issues = Vec::new();

    let Some(raw_count) = entries.get(&count_key(kind)) else {
        return (decoded, issues);
    };

    let count = match raw_count.trim().parse::<usize>() {
        Ok(count) => count,
        Err(_) => {
            issues.push(SlotIssue {
                index: 0,
                reason: format!("unreadable count {raw_count:?}"),
            });
            return (decoded, issues);
        }
    };

    if count > capacity {
        issues.push(SlotIssue {
            index: capacity,
            reason: format!("count {count} exceeds capacity {capacity}, excess slots skipped"),
        });
    }

    for index in 0..count.min(capacity) {
        let Some(id) = entries.get(&id_key(kind, index)) else {
            issues.push(SlotIssue {
                index,
                reason: "missing id".to_string(),
            });
            continue;
        };

        let active = match entries.get(&active_key(kind, index)).map(String::as_str) {
            Some("true") => true,
            Some("false") => false,
            other => {
                issues.push(SlotIssue {
                    index,
                    reason: format!("unreadable active flag {other:?}"),
                });
                continue;
            }
        };

        decoded.push(PersistedEntry {
            index,
            id: id.clone(),
            active,
        });
    }

    (decoded, issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::CredentialEntry;
    use pinelock_core::PinCode;

    #[test]
    fn test_encode_layout() {
        let mut table = CredentialTable::with_capacity(4);
        table
            .upsert(
                PinCode::new("4821", 10).unwrap(),
                CredentialEntry {
                    active: true,
                    window: None,
                },
            )
            .unwrap();
        table
            .upsert(
                PinCode::new("1234", 10).unwrap(),
                CredentialEntry {
                    active: false,
                    window: None,
                },
            )
            .unwrap();

        let mut out = BTreeMap::new();
        encode_table(&table, &mut out);

        assert_eq!(out["pin.count"], "2");
        assert_eq!(out["pin.0.id"], "4821");
        assert_eq!(out["pin.0.active"], "true");
        assert_eq!(out["pin.1.id"], "1234");
        assert_eq!(out["pin.1.active"], "false");
    }

    #[test]
    fn test_decode_skips_broken_slots() {
        let entries = BTreeMap::from([
            ("rfid.count".to_string(), "3".to_string()),
            ("rfid.0.id".to_string(), "04AB12CD".to_string()),
            ("rfid.0.active".to_string(), "true".to_string()),
            ("rfid.1.active".to_string(), "true".to_string()),
            ("rfid.2.id".to_string(), "DEADBEEF".to_string()),
            ("rfid.2.active".to_string(), "maybe".to_string()),
        ]);

        let (decoded, issues) = decode_table(CredentialKind::Rfid, &entries, 50);

        assert_eq!(
            decoded,
            vec![PersistedEntry {
                index: 0,
                id: "04AB12CD".to_string(),
                active: true,
            }]
        );
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].index, 1);
        assert_eq!(issues[1].index, 2);
    }

    #[test]
    fn test_decode_missing_table_is_empty() {
        let (decoded, issues) = decode_table(CredentialKind::Pin, &BTreeMap::new(), 50);
        assert!(decoded.is_empty());
        assert!(issues.is_empty());
    }

    #[test]
    fn test_decode_bad_count() {
        let entries = BTreeMap::from([("pin.count".to_string(), "lots".to_string())]);
        let (decoded, issues) = decode_table(CredentialKind::Pin, &entries, 50);
        assert!(decoded.is_empty());
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn test_decode_oversized_count_is_bounded_by_capacity() {
        let entries = BTreeMap::from([
            ("pin.count".to_string(), usize::MAX.to_string()),
            ("pin.0.id".to_string(), "4821".to_string()),
            ("pin.0.active".to_string(), "true".to_string()),
        ]);

        let (decoded, issues) = decode_table(CredentialKind::Pin, &entries, 4);

        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].id, "4821");
        // one for the count, three for the empty slots 1..4
        assert_eq!(issues.len(), 4);
        assert_eq!(issues[0].index, 4);
    }
}
