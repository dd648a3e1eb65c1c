//! Key/value persistence capability and its backends.
//!
//! The credential store never talks to flash or disk directly. It hands a
//! flat string map to a [`KeyValueStore`] and reads one back on startup.

use crate::error::{StorageError, StorageResult};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Flat string map surviving power loss.
pub trait KeyValueStore: Send {
    /// Read the last stored map. A store that has never been written reads
    /// as empty.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be read or decoded.
    fn load(&self) -> StorageResult<BTreeMap<String, String>>;

    /// Replace the stored map.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be written.
    fn store(&mut self, entries: &BTreeMap<String, String>) -> StorageResult<()>;
}

/// In-memory backend.
///
/// Clones share the same map, so dropping a store and building a new one
/// from a clone behaves like a power cycle.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValue {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryKeyValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a single raw key; used to simulate corrupted flash.
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.into(), value.into());
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl KeyValueStore for MemoryKeyValue {
    fn load(&self) -> StorageResult<BTreeMap<String, String>> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .map_err(|_| StorageError::Backend("memory store poisoned".to_string()))
    }

    fn store(&mut self, entries: &BTreeMap<String, String>) -> StorageResult<()> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| StorageError::Backend("memory store poisoned".to_string()))?;
        *guard = entries.clone();
        Ok(())
    }
}

/// JSON file backend.
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so a crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileKeyValue {
    path: PathBuf,
}

impl FileKeyValue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl KeyValueStore for FileKeyValue {
    fn load(&self) -> StorageResult<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No credential snapshot on disk");
                Ok(BTreeMap::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn store(&mut self, entries: &BTreeMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.temp_path();
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
