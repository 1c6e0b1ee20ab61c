//! In-memory key/value store for tests and ephemeral clients.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::StorageResult;
use crate::KvStore;

/// A thread-safe in-memory key/value store.
///
/// # Example
///
/// ```
/// use jotsync_storage::{KvStore, MemoryStore};
///
/// let store = MemoryStore::new();
/// store.write("app/bucket/ccid", "42").unwrap();
/// assert_eq!(store.read("app/bucket/ccid").unwrap().as_deref(), Some("42"));
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all entries, for inspection in tests.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort();
        entries
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.data.write().clear();
    }
}

impl KvStore for MemoryStore {
    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        self.data.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        self.data.write().remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .data
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}
