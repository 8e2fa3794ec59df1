//! Key/value store behind the `store_data` family of operations
//!
//! The bridge only talks to the [`KvStore`] trait; whether entries live in
//! memory or in a JSON file on disk is decided at startup.

mod file;
mod memory;

use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use file::FileStore;
pub use memory::MemoryStore;

/// A stored value and when it was last written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub value: String,
    pub timestamp: DateTime<Local>,
}

impl Entry {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            timestamp: Local::now(),
        }
    }
}

pub trait KvStore: Send {
    fn get(&self, key: &str) -> Option<&Entry>;

    /// Insert or overwrite. Returns the previous entry, if any.
    fn set(&mut self, key: &str, value: &str) -> Result<Option<Entry>>;

    fn delete(&mut self, key: &str) -> Result<Option<Entry>>;

    fn clear(&mut self) -> Result<()>;

    /// All entries, ordered by key.
    fn entries(&self) -> &BTreeMap<String, Entry>;

    fn len(&self) -> usize {
        self.entries().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short label for diagnostics ("memory" or the data file path).
    fn describe(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Shared behaviour every store must satisfy.
    fn exercise(store: &mut dyn KvStore) {
        assert!(store.is_empty());

        store.set("name", "Alice").unwrap();
        assert_eq!(store.get("name").unwrap().value, "Alice");

        let previous = store.set("name", "Bob").unwrap();
        assert_eq!(previous.unwrap().value, "Alice");
        assert_eq!(store.get("name").unwrap().value, "Bob");
        assert_eq!(store.len(), 1);

        store.set("city", "Paris").unwrap();
        let keys: Vec<_> = store.entries().keys().cloned().collect();
        assert_eq!(keys, vec!["city", "name"]);

        assert!(store.get("missing").is_none());
        assert!(store.delete("missing").unwrap().is_none());
        assert_eq!(store.delete("city").unwrap().unwrap().value, "Paris");

        store.clear().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_memory_store_contract() {
        exercise(&mut MemoryStore::new());
    }

    #[test]
    fn test_file_store_contract() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path().join("data.json")).unwrap();
        exercise(&mut store);
    }
}
