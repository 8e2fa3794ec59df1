use std::collections::BTreeMap;

use super::{Entry, KvStore};
use crate::error::Result;

/// Entries kept for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<Option<Entry>> {
        Ok(self.entries.insert(key.to_string(), Entry::new(value)))
    }

    fn delete(&mut self, key: &str) -> Result<Option<Entry>> {
        Ok(self.entries.remove(key))
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }

    fn entries(&self) -> &BTreeMap<String, Entry> {
        &self.entries
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
