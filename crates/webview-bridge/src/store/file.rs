//! JSON-file backed store
//!
//! The whole map is rewritten after every mutation: write to a sibling temp
//! file, then rename over the data file. A failed write rolls the in-memory
//! map back so memory and disk never disagree.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::{Entry, KvStore};
use crate::error::{BridgeError, Result};

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, Entry>,
}

impl FileStore {
    /// Open the data file, starting empty when it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|e| BridgeError::io(format!("reading {}", path.display()), e))?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw).map_err(|e| {
                    BridgeError::Storage(format!("corrupt data file {}: {}", path.display(), e))
                })?
            }
        } else {
            BTreeMap::new()
        };

        log::info!(
            "Opened data file {:?} with {} entr{}",
            path,
            entries.len(),
            if entries.len() == 1 { "y" } else { "ies" }
        );

        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| BridgeError::io(format!("creating {}", parent.display()), e))?;
        }

        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| BridgeError::Storage(e.to_string()))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, json)
            .map_err(|e| BridgeError::io(format!("writing {}", tmp.display()), e))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| BridgeError::io(format!("replacing {}", self.path.display()), e))?;

        Ok(())
    }

    fn restore(&mut self, key: &str, previous: Option<Entry>) {
        match previous {
            Some(entry) => {
                self.entries.insert(key.to_string(), entry);
            }
            None => {
                self.entries.remove(key);
            }
        }
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<Option<Entry>> {
        let previous = self.entries.insert(key.to_string(), Entry::new(value));
        if let Err(e) = self.persist() {
            self.restore(key, previous);
            return Err(e);
        }
        Ok(previous)
    }

    fn delete(&mut self, key: &str) -> Result<Option<Entry>> {
        let Some(previous) = self.entries.remove(key) else {
            return Ok(None);
        };
        if let Err(e) = self.persist() {
            self.restore(key, Some(previous));
            return Err(e);
        }
        Ok(Some(previous))
    }

    fn clear(&mut self) -> Result<()> {
        let previous = std::mem::take(&mut self.entries);
        if let Err(e) = self.persist() {
            self.entries = previous;
            return Err(e);
        }
        Ok(())
    }

    fn entries(&self) -> &BTreeMap<String, Entry> {
        &self.entries
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
