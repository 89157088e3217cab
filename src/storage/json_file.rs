//! JSON document storage backend
//!
//! The whole map lives in one JSON object on disk. Values that are
//! themselves JSON are embedded as objects, so a detail cache file reads as
//! `{ "<id>": { "city": ..., ... } }`. Writes are buffered until `flush`,
//! which replaces the file through a temporary sibling and a rename.

use crate::storage::traits::{KeyValueStore, StorageResult};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, Value>,
    dirty: bool,
}

impl JsonFileStore {
    /// Opens the document at `path`
    ///
    /// A missing file is an empty store. A file that cannot be parsed is
    /// logged and treated as empty too; it is overwritten on the next flush.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let entries = if path.exists() {
            let content = fs::read_to_string(path)?;
            match serde_json::from_str::<Map<String, Value>>(&content) {
                Ok(map) => map.into_iter().collect(),
                Err(e) => {
                    tracing::warn!(
                        "Ignoring unreadable JSON store {}: {}",
                        path.display(),
                        e
                    );
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries,
            dirty: false,
        })
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

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl KeyValueStore for JsonFileStore {
    fn backend_name(&self) -> &'static str {
        "json"
    }

    fn load(&self) -> StorageResult<Vec<(String, String)>> {
        Ok(self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), value_to_string(v)))
            .collect())
    }

    fn put(&mut self, key: &str, value: &str) -> StorageResult<()> {
        let value = match serde_json::from_str::<Value>(value) {
            Ok(v @ (Value::Object(_) | Value::Array(_))) => v,
            _ => Value::String(value.to_string()),
        };
        self.entries.insert(key.to_string(), value);
        self.dirty = true;
        Ok(())
    }

    fn flush(&mut self) -> StorageResult<()> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp = self.temp_path();
        let data = serde_json::to_vec_pretty(&self.entries)?;
        fs::write(&temp, data)?;
        fs::rename(&temp, &self.path)?;
        self.dirty = false;

        tracing::debug!(
            "Wrote {} entries to {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }
}
