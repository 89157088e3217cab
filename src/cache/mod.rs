//! Detail cache
//!
//! Maps a listing id to the detail attributes extracted from its page so a
//! listing is fetched in detail at most once. Entries are replaced whole and
//! never expire here; the in-memory map is the source of truth for lookups
//! and the backing store only persists it.

use crate::model::DetailAttributes;
use crate::storage::{KeyValueStore, MemoryStore, StorageResult};
use std::collections::HashMap;

pub struct DetailCache {
    store: Box<dyn KeyValueStore>,
    entries: HashMap<String, DetailAttributes>,
}

impl DetailCache {
    /// Loads every readable entry from `store`
    ///
    /// Entries that fail to decode are skipped; a store that cannot be read
    /// at all yields an empty cache.
    pub fn open(store: Box<dyn KeyValueStore>) -> Self {
        let mut entries = HashMap::new();

        match store.load() {
            Ok(pairs) => {
                let mut undecodable = 0usize;
                for (id, raw) in pairs {
                    match serde_json::from_str::<DetailAttributes>(&raw) {
                        Ok(details) => {
                            entries.insert(id, details);
                        }
                        Err(e) => {
                            undecodable += 1;
                            tracing::debug!("Dropping cache entry {}: {}", id, e);
                        }
                    }
                }
                if undecodable > 0 {
                    tracing::warn!("Skipped {} undecodable cache entries", undecodable);
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Could not load detail cache from {} store: {}",
                    store.backend_name(),
                    e
                );
            }
        }

        tracing::info!("Loaded {} cached listing details", entries.len());

        Self { store, entries }
    }

    /// An empty cache that is never persisted
    pub fn in_memory() -> Self {
        Self::open(Box::new(MemoryStore::new()))
    }

    pub fn get(&self, id: &str) -> Option<&DetailAttributes> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Stores `details` for `id`, replacing any previous entry
    ///
    /// The in-memory entry is updated even when the write to the backing
    /// store fails; the store error is returned.
    pub fn insert(&mut self, id: &str, details: DetailAttributes) -> StorageResult<()> {
        let result = serde_json::to_string(&details)
            .map_err(Into::into)
            .and_then(|raw| self.store.put(id, &raw));

        self.entries.insert(id.to_string(), details);
        result
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pushes buffered entries to the backing store
    pub fn flush(&mut self) -> StorageResult<()> {
        self.store.flush()
    }
}
