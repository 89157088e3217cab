//! Known-id ledger
//!
//! The ledger is the set of listing ids that have already been seen. It only
//! ever grows: ids are committed once and never removed. Membership checks
//! run against an in-memory set replayed from the backing store at startup.

use crate::storage::{KeyValueStore, MemoryStore, StorageResult};
use std::collections::HashSet;

/// Result of splitting a batch of ids against the ledger
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    /// Ids not in the ledger, in first-seen batch order
    pub new_ids: Vec<String>,

    /// Ids already in the ledger, in batch order
    pub known_ids: Vec<String>,
}

impl Partition {
    pub fn is_new(&self, id: &str) -> bool {
        self.new_ids.iter().any(|n| n == id)
    }
}

pub struct Ledger {
    store: Box<dyn KeyValueStore>,
    known: HashSet<String>,
}

impl Ledger {
    /// Replays every id from `store`
    ///
    /// A store that cannot be read yields an empty ledger, which the monitor
    /// then treats as a first run.
    pub fn open(store: Box<dyn KeyValueStore>) -> Self {
        let known = match store.load() {
            Ok(entries) => entries.into_iter().map(|(id, _)| id).collect(),
            Err(e) => {
                tracing::error!(
                    "Error loading known listings from {} store: {}",
                    store.backend_name(),
                    e
                );
                HashSet::new()
            }
        };

        if known.is_empty() {
            tracing::info!("No previous listing data found, starting fresh");
        } else {
            tracing::info!("Loaded {} known listing ids", known.len());
        }

        Self { store, known }
    }

    /// An empty ledger that is never persisted
    pub fn in_memory() -> Self {
        Self::open(Box::new(MemoryStore::new()))
    }

    /// True when nothing has ever been committed
    pub fn is_first_run(&self) -> bool {
        self.known.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.known.contains(id)
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Splits `ids` into new and known without changing the ledger
    ///
    /// An id repeated within the batch is reported once.
    pub fn partition<'a, I>(&self, ids: I) -> Partition
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen = HashSet::new();
        let mut partition = Partition::default();

        for id in ids {
            if !seen.insert(id) {
                continue;
            }
            if self.known.contains(id) {
                partition.known_ids.push(id.to_string());
            } else {
                partition.new_ids.push(id.to_string());
            }
        }

        partition
    }

    /// Adds `ids` to the ledger and persists them
    ///
    /// The in-memory set is updated first so an id is never reported twice
    /// in one session, even if persisting fails. Returns how many ids were
    /// actually new.
    pub fn commit<S: AsRef<str>>(&mut self, ids: &[S]) -> StorageResult<usize> {
        let mut added = Vec::new();
        for id in ids {
            let id = id.as_ref();
            if self.known.insert(id.to_string()) {
                added.push(id);
            }
        }

        for id in &added {
            self.store.put(id, "")?;
        }
        self.store.flush()?;

        if !added.is_empty() {
            tracing::debug!("Committed {} ids, {} known", added.len(), self.known.len());
        }
        Ok(added.len())
    }

    /// Marks every id in `ids` as known without reporting any of them
    ///
    /// Used on a first run so the current inventory is not announced as new.
    pub fn baseline<S: AsRef<str>>(&mut self, ids: &[S]) -> StorageResult<usize> {
        let committed = self.commit(ids)?;
        tracing::info!(
            "First run - recorded {} existing listings without notifications",
            committed
        );
        Ok(committed)
    }
}
