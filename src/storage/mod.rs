//! Storage module for the monitor's durable state
//!
//! The detail cache and the ledger both sit on the `KeyValueStore` trait.
//! Backends:
//! - `MemoryStore`: tests and fallback
//! - `JsonFileStore`: one JSON document, rewritten on flush
//! - `AppendLogStore`: append-only line log, synced on every write
//! - `SqliteStore`: one SQLite table per store

mod append_log;
mod json_file;
mod memory;
mod schema;
mod sqlite;
mod traits;

pub use append_log::AppendLogStore;
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{KeyValueStore, StorageError, StorageResult};

use crate::config::StorageBackend;
use std::path::Path;

/// Table used for the detail cache in SQLite databases
pub const CACHE_TABLE: &str = "detail_cache";

/// Table used for the ledger in SQLite databases
pub const LEDGER_TABLE: &str = "ledger";

/// Opens a store with the requested backend
///
/// `table` is only used by the SQLite backend.
pub fn open_store(
    backend: StorageBackend,
    path: &Path,
    table: &str,
) -> StorageResult<Box<dyn KeyValueStore>> {
    let store: Box<dyn KeyValueStore> = match backend {
        StorageBackend::Json => Box::new(JsonFileStore::open(path)?),
        StorageBackend::Log => Box::new(AppendLogStore::open(path)?),
        StorageBackend::Sqlite => Box::new(SqliteStore::open(path, table)?),
    };
    Ok(store)
}

/// Opens a store, falling back to an empty in-memory store on failure
///
/// An unreadable store must never stop the monitor; it starts cold instead.
pub fn open_store_or_memory(
    backend: StorageBackend,
    path: &Path,
    table: &str,
) -> Box<dyn KeyValueStore> {
    match open_store(backend, path, table) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(
                "Could not open {:?} store at {}: {}; continuing in memory",
                backend,
                path.display(),
                e
            );
            Box::new(MemoryStore::new())
        }
    }
}

/// Everything a store holds, keyed for lookups in tests
#[cfg(test)]
pub(crate) fn snapshot(store: &dyn KeyValueStore) -> std::collections::HashMap<String, String> {
    store
        .load()
        .map(|entries| entries.into_iter().collect())
        .unwrap_or_default()
}
