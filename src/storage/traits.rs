//! Storage traits and error types
//!
//! This module defines the key/value interface shared by the detail cache
//! and the ledger, and the errors its backends can report.

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid key {0:?}: keys cannot contain tabs or line breaks")]
    InvalidKey(String),

    #[error("Invalid table name: {0}")]
    InvalidTable(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A durable string-to-string map
///
/// Writing an existing key replaces its value as a whole. Implementations
/// decide when a `put` reaches disk; `flush` forces any buffered writes out.
pub trait KeyValueStore: Send {
    /// Short backend name used in log lines
    fn backend_name(&self) -> &'static str;

    /// Returns every entry currently stored
    fn load(&self) -> StorageResult<Vec<(String, String)>>;

    /// Inserts or replaces an entry
    fn put(&mut self, key: &str, value: &str) -> StorageResult<()>;

    /// Forces buffered writes to durable storage
    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }
}
