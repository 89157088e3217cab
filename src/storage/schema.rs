//! Database schema definitions
//!
//! Every logical store (detail cache, ledger) is one key/value table. The
//! table name is supplied by the caller and checked before it is spliced
//! into SQL.

use crate::storage::traits::{StorageError, StorageResult};
use rusqlite::Connection;

/// Returns the CREATE statement for a key/value table
pub fn table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);"
    )
}

/// Accepts `[A-Za-z_][A-Za-z0-9_]*`
pub fn validate_table_name(table: &str) -> StorageResult<()> {
    let mut chars = table.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);

    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StorageError::InvalidTable(table.to_string()))
    }
}

/// Creates the table if it does not exist yet
pub fn initialize_schema(conn: &Connection, table: &str) -> StorageResult<()> {
    validate_table_name(table)?;
    conn.execute_batch(&table_sql(table))?;
    Ok(())
}
