//! Append-only line log storage backend
//!
//! Each `put` appends one line and syncs it before returning:
//!
//! - `<key>` for an entry with an empty value (a plain id list, one per line)
//! - `<key>\t<json string>` otherwise
//!
//! Opening the log replays it in order, so later lines replace earlier ones.
//! Blank or malformed lines are skipped.

use crate::storage::traits::{KeyValueStore, StorageError, StorageResult};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct AppendLogStore {
    path: PathBuf,
    entries: HashMap<String, String>,
}

impl AppendLogStore {
    pub fn open(path: &Path) -> StorageResult<Self> {
        let mut entries = HashMap::new();

        if path.exists() {
            // Invalid UTF-8 is replaced rather than rejected so one bad byte
            // does not discard the whole log
            let raw = fs::read(path)?;
            let content = String::from_utf8_lossy(&raw);
            let mut skipped = 0usize;

            for line in content.lines() {
                match parse_line(line) {
                    Some((key, value)) => {
                        entries.insert(key, value);
                    }
                    None if line.trim().is_empty() => {}
                    None => skipped += 1,
                }
            }

            if skipped > 0 {
                tracing::warn!(
                    "Skipped {} malformed lines in {}",
                    skipped,
                    path.display()
                );
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, line: &str) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_data()?;
        Ok(())
    }
}

fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim_end_matches('\r');
    match line.split_once('\t') {
        Some((key, encoded)) => {
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            let value = serde_json::from_str::<String>(encoded).ok()?;
            Some((key.to_string(), value))
        }
        None => {
            let key = line.trim();
            if key.is_empty() {
                None
            } else {
                Some((key.to_string(), String::new()))
            }
        }
    }
}

fn format_line(key: &str, value: &str) -> StorageResult<String> {
    if key.trim().is_empty() || key.contains(|c: char| matches!(c, '\t' | '\n' | '\r')) {
        return Err(StorageError::InvalidKey(key.to_string()));
    }

    if value.is_empty() {
        Ok(key.to_string())
    } else {
        Ok(format!("{}\t{}", key, serde_json::to_string(value)?))
    }
}

impl KeyValueStore for AppendLogStore {
    fn backend_name(&self) -> &'static str {
        "log"
    }

    fn load(&self) -> StorageResult<Vec<(String, String)>> {
        Ok(self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn put(&mut self, key: &str, value: &str) -> StorageResult<()> {
        let line = format_line(key, value)?;
        self.append(&line)?;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::snapshot;
    use tempfile::tempdir;

    #[test]
    fn test_reads_plain_id_list() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("known_cars.txt");
        fs::write(&path, "100\n200\n\n300\n").unwrap();

        let store = AppendLogStore::open(&path).unwrap();
        assert_eq!(snapshot(&store).len(), 3);
        assert_eq!(snapshot(&store).get("200").cloned(), Some(String::new()));
    }

    #[test]
    fn test_put_is_durable_immediately() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.log");

        let mut store = AppendLogStore::open(&path).unwrap();
        store.put("1", "").unwrap();
        store.put("2", "").unwrap();

        // No flush: the reopened log already holds both ids
        let reopened = AppendLogStore::open(&path).unwrap();
        assert_eq!(snapshot(&reopened).len(), 2);
        assert_eq!(fs::read_to_string(&path).unwrap(), "1\n2\n");
    }

    #[test]
    fn test_later_lines_replace_earlier() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.log");

        let mut store = AppendLogStore::open(&path).unwrap();
        store.put("9", "first\nline").unwrap();
        store.put("9", "second").unwrap();

        let reopened = AppendLogStore::open(&path).unwrap();
        assert_eq!(snapshot(&reopened).len(), 1);
        assert_eq!(snapshot(&reopened).get("9").cloned(), Some("second".to_string()));
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.log");
        fs::write(&path, "1\t\"ok\"\n2\t{broken\n3\n").unwrap();

        let store = AppendLogStore::open(&path).unwrap();
        assert_eq!(snapshot(&store).get("1").cloned(), Some("ok".to_string()));
        assert_eq!(snapshot(&store).get("2").cloned(), None);
        assert_eq!(snapshot(&store).get("3").cloned(), Some(String::new()));
    }

    #[test]
    fn test_rejects_keys_with_separators() {
        let dir = tempdir().unwrap();
        let mut store = AppendLogStore::open(&dir.path().join("x.log")).unwrap();

        assert!(matches!(
            store.put("a\tb", ""),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            store.put("a\nb", ""),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(snapshot(&store).is_empty());
    }
}
