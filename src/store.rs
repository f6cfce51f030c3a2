//! Global cache tier storage.
//!
//! The global tier is a flat `cache key -> content hash` table that lives
//! outside any single working directory. It is reached through the
//! [`GlobalCacheStore`] trait so tests can swap the on-disk JSON table for an
//! in-memory map.
//!
//! Concurrent writers to the same key are last-writer-wins. There is no
//! cross-process locking: a lost update only costs a future recomputation.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Storage for the cross-run cache tier
pub trait GlobalCacheStore: Send + Sync {
    /// Content hash recorded for `key`, if any
    fn get(&self, key: &str) -> Option<String>;

    /// Records `hash` for `key`, replacing any previous value
    fn put(&self, key: &str, hash: &str) -> Result<()>;

    /// Forgets every entry
    fn clear(&self) -> Result<()>;
}

/// In-memory global store
#[derive(Debug, Default)]
pub struct MemoryGlobalCacheStore {
    entries: DashMap<String, String>,
}

impl MemoryGlobalCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl GlobalCacheStore for MemoryGlobalCacheStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn put(&self, key: &str, hash: &str) -> Result<()> {
        self.entries.insert(key.to_string(), hash.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}

/// On-disk layout of the global store
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreTable {
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

/// Global store backed by a JSON `key -> hash` table
#[derive(Debug)]
pub struct FileGlobalCacheStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileGlobalCacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> BTreeMap<String, String> {
        match fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<StoreTable>(&content) {
                Ok(table) => table.entries,
                Err(e) => {
                    log::warn!(
                        "Ignoring malformed global cache store {}: {}",
                        self.path.display(),
                        e
                    );
                    BTreeMap::new()
                }
            },
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!(
                        "Cannot read global cache store {}: {}",
                        self.path.display(),
                        e
                    );
                }
                BTreeMap::new()
            }
        }
    }

    fn write_entries(&self, entries: BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&StoreTable { entries })?;
        write_atomically(&self.path, content.as_bytes())
    }
}

impl GlobalCacheStore for FileGlobalCacheStore {
    fn get(&self, key: &str) -> Option<String> {
        self.read_entries().remove(key)
    }

    fn put(&self, key: &str, hash: &str) -> Result<()> {
        let _guard = self.write_lock.lock().map_err(|_| Error::Cache {
            message: "global cache store lock poisoned".to_string(),
        })?;
        let mut entries = self.read_entries();
        entries.insert(key.to_string(), hash.to_string());
        self.write_entries(entries)
    }

    fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().map_err(|_| Error::Cache {
            message: "global cache store lock poisoned".to_string(),
        })?;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Writes `bytes` to a sibling temp file, then renames it over `path`
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| Error::Cache {
            message: format!("not a file path: {}", path.display()),
        })?;
    let temp = path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()));

    fs::write(&temp, bytes)?;
    if let Err(e) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryGlobalCacheStore::new();
        assert!(store.is_empty());
        assert_eq!(store.get("k"), None);

        store.put("k", "h1").unwrap();
        store.put("k", "h2").unwrap();
        assert_eq!(store.get("k").as_deref(), Some("h2"));
        assert_eq!(store.len(), 1);

        store.clear().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/global-cache.json");

        let store = FileGlobalCacheStore::new(&path);
        assert_eq!(store.get("a"), None);
        store.put("a", "1").unwrap();
        store.put("b", "2").unwrap();

        let reopened = FileGlobalCacheStore::new(&path);
        assert_eq!(reopened.get("a").as_deref(), Some("1"));
        assert_eq!(reopened.get("b").as_deref(), Some("2"));

        reopened.clear().unwrap();
        assert!(!path.exists());
        assert_eq!(store.get("a"), None);
        // Clearing twice is fine
        reopened.clear().unwrap();
    }

    #[test]
    fn test_file_store_writes_json_table() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("global-cache.json");
        let store = FileGlobalCacheStore::new(&path);
        store.put("key", "hash").unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["entries"]["key"], "hash");
    }

    #[test]
    fn test_malformed_file_store_reads_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("global-cache.json");
        fs::write(&path, "key=hash\n").unwrap();

        let store = FileGlobalCacheStore::new(&path);
        assert_eq!(store.get("key"), None);
        // The next write replaces the unreadable table
        store.put("key", "hash").unwrap();
        assert_eq!(store.get("key").as_deref(), Some("hash"));
    }

    #[test]
    fn test_write_atomically_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("marker");
        write_atomically(&path, b"one").unwrap();
        write_atomically(&path, b"two").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
        let leftovers: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
