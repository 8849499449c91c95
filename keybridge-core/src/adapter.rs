// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Storage Adapters
//!
//! Key-value collaborators behind the hub dispatcher. Adapters expose
//! single-key operations that may fail; the dispatcher owns batching and
//! per-key error isolation, so an adapter never sees more than one key at a
//! time.

use std::collections::HashMap;
use std::path::Path;

use rusqlite::{params, Connection};
use serde_json::Value;

use crate::error::AdapterError;

/// Result type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Single-key storage interface.
pub trait StorageAdapter: Send {
    /// Looks up one key. `Ok(None)` means the key is absent, which is not
    /// an error.
    fn get(&self, key: &str) -> AdapterResult<Option<Value>>;

    /// Writes one key.
    fn set(&mut self, key: &str, value: Value) -> AdapterResult<()>;

    /// Removes one key. Removing an absent key is not an error.
    fn delete(&mut self, key: &str) -> AdapterResult<()>;
}

impl StorageAdapter for Box<dyn StorageAdapter> {
    fn get(&self, key: &str) -> AdapterResult<Option<Value>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: Value) -> AdapterResult<()> {
        (**self).set(key, value)
    }

    fn delete(&mut self, key: &str) -> AdapterResult<()> {
        (**self).delete(key)
    }
}

/// Storage backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

/// Creates a storage adapter for the chosen backend.
///
/// For `Sqlite`, the database lives at `<data_dir>/keybridge.db`; the
/// directory defaults to the working directory.
pub fn create_adapter(
    backend: StorageBackend,
    data_dir: Option<&Path>,
) -> AdapterResult<Box<dyn StorageAdapter>> {
    match backend {
        StorageBackend::Memory => Ok(Box::new(MemoryAdapter::new())),
        StorageBackend::Sqlite => {
            let dir = data_dir.unwrap_or_else(|| Path::new("."));
            let adapter = SqliteAdapter::open(&dir.join("keybridge.db"))?;
            Ok(Box::new(adapter))
        }
    }
}

/// Volatile in-memory store.
#[derive(Default)]
pub struct MemoryAdapter {
    entries: HashMap<String, Value>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        MemoryAdapter::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl StorageAdapter for MemoryAdapter {
    fn get(&self, key: &str) -> AdapterResult<Option<Value>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> AdapterResult<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> AdapterResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// SQLite-backed store. Values are stored as JSON text.
pub struct SqliteAdapter {
    conn: Connection,
}

impl SqliteAdapter {
    /// Opens (or creates) the database at `path`.
    pub fn open(path: &Path) -> AdapterResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS entries (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
        )?;
        Ok(SqliteAdapter { conn })
    }
}

impl StorageAdapter for SqliteAdapter {
    fn get(&self, key: &str) -> AdapterResult<Option<Value>> {
        let mut stmt = self.conn.prepare("SELECT value FROM entries WHERE key = ?1")?;
        let mut rows = stmt.query([key])?;
        match rows.next()? {
            Some(row) => {
                let text: String = row.get(0)?;
                let value = serde_json::from_str(&text)
                    .map_err(|e| AdapterError::Serialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn set(&mut self, key: &str, value: Value) -> AdapterResult<()> {
        let text = serde_json::to_string(&value)
            .map_err(|e| AdapterError::Serialization(e.to_string()))?;
        self.conn.execute(
            "INSERT INTO entries (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, text, unix_now() as i64],
        )?;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> AdapterResult<()> {
        self.conn.execute("DELETE FROM entries WHERE key = ?1", [key])?;
        Ok(())
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_adapter_round_trip() {
        let mut adapter = MemoryAdapter::new();
        assert_eq!(adapter.get("k").unwrap(), None);

        adapter.set("k", json!("v")).unwrap();
        assert_eq!(adapter.get("k").unwrap(), Some(json!("v")));

        adapter.set("k", json!({"nested": true})).unwrap();
        assert_eq!(adapter.get("k").unwrap(), Some(json!({"nested": true})));

        adapter.delete("k").unwrap();
        assert_eq!(adapter.get("k").unwrap(), None);
        // Deleting again is still fine.
        adapter.delete("k").unwrap();
    }

    #[test]
    fn sqlite_adapter_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let mut adapter = SqliteAdapter::open(&path).unwrap();

        adapter.set("alpha", json!(1)).unwrap();
        adapter.set("beta", json!(["x", "y"])).unwrap();
        assert_eq!(adapter.get("alpha").unwrap(), Some(json!(1)));
        assert_eq!(adapter.get("missing").unwrap(), None);

        adapter.set("alpha", json!(2)).unwrap();
        assert_eq!(adapter.get("alpha").unwrap(), Some(json!(2)));

        adapter.delete("alpha").unwrap();
        assert_eq!(adapter.get("alpha").unwrap(), None);
    }

    #[test]
    fn sqlite_adapter_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");

        {
            let mut adapter = SqliteAdapter::open(&path).unwrap();
            adapter.set("durable", json!("yes")).unwrap();
        }

        let adapter = SqliteAdapter::open(&path).unwrap();
        assert_eq!(adapter.get("durable").unwrap(), Some(json!("yes")));
    }

    #[test]
    fn factory_builds_both_backends() {
        let dir = tempfile::tempdir().unwrap();
        let mut memory = create_adapter(StorageBackend::Memory, None).unwrap();
        let mut sqlite = create_adapter(StorageBackend::Sqlite, Some(dir.path())).unwrap();

        memory.set("k", json!("m")).unwrap();
        sqlite.set("k", json!("s")).unwrap();
        assert_eq!(memory.get("k").unwrap(), Some(json!("m")));
        assert_eq!(sqlite.get("k").unwrap(), Some(json!("s")));
    }
}
