//! Persisted key-value store.
//!
//! Both the KNN table cache and the relation label cache sit on top of a plain
//! string-keyed store of JSON values. Writes are last-write-wins; nothing
//! needs enumeration or transactions.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, PoisonError, RwLock};

use crate::error::{AppError, AppResult};

/// String-keyed store of JSON values.
pub trait KvStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> AppResult<Option<Value>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: Value) -> AppResult<()>;
}

/// SQLite-backed store, one row per key.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the store at `db_path`.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Storage(format!("Failed to create store directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Storage(format!("Failed to open SQLite store: {}", e)))?;

        Self::init(conn)
    }

    fn init(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| AppError::Storage(format!("Failed to create kv table: {}", e)))?;

        tracing::debug!("Initialized SQLite key-value store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl KvStore for SqliteStore {
    fn get(&self, key: &str) -> AppResult<Option<Value>> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);

        let raw: Option<String> = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| AppError::Storage(format!("Failed to read key '{}': {}", key, e)))?;

        raw.map(|text| serde_json::from_str(&text).map_err(AppError::from))
            .transpose()
    }

    fn set(&self, key: &str, value: Value) -> AppResult<()> {
        let text = serde_json::to_string(&value)?;
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);

        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, text, Utc::now().to_rfc3339()],
        )
        .map_err(|e| AppError::Storage(format!("Failed to write key '{}': {}", key, e)))?;

        Ok(())
    }
}

/// Process-local store for tests and throwaway runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> AppResult<Option<Value>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> AppResult<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_sqlite_roundtrip_and_overwrite() {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::open(&temp.path().join("nested/store.sqlite")).unwrap();

        assert_eq!(store.get("missing").unwrap(), None);

        store.set("a|b", json!("part-of")).unwrap();
        assert_eq!(store.get("a|b").unwrap(), Some(json!("part-of")));

        store.set("a|b", json!("duplicate-of")).unwrap();
        assert_eq!(store.get("a|b").unwrap(), Some(json!("duplicate-of")));
    }

    #[test]
    fn test_sqlite_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("store.sqlite");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.set("knn:2:abc:3", json!({"ids": ["x", "y"]})).unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("knn:2:abc:3").unwrap(),
            Some(json!({"ids": ["x", "y"]}))
        );
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert!(store.is_empty());

        store.set("k", json!(1)).unwrap();
        store.set("k", json!(2)).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("k").unwrap(), Some(json!(2)));
    }
}
