//! String-keyed storage entries

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::DbPool;
use crate::{Error, Result};

/// Local key-value storage
///
/// Mirrors the three operations a browser's local storage offers.
pub trait KeyValueStore: Send {
    /// Read the value stored under `key`
    ///
    /// # Errors
    ///
    /// Returns error if the backing store cannot be read
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or replace the value stored under `key`
    ///
    /// # Errors
    ///
    /// Returns error if the backing store cannot be written
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove the entry for `key`; absent keys are not an error
    ///
    /// # Errors
    ///
    /// Returns error if the backing store cannot be written
    fn remove(&self, key: &str) -> Result<()>;
}

/// `SQLite`-backed store
#[derive(Clone)]
pub struct SqliteStore {
    db: DbPool,
}

impl SqliteStore {
    /// Create a new store backed by the given pool
    #[must_use]
    pub const fn new(db: DbPool) -> Self {
        Self { db }
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.db.get().map_err(|e| Error::Database(e.to_string()))?;
        let result = conn.query_row(
            "SELECT value FROM kv WHERE key = ?1",
            rusqlite::params![key],
            |row| row.get(0),
        );
        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::Database(e.to_string())),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.db.get().map_err(|e| Error::Database(e.to_string()))?;
        conn.execute(
            "INSERT INTO kv (key, value, updated_at)
             VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.db.get().map_err(|e| Error::Database(e.to_string()))?;
        conn.execute("DELETE FROM kv WHERE key = ?1", rusqlite::params![key])?;
        Ok(())
    }
}

/// In-process store
///
/// Clones share the same entries, so a caller can keep a handle and inspect
/// what another owner wrote.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Database("memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    #[test]
    fn sqlite_get_missing_key_is_none() {
        let store = SqliteStore::new(init_memory().unwrap());
        assert_eq!(store.get("absent").unwrap(), None);
    }

    #[test]
    fn sqlite_set_overwrites() {
        let store = SqliteStore::new(init_memory().unwrap());
        store.set("k", "first").unwrap();
        store.set("k", "second").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("second"));
    }

    #[test]
    fn sqlite_remove_deletes_entry() {
        let store = SqliteStore::new(init_memory().unwrap());
        store.set("k", "v").unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);

        // Removing again is fine
        store.remove("k").unwrap();
    }

    #[test]
    fn sqlite_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voicechat.db");

        SqliteStore::new(crate::db::init(&path).unwrap())
            .set("transcript", "[]")
            .unwrap();

        let reopened = SqliteStore::new(crate::db::init(&path).unwrap());
        assert_eq!(reopened.get("transcript").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn memory_store_clones_share_entries() {
        let store = MemoryStore::new();
        let handle = store.clone();

        store.set("k", "v").unwrap();
        assert_eq!(handle.get("k").unwrap().as_deref(), Some("v"));

        handle.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }
}
