//! Pure-Rust key-value backend using [`redb`](https://docs.rs/redb).
//!
//! No C dependencies. Useful where SQLite cannot be cross-compiled, or
//! when a fully Rust-native stack is wanted.
//!
//! Enable with `features = ["redb"]`.
//!
//! ```no_run
//! use state_store::{RedbStorage, StorageService};
//!
//! # async fn run() -> Result<(), state_store::StorageError> {
//! let store = RedbStorage::open("/tmp/client_state.redb")?;
//! store.save("global", &serde_json::json!({})).await?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};
use serde_json::Value;

use crate::traits::{StorageError, StorageService};

const STATE_TABLE: TableDefinition<&str, &str> = TableDefinition::new("client_state");

fn err(e: impl std::fmt::Display) -> StorageError {
    StorageError::Backend(format!("redb: {e}"))
}

/// A pure-Rust persistence backend built on [`redb`].
///
/// Every operation runs in its own redb transaction.
pub struct RedbStorage {
    db: Database,
}

impl RedbStorage {
    /// Open or create a redb database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        log::debug!("Opening redb state store at {}", path.as_ref().display());
        let db = Database::create(path).map_err(err)?;
        Self::ensure_tables(&db)?;
        Ok(Self { db })
    }

    /// Create an in-memory redb database (for testing).
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(err)?;
        Self::ensure_tables(&db)?;
        Ok(Self { db })
    }

    fn ensure_tables(db: &Database) -> Result<(), StorageError> {
        let txn = db.begin_write().map_err(err)?;
        txn.open_table(STATE_TABLE).map_err(err)?;
        txn.commit().map_err(err)?;
        Ok(())
    }
}

#[async_trait]
impl StorageService for RedbStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let txn = self.db.begin_read().map_err(err)?;
        let table = txn.open_table(STATE_TABLE).map_err(err)?;
        match table.get(key).map_err(err)? {
            Some(guard) => Ok(Some(serde_json::from_str(guard.value())?)),
            None => Ok(None),
        }
    }

    async fn save(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        let text = serde_json::to_string(value)?;
        let txn = self.db.begin_write().map_err(err)?;
        {
            let mut table = txn.open_table(STATE_TABLE).map_err(err)?;
            table.insert(key, text.as_str()).map_err(err)?;
        }
        txn.commit().map_err(err)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(err)?;
        {
            let mut table = txn.open_table(STATE_TABLE).map_err(err)?;
            table.remove(key).map_err(err)?;
        }
        txn.commit().map_err(err)?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        let txn = self.db.begin_read().map_err(err)?;
        let table = txn.open_table(STATE_TABLE).map_err(err)?;

        let mut keys = Vec::new();
        for item in table.iter().map_err(err)? {
            let (key_guard, _) = item.map_err(err)?;
            keys.push(key_guard.value().to_string());
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_store() -> RedbStorage {
        RedbStorage::open_in_memory().unwrap()
    }

    #[tokio::test]
    async fn save_get_remove() {
        let store = new_store();
        store.save("k1", &json!({ "x": 1 })).await.unwrap();
        assert_eq!(store.get("k1").await.unwrap(), Some(json!({ "x": 1 })));

        store.remove("k1").await.unwrap();
        assert_eq!(store.get("k1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn keys_sorted_by_redb() {
        let store = new_store();
        store.save("b", &json!(2)).await.unwrap();
        store.save("a", &json!(1)).await.unwrap();
        store.save("c", &json!(3)).await.unwrap();

        assert_eq!(store.keys().await.unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn has_uses_get() {
        let store = new_store();
        assert!(!store.has("k1").await.unwrap());
        store.save("k1", &json!("val")).await.unwrap();
        assert!(store.has("k1").await.unwrap());
    }

    #[tokio::test]
    async fn reopen_file_based() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.redb");

        {
            let store = RedbStorage::open(&path).unwrap();
            store.save("stateVersion", &json!(4)).await.unwrap();
        }

        let store = RedbStorage::open(&path).unwrap();
        assert_eq!(store.get("stateVersion").await.unwrap(), Some(json!(4)));
    }
}
