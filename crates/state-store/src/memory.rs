use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::traits::{StorageError, StorageService};

/// In-memory storage backend.
///
/// All data lives in a `BTreeMap` and nothing touches disk. Ideal for tests
/// and for hosts that persist the whole map themselves.
///
/// Every `save` and `remove` is counted, which lets tests assert that a
/// pass performed no writes at all.
///
/// # Example
///
/// ```
/// use state_store::{MemoryStorage, StorageService};
/// use serde_json::json;
///
/// let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// rt.block_on(async {
///     let store = MemoryStorage::new();
///     store.save("global", &json!({ "theme": "dark" })).await.unwrap();
///     let value = store.get("global").await.unwrap().unwrap();
///     assert_eq!(value["theme"], "dark");
/// });
/// ```
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<BTreeMap<String, Value>>,
    writes: AtomicUsize,
}

impl MemoryStorage {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `entries`.
    pub fn with_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let state = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self {
            state: Mutex::new(state),
            writes: AtomicUsize::new(0),
        }
    }

    /// Create a store from a JSON object, one entry per top-level field.
    ///
    /// Non-object values produce an empty store.
    pub fn from_json(document: Value) -> Self {
        match document {
            Value::Object(map) => Self::with_entries(map),
            _ => Self::new(),
        }
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `save` and `remove` calls served so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Copy of the whole store.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, Value>>, StorageError> {
        self.state.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

#[async_trait]
impl StorageService for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.lock()?.insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.lock()?.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    async fn has(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.lock()?.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn save_get_remove() {
        let store = MemoryStorage::new();

        store.save("k1", &json!("hello")).await.unwrap();
        assert_eq!(store.get("k1").await.unwrap(), Some(json!("hello")));

        store.save("k1", &json!({ "a": 1 })).await.unwrap();
        assert_eq!(store.get("k1").await.unwrap(), Some(json!({ "a": 1 })));

        store.remove("k1").await.unwrap();
        assert_eq!(store.get("k1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn remove_missing_key_is_ok() {
        let store = MemoryStorage::new();
        store.remove("nope").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn keys_are_sorted() {
        let store = MemoryStorage::new();
        store.save("b", &json!(2)).await.unwrap();
        store.save("a", &json!(1)).await.unwrap();
        store.save("c", &json!(3)).await.unwrap();

        assert_eq!(store.keys().await.unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn has_reports_presence() {
        let store = MemoryStorage::new();
        assert!(!store.has("k").await.unwrap());
        store.save("k", &Value::Null).await.unwrap();
        assert!(store.has("k").await.unwrap());
    }

    #[tokio::test]
    async fn write_count_tracks_mutations_only() {
        let store = MemoryStorage::with_entries([("k", json!(1))]);
        assert_eq!(store.write_count(), 0);

        store.get("k").await.unwrap();
        store.keys().await.unwrap();
        assert_eq!(store.write_count(), 0);

        store.save("k", &json!(2)).await.unwrap();
        store.remove("k").await.unwrap();
        assert_eq!(store.write_count(), 2);
    }

    #[test]
    fn from_json_splits_top_level_fields() {
        let store = MemoryStorage::from_json(json!({
            "stateVersion": 12,
            "global": { "theme": "dark" },
        }));
        assert_eq!(store.len(), 2);
        assert_eq!(store.snapshot()["stateVersion"], json!(12));

        assert!(MemoryStorage::from_json(json!([1, 2])).is_empty());
    }
}
