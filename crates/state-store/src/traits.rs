use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Error returned by any [`StorageService`] backend.
///
/// Backend errors are flattened to strings so the port can be used as a
/// trait object regardless of which backend sits behind it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    /// The underlying database reported an error.
    #[error("storage backend error: {0}")]
    Backend(String),
    /// A stored value could not be encoded or decoded as JSON.
    #[error("storage serialization error: {0}")]
    Serialization(String),
    /// A backend lock was poisoned by a panicking writer.
    #[error("storage lock poisoned")]
    LockPoisoned,
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// The key-value port every piece of local client state goes through.
///
/// Keys are flat strings and values are opaque JSON documents. The store
/// does not interpret the documents: shape changes between application
/// versions are the business of `state-migrate`.
///
/// All methods take `&self` so a single store can be shared (behind an
/// `Arc`) by concurrent per-account tasks. Backends serialize access
/// internally.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Retrieve the value stored under `key`, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn save(&self, key: &str, value: &Value) -> Result<(), StorageError>;

    /// Delete `key`. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// List every stored key in ascending order.
    async fn keys(&self) -> Result<Vec<String>, StorageError>;

    /// Check if a key exists.
    async fn has(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.get(key).await?.is_some())
    }
}
