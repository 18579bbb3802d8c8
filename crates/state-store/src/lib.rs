//! # state-store
//!
//! The flat key-value port that a client application keeps its local state
//! in: accounts, settings, cached vault data and key material, each stored
//! as a JSON document under a string key.
//!
//! ## Quick Start
//!
//! ```
//! use state_store::{MemoryStorage, StorageService};
//! use serde_json::json;
//!
//! let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! rt.block_on(async {
//!     let store = MemoryStorage::new();
//!     store.save("authenticatedAccounts", &json!(["u1"])).await.unwrap();
//!     let ids = store.get("authenticatedAccounts").await.unwrap();
//!     assert_eq!(ids, Some(json!(["u1"])));
//! });
//! ```
//!
//! ## Backends
//!
//! | Backend | Feature flag | Use case |
//! |---------|-------------|----------|
//! | [`MemoryStorage`] | *(always available)* | Testing, hosts that persist the map themselves |
//! | `SqliteStorage` | `sqlite` | Desktop and mobile clients |
//! | `RedbStorage` | `redb` | Pure-Rust targets without C deps |

mod memory;
#[cfg(feature = "redb")]
mod redb;
#[cfg(feature = "sqlite")]
mod sqlite;
mod traits;

pub use memory::MemoryStorage;
#[cfg(feature = "redb")]
pub use redb::RedbStorage;
#[cfg(feature = "sqlite")]
pub use sqlite::{JournalMode, SqliteConfig, SqliteStorage};
pub use traits::{StorageError, StorageService};
