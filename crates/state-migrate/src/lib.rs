//! # state-migrate
//!
//! Versioned, bidirectional schema migrations for the flat key-value state
//! kept in a [`state_store::StorageService`].
//!
//! Every start of the host application calls [`migrate`] before anything
//! else reads the store. It works out which schema version the data is at
//! and runs every step between that version and [`CURRENT_VERSION`].
//!
//! ## How It Works
//!
//! 1. The version marker is read from `stateVersion` (or, for stores older
//!    than v8, from `global.stateVersion`). No marker means a fresh
//!    install: the current version is written and nothing else happens.
//! 2. A [`MigrationBuilder`] chain is assembled. Each entry is a
//!    [`Migrator`] bounded by exactly two versions, and the builder refuses
//!    gaps or overlaps before any data is touched.
//! 3. Entries run in order. An entry only fires when the store sits at its
//!    start version, so re-running a finished pass performs no writes.
//! 4. Each step persists the new version before the next one starts: an
//!    interrupted pass resumes where it stopped.
//!
//! ## Key Concepts
//!
//! - **Versioned addressing**: from v9 on, state is stored under
//!   `global_<state>_<key>` and `user_<userId>_<state>_<key>` keys built
//!   from a [`KeyDefinition`]. Before that, only flat keys exist.
//! - **Minimum version**: stores older than [`MIN_VERSION`] fail with
//!   [`MigrationError::TooOld`] and are left untouched.
//! - **Rollback**: reversible steps implement their inverse;
//!   [`rollback_to`] walks the chain back down.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use state_migrate::{migrate, CURRENT_VERSION};
//! use state_store::{MemoryStorage, StorageService};
//!
//! let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! rt.block_on(async {
//!     let store = Arc::new(MemoryStorage::from_json(json!({
//!         "stateVersion": 11,
//!         "authenticatedAccounts": ["u1"],
//!         "u1": { "settings": { "disableBadgeCounter": true } },
//!     })));
//!     migrate(store.clone()).await.unwrap();
//!
//!     assert_eq!(store.get("stateVersion").await.unwrap(), Some(json!(CURRENT_VERSION)));
//!     assert_eq!(
//!         store.get("user_u1_badgeSettings_enableBadgeCounter").await.unwrap(),
//!         Some(json!(false))
//!     );
//! });
//! ```

mod builder;
mod error;
mod helper;
mod keys;
mod migrate;
pub mod migrations;
mod migrator;
mod min_version;

pub use builder::{factory, ChainEntry, MigrationBuilder, MigratorFactory};
pub use error::{MigrationError, MigrationResult};
pub use helper::{
    AccountEntry, MigrationHelper, VersionMarker, AUTHENTICATED_ACCOUNTS_KEY, GLOBAL_KEY,
    KNOWN_ACCOUNTS_VERSION, STATE_VERSION_KEY, TOP_LEVEL_VERSION_MARKER,
};
pub use keys::{
    global_key, user_key, KeyDefinition, StateDefinition, ACCOUNT_ACCOUNTS,
    ACCOUNT_ACTIVE_ACCOUNT_ID, NAMESPACED_KEYS_VERSION,
};
pub use migrate::{
    create_migration_builder, current_version, migrate, needs_migration, rollback_to,
    CURRENT_VERSION,
};
pub use migrator::{Direction, Migrator, MigratorBounds};
pub use min_version::{MinVersionMigrator, MIN_VERSION};
