//! The migration context handed to every migrator.

use std::sync::Arc;

use futures::future::try_join_all;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use state_store::StorageService;

use crate::error::{MigrationError, MigrationResult};
use crate::keys::{self, KeyDefinition, ACCOUNT_ACCOUNTS};

/// Top-level key of the version marker (from [`TOP_LEVEL_VERSION_MARKER`] on).
pub const STATE_VERSION_KEY: &str = "stateVersion";

/// Flat key of the global settings blob.
pub const GLOBAL_KEY: &str = "global";

/// Flat key of the list of signed-in user ids (before [`KNOWN_ACCOUNTS_VERSION`]).
pub const AUTHENTICATED_ACCOUNTS_KEY: &str = "authenticatedAccounts";

/// First version whose marker lives at [`STATE_VERSION_KEY`] rather than
/// inside the global blob.
pub const TOP_LEVEL_VERSION_MARKER: u32 = 8;

/// First version whose accounts are enumerated from the namespaced
/// known-accounts map.
pub const KNOWN_ACCOUNTS_VERSION: u32 = 15;

/// Where the version marker is stored for a given schema version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionMarker {
    /// `global.stateVersion`
    Nested,
    /// `stateVersion`
    TopLevel,
}

impl VersionMarker {
    pub fn for_version(version: u32) -> Self {
        if version < TOP_LEVEL_VERSION_MARKER {
            Self::Nested
        } else {
            Self::TopLevel
        }
    }
}

/// One enumerated account. `account` is `None` when the id is known but its
/// blob was never written.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountEntry<T> {
    pub user_id: String,
    pub account: Option<T>,
}

/// Single point of access to persisted state during one migration pass.
///
/// `current_version` advances as the chain runs; only
/// [`persist_version`](Self::persist_version) (called from
/// `Migrator::update_version`) should change it.
pub struct MigrationHelper {
    pub current_version: u32,
    storage: Arc<dyn StorageService>,
}

impl MigrationHelper {
    pub fn new(current_version: u32, storage: Arc<dyn StorageService>) -> Self {
        Self {
            current_version,
            storage,
        }
    }

    /// The wrapped storage port.
    pub fn storage(&self) -> &Arc<dyn StorageService> {
        &self.storage
    }

    /// Read `key`. A missing key and a stored JSON `null` both read as `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> MigrationResult<Option<T>> {
        match self.storage.get(key).await? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value).map(Some).map_err(|e| {
                MigrationError::Deserialization {
                    key: key.to_string(),
                    reason: e.to_string(),
                }
            }),
        }
    }

    /// Write `value` under `key`.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> MigrationResult<()> {
        log::info!("Updating {key}");
        let value =
            serde_json::to_value(value).map_err(|e| MigrationError::Serialization(e.to_string()))?;
        self.storage.save(key, &value).await?;
        Ok(())
    }

    /// Delete `key`.
    pub async fn remove(&self, key: &str) -> MigrationResult<()> {
        log::info!("Removing {key}");
        self.storage.remove(key).await?;
        Ok(())
    }

    pub fn global_key(&self, def: &KeyDefinition) -> MigrationResult<String> {
        keys::global_key(self.current_version, def)
    }

    pub fn user_key(&self, user_id: &str, def: &KeyDefinition) -> MigrationResult<String> {
        keys::user_key(self.current_version, user_id, def)
    }

    pub async fn get_from_global<T: DeserializeOwned>(
        &self,
        def: &KeyDefinition,
    ) -> MigrationResult<Option<T>> {
        self.get(&self.global_key(def)?).await
    }

    pub async fn set_to_global<T: Serialize + ?Sized>(
        &self,
        def: &KeyDefinition,
        value: &T,
    ) -> MigrationResult<()> {
        self.set(&self.global_key(def)?, value).await
    }

    pub async fn remove_from_global(&self, def: &KeyDefinition) -> MigrationResult<()> {
        self.remove(&self.global_key(def)?).await
    }

    pub async fn get_from_user<T: DeserializeOwned>(
        &self,
        user_id: &str,
        def: &KeyDefinition,
    ) -> MigrationResult<Option<T>> {
        self.get(&self.user_key(user_id, def)?).await
    }

    pub async fn set_to_user<T: Serialize + ?Sized>(
        &self,
        user_id: &str,
        def: &KeyDefinition,
        value: &T,
    ) -> MigrationResult<()> {
        self.set(&self.user_key(user_id, def)?, value).await
    }

    pub async fn remove_from_user(&self, user_id: &str, def: &KeyDefinition) -> MigrationResult<()> {
        self.remove(&self.user_key(user_id, def)?).await
    }

    /// Ids of every account stored locally.
    ///
    /// Non-string entries in the legacy list are skipped.
    pub async fn get_known_user_ids(&self) -> MigrationResult<Vec<String>> {
        if self.current_version < KNOWN_ACCOUNTS_VERSION {
            let ids: Option<Vec<Value>> = self.get(AUTHENTICATED_ACCOUNTS_KEY).await?;
            Ok(ids
                .unwrap_or_default()
                .into_iter()
                .filter_map(|id| id.as_str().map(str::to_string))
                .collect())
        } else {
            let accounts: Option<Map<String, Value>> =
                self.get_from_global(&ACCOUNT_ACCOUNTS).await?;
            Ok(accounts.unwrap_or_default().into_iter().map(|(id, _)| id).collect())
        }
    }

    /// Every known account together with its blob, loaded concurrently.
    pub async fn get_accounts<T: DeserializeOwned>(&self) -> MigrationResult<Vec<AccountEntry<T>>> {
        let user_ids = self.get_known_user_ids().await?;
        try_join_all(user_ids.into_iter().map(|user_id| async move {
            let account = self.get::<T>(&user_id).await?;
            Ok::<_, MigrationError>(AccountEntry { user_id, account })
        }))
        .await
    }

    /// Set `current_version` and write the marker where `version` keeps it.
    pub async fn persist_version(&mut self, version: u32) -> MigrationResult<()> {
        self.current_version = version;
        match VersionMarker::for_version(version) {
            VersionMarker::TopLevel => self.set(STATE_VERSION_KEY, &version).await,
            VersionMarker::Nested => {
                let mut global: Map<String, Value> =
                    self.get(GLOBAL_KEY).await?.unwrap_or_default();
                global.insert(STATE_VERSION_KEY.to_string(), Value::from(version));
                self.set(GLOBAL_KEY, &global).await
            }
        }
    }
}
