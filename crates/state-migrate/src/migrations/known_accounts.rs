use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::get_path;
use crate::error::MigrationResult;
use crate::helper::{MigrationHelper, AUTHENTICATED_ACCOUNTS_KEY};
use crate::keys::{ACCOUNT_ACCOUNTS, ACCOUNT_ACTIVE_ACCOUNT_ID};
use crate::migrator::{bounded_migrator, Migrator, MigratorBounds};

const ACTIVE_USER_ID_KEY: &str = "activeUserId";

/// Entry of the known-accounts map.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct KnownAccount {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    email_verified: bool,
}

impl KnownAccount {
    fn from_account(account: Option<&Value>) -> Self {
        let field = |name: &str| account.and_then(|a| get_path(a, &["profile", name]));
        Self {
            email: field("email")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            name: field("name").and_then(Value::as_str).map(str::to_string),
            email_verified: field("emailVerified")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }
}

bounded_migrator!(
    /// Replaces the flat `authenticatedAccounts` list with a namespaced map
    /// of account summaries, and `activeUserId` with
    /// [`ACCOUNT_ACTIVE_ACCOUNT_ID`].
    ///
    /// From the target version on, accounts are enumerated from the map.
    /// Rolling back rebuilds the list from the map's keys in sorted order.
    KnownAccountsMigrator
);

#[async_trait]
impl Migrator for KnownAccountsMigrator {
    fn bounds(&self) -> MigratorBounds {
        self.bounds
    }

    async fn migrate(&self, helper: &MigrationHelper) -> MigrationResult<()> {
        if helper.get::<Value>(AUTHENTICATED_ACCOUNTS_KEY).await?.is_some() {
            let known: BTreeMap<String, KnownAccount> = helper
                .get_accounts::<Value>()
                .await?
                .into_iter()
                .map(|entry| {
                    let summary = KnownAccount::from_account(entry.account.as_ref());
                    (entry.user_id, summary)
                })
                .collect();

            helper.set_to_global(&ACCOUNT_ACCOUNTS, &known).await?;
            helper.remove(AUTHENTICATED_ACCOUNTS_KEY).await?;
        }

        if let Some(active) = helper.get::<Value>(ACTIVE_USER_ID_KEY).await? {
            helper
                .set_to_global(&ACCOUNT_ACTIVE_ACCOUNT_ID, &active)
                .await?;
            helper.remove(ACTIVE_USER_ID_KEY).await?;
        }
        Ok(())
    }

    async fn rollback(&self, helper: &MigrationHelper) -> MigrationResult<()> {
        if let Some(known) = helper
            .get_from_global::<BTreeMap<String, Value>>(&ACCOUNT_ACCOUNTS)
            .await?
        {
            let ids: Vec<&String> = known.keys().collect();
            helper.set(AUTHENTICATED_ACCOUNTS_KEY, &ids).await?;
            helper.remove_from_global(&ACCOUNT_ACCOUNTS).await?;
        }

        if let Some(active) = helper
            .get_from_global::<Value>(&ACCOUNT_ACTIVE_ACCOUNT_ID)
            .await?
        {
            helper.set(ACTIVE_USER_ID_KEY, &active).await?;
            helper.remove_from_global(&ACCOUNT_ACTIVE_ACCOUNT_ID).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use state_store::MemoryStorage;
    use std::sync::Arc;

    fn migrator() -> KnownAccountsMigrator {
        KnownAccountsMigrator::from(MigratorBounds::new(14, 15).unwrap())
    }

    fn store() -> Value {
        json!({
            "authenticatedAccounts": ["u1", "u2"],
            "activeUserId": "u2",
            "u1": { "profile": { "email": "a@example.com", "name": "Ann", "emailVerified": true } },
            "u2": { "profile": { "email": "b@example.com" } },
        })
    }

    #[tokio::test]
    async fn builds_known_accounts_map() {
        let storage = Arc::new(MemoryStorage::from_json(store()));
        let helper = MigrationHelper::new(14, storage.clone());

        migrator().migrate(&helper).await.unwrap();

        let snapshot = storage.snapshot();
        assert_eq!(
            snapshot["global_account_accounts"],
            json!({
                "u1": { "email": "a@example.com", "name": "Ann", "emailVerified": true },
                "u2": { "email": "b@example.com", "emailVerified": false },
            })
        );
        assert_eq!(snapshot["global_account_activeAccountId"], json!("u2"));
        assert!(!snapshot.contains_key("authenticatedAccounts"));
        assert!(!snapshot.contains_key("activeUserId"));
        // account blobs are untouched
        assert_eq!(snapshot["u2"], json!({ "profile": { "email": "b@example.com" } }));
    }

    #[tokio::test]
    async fn accounts_enumerate_from_map_afterwards() {
        let storage = Arc::new(MemoryStorage::from_json(store()));
        migrator()
            .migrate(&MigrationHelper::new(14, storage.clone()))
            .await
            .unwrap();

        let helper = MigrationHelper::new(15, storage);
        assert_eq!(helper.get_known_user_ids().await.unwrap(), vec!["u1", "u2"]);
    }

    #[tokio::test]
    async fn nothing_to_move() {
        let storage = Arc::new(MemoryStorage::from_json(json!({ "global": {} })));
        migrator()
            .migrate(&MigrationHelper::new(14, storage.clone()))
            .await
            .unwrap();
        assert_eq!(storage.write_count(), 0);
    }

    #[tokio::test]
    async fn round_trip() {
        let original = store();
        let storage = Arc::new(MemoryStorage::from_json(original.clone()));
        let migrator = migrator();

        migrator
            .migrate(&MigrationHelper::new(14, storage.clone()))
            .await
            .unwrap();
        migrator
            .rollback(&MigrationHelper::new(15, storage.clone()))
            .await
            .unwrap();

        assert_eq!(storage.snapshot(), MemoryStorage::from_json(original).snapshot());
    }
}
