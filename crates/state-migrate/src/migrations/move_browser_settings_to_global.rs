use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{for_each_account, remove_path};
use crate::error::{MigrationError, MigrationResult};
use crate::helper::{MigrationHelper, GLOBAL_KEY};
use crate::migrator::{bounded_migrator, Migrator, MigratorBounds};

const NEVER_DOMAINS: &str = "neverDomains";
const ACCOUNT_NEVER_DOMAINS: &[&str] = &["settings", "neverDomains"];

bounded_migrator!(
    /// Merges every account's `settings.neverDomains` into a single
    /// `global.neverDomains` map.
    ///
    /// The global value is written before any account is touched, so a
    /// failure part way never loses a domain.
    MoveBrowserSettingsToGlobalMigrator
);

#[async_trait]
impl Migrator for MoveBrowserSettingsToGlobalMigrator {
    fn bounds(&self) -> MigratorBounds {
        self.bounds
    }

    async fn migrate(&self, helper: &MigrationHelper) -> MigrationResult<()> {
        let accounts = helper.get_accounts::<Value>().await?;

        let mut merged = Map::new();
        let mut found = false;
        for entry in &accounts {
            let Some(domains) = entry
                .account
                .as_ref()
                .and_then(|a| a.get("settings"))
                .and_then(|s| s.get(NEVER_DOMAINS))
            else {
                continue;
            };
            found = true;
            if let Some(domains) = domains.as_object() {
                merged.extend(domains.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        if !found {
            return Ok(());
        }

        let mut global: Map<String, Value> = helper.get(GLOBAL_KEY).await?.unwrap_or_default();
        if let Some(Value::Object(existing)) = global.get(NEVER_DOMAINS) {
            for (domain, value) in existing {
                merged.entry(domain.clone()).or_insert_with(|| value.clone());
            }
        }
        global.insert(NEVER_DOMAINS.to_string(), Value::Object(merged));
        helper.set(GLOBAL_KEY, &global).await?;

        for_each_account(helper, |entry| async move {
            let Some(mut account) = entry.account else {
                return Ok(());
            };
            if remove_path(&mut account, ACCOUNT_NEVER_DOMAINS).is_some() {
                helper.set(&entry.user_id, &account).await?;
            }
            Ok(())
        })
        .await
    }

    async fn rollback(&self, _helper: &MigrationHelper) -> MigrationResult<()> {
        Err(MigrationError::Irreversible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use state_store::MemoryStorage;
    use std::sync::Arc;

    fn migrator() -> MoveBrowserSettingsToGlobalMigrator {
        MoveBrowserSettingsToGlobalMigrator::from(MigratorBounds::new(8, 9).unwrap())
    }

    #[tokio::test]
    async fn unions_domains_from_all_accounts() {
        let storage = Arc::new(MemoryStorage::from_json(json!({
            "global": { "theme": "dark" },
            "authenticatedAccounts": ["u1", "u2", "u3"],
            "u1": { "settings": { "neverDomains": { "a.com": null, "b.com": null } } },
            "u2": { "settings": { "neverDomains": { "b.com": null, "c.com": null }, "x": 1 } },
            "u3": { "settings": { "x": 2 } },
        })));
        let helper = MigrationHelper::new(8, storage.clone());

        migrator().migrate(&helper).await.unwrap();

        let snapshot = storage.snapshot();
        assert_eq!(
            snapshot["global"],
            json!({
                "theme": "dark",
                "neverDomains": { "a.com": null, "b.com": null, "c.com": null },
            })
        );
        assert_eq!(snapshot["u1"], json!({ "settings": {} }));
        assert_eq!(snapshot["u2"], json!({ "settings": { "x": 1 } }));
        assert_eq!(snapshot["u3"], json!({ "settings": { "x": 2 } }));
        // global + u1 + u2
        assert_eq!(storage.write_count(), 3);
    }

    #[tokio::test]
    async fn keeps_existing_global_domains() {
        let storage = Arc::new(MemoryStorage::from_json(json!({
            "global": { "neverDomains": { "old.com": null } },
            "authenticatedAccounts": ["u1"],
            "u1": { "settings": { "neverDomains": { "new.com": null } } },
        })));
        let helper = MigrationHelper::new(8, storage.clone());

        migrator().migrate(&helper).await.unwrap();

        assert_eq!(
            storage.snapshot()["global"]["neverDomains"],
            json!({ "old.com": null, "new.com": null })
        );
    }

    #[tokio::test]
    async fn no_domains_anywhere_writes_nothing() {
        let storage = Arc::new(MemoryStorage::from_json(json!({
            "global": {},
            "authenticatedAccounts": ["u1"],
            "u1": { "settings": {} },
        })));
        let helper = MigrationHelper::new(8, storage.clone());

        migrator().migrate(&helper).await.unwrap();
        assert_eq!(storage.write_count(), 0);
    }
}
