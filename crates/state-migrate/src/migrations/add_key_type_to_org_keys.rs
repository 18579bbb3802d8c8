use async_trait::async_trait;
use serde_json::{json, Value};

use super::{for_each_account, get_path, set_path};
use crate::error::MigrationResult;
use crate::helper::MigrationHelper;
use crate::migrator::{bounded_migrator, Migrator, MigratorBounds};

const ENCRYPTED_ORG_KEYS: &[&str] = &["keys", "organizationKeys", "encrypted"];

bounded_migrator!(
    /// Wraps every encrypted organization key in a tagged record:
    /// `"<key>"` becomes `{ "type": "organization", "key": "<key>" }`.
    ///
    /// Entries that are already tagged pass through unchanged.
    AddKeyTypeToOrgKeysMigrator
);

fn tag(value: &Value) -> Option<Value> {
    value
        .as_str()
        .map(|key| json!({ "type": "organization", "key": key }))
}

fn untag(value: &Value) -> Option<Value> {
    value
        .get("key")
        .and_then(Value::as_str)
        .map(|key| Value::String(key.to_string()))
}

impl AddKeyTypeToOrgKeysMigrator {
    /// Apply `convert` to every org key of every account, saving only the
    /// accounts where at least one entry changed.
    async fn rewrite_keys(
        helper: &MigrationHelper,
        convert: fn(&Value) -> Option<Value>,
    ) -> MigrationResult<()> {
        for_each_account(helper, |entry| async move {
            let Some(mut account) = entry.account else {
                return Ok(());
            };
            let Some(keys) = get_path(&account, ENCRYPTED_ORG_KEYS).and_then(Value::as_object)
            else {
                return Ok(());
            };

            let mut changed = false;
            let converted: serde_json::Map<String, Value> = keys
                .iter()
                .map(|(org_id, value)| match convert(value) {
                    Some(new) => {
                        changed = true;
                        (org_id.clone(), new)
                    }
                    None => (org_id.clone(), value.clone()),
                })
                .collect();

            if changed {
                set_path(&mut account, ENCRYPTED_ORG_KEYS, Value::Object(converted));
                helper.set(&entry.user_id, &account).await?;
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl Migrator for AddKeyTypeToOrgKeysMigrator {
    fn bounds(&self) -> MigratorBounds {
        self.bounds
    }

    async fn migrate(&self, helper: &MigrationHelper) -> MigrationResult<()> {
        Self::rewrite_keys(helper, tag).await
    }

    async fn rollback(&self, helper: &MigrationHelper) -> MigrationResult<()> {
        Self::rewrite_keys(helper, untag).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use state_store::MemoryStorage;
    use std::sync::Arc;

    fn migrator() -> AddKeyTypeToOrgKeysMigrator {
        AddKeyTypeToOrgKeysMigrator::from(MigratorBounds::new(4, 5).unwrap())
    }

    fn store() -> Value {
        json!({
            "authenticatedAccounts": ["u1", "u2"],
            "u1": {
                "keys": {
                    "organizationKeys": {
                        "encrypted": { "org-a": "2.abc|def", "org-b": "2.ghi|jkl" }
                    }
                }
            },
            "u2": { "keys": {} },
        })
    }

    #[tokio::test]
    async fn tags_plain_keys() {
        let storage = Arc::new(MemoryStorage::from_json(store()));
        let helper = MigrationHelper::new(4, storage.clone());

        migrator().migrate(&helper).await.unwrap();

        let snapshot = storage.snapshot();
        assert_eq!(
            snapshot["u1"]["keys"]["organizationKeys"]["encrypted"]["org-a"],
            json!({ "type": "organization", "key": "2.abc|def" })
        );
        assert_eq!(snapshot["u2"], json!({ "keys": {} }));
        assert_eq!(storage.write_count(), 1);
    }

    #[tokio::test]
    async fn already_tagged_keys_pass_through() {
        let storage = Arc::new(MemoryStorage::from_json(json!({
            "authenticatedAccounts": ["u1"],
            "u1": { "keys": { "organizationKeys": { "encrypted": {
                "org-a": { "type": "provider", "key": "k", "providerId": "p" }
            } } } },
        })));
        let helper = MigrationHelper::new(4, storage.clone());

        migrator().migrate(&helper).await.unwrap();
        assert_eq!(storage.write_count(), 0);
    }

    #[tokio::test]
    async fn round_trip() {
        let original = store();
        let storage = Arc::new(MemoryStorage::from_json(original.clone()));
        let helper = MigrationHelper::new(4, storage.clone());

        migrator().migrate(&helper).await.unwrap();
        migrator().rollback(&helper).await.unwrap();

        assert_eq!(storage.snapshot(), MemoryStorage::from_json(original).snapshot());
    }
}
