use async_trait::async_trait;

use super::{for_each_account, remove_path};
use crate::error::{MigrationError, MigrationResult};
use crate::helper::MigrationHelper;
use crate::migrator::{bounded_migrator, Migrator, MigratorBounds};

const EVER_BEEN_UNLOCKED: &[&str] = &["profile", "everBeenUnlocked"];

bounded_migrator!(
    /// Drops the transient `profile.everBeenUnlocked` flag from every account.
    RemoveEverBeenUnlockedMigrator
);

#[async_trait]
impl Migrator for RemoveEverBeenUnlockedMigrator {
    fn bounds(&self) -> MigratorBounds {
        self.bounds
    }

    async fn migrate(&self, helper: &MigrationHelper) -> MigrationResult<()> {
        for_each_account(helper, |entry| async move {
            let Some(mut account) = entry.account else {
                return Ok(());
            };
            if remove_path(&mut account, EVER_BEEN_UNLOCKED).is_some() {
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

    fn migrator() -> RemoveEverBeenUnlockedMigrator {
        RemoveEverBeenUnlockedMigrator::from(MigratorBounds::new(3, 4).unwrap())
    }

    #[tokio::test]
    async fn removes_flag_from_every_account() {
        let storage = Arc::new(MemoryStorage::from_json(json!({
            "authenticatedAccounts": ["u1", "u2", "u3"],
            "u1": { "profile": { "everBeenUnlocked": true, "email": "a@example.com" } },
            "u2": { "profile": { "everBeenUnlocked": false } },
            "u3": { "profile": { "email": "c@example.com" } },
        })));
        let helper = MigrationHelper::new(3, storage.clone());

        migrator().migrate(&helper).await.unwrap();

        let snapshot = storage.snapshot();
        assert_eq!(snapshot["u1"], json!({ "profile": { "email": "a@example.com" } }));
        assert_eq!(snapshot["u2"], json!({ "profile": {} }));
        assert_eq!(snapshot["u3"], json!({ "profile": { "email": "c@example.com" } }));
        // u3 never had the flag
        assert_eq!(storage.write_count(), 2);
    }

    #[tokio::test]
    async fn missing_accounts_are_skipped() {
        let storage = Arc::new(MemoryStorage::from_json(json!({
            "authenticatedAccounts": ["ghost"],
        })));
        let helper = MigrationHelper::new(3, storage.clone());

        migrator().migrate(&helper).await.unwrap();
        assert_eq!(storage.write_count(), 0);
    }

    #[tokio::test]
    async fn rollback_is_irreversible() {
        let helper = MigrationHelper::new(4, Arc::new(MemoryStorage::new()));
        assert_eq!(
            migrator().rollback(&helper).await,
            Err(MigrationError::Irreversible)
        );
    }
}
