use async_trait::async_trait;
use serde_json::Value;

use super::{for_each_account, get_path, remove_path, set_path};
use crate::error::MigrationResult;
use crate::helper::MigrationHelper;
use crate::keys::KeyDefinition;
use crate::migrator::{bounded_migrator, Migrator, MigratorBounds};

/// Timestamp of the last successful sync, per user.
pub const LAST_SYNC: KeyDefinition = KeyDefinition::new("sync", "lastSync");

const PROFILE_LAST_SYNC: &[&str] = &["profile", "lastSync"];

bounded_migrator!(
    /// Moves `profile.lastSync` out of each account blob to its own
    /// namespaced key. An explicit `null` is left where it is.
    LastSyncMigrator
);

#[async_trait]
impl Migrator for LastSyncMigrator {
    fn bounds(&self) -> MigratorBounds {
        self.bounds
    }

    async fn migrate(&self, helper: &MigrationHelper) -> MigrationResult<()> {
        for_each_account(helper, |entry| async move {
            let Some(mut account) = entry.account else {
                return Ok(());
            };
            let Some(last_sync) = get_path(&account, PROFILE_LAST_SYNC)
                .filter(|v| !v.is_null())
                .cloned()
            else {
                return Ok(());
            };
            helper
                .set_to_user(&entry.user_id, &LAST_SYNC, &last_sync)
                .await?;
            remove_path(&mut account, PROFILE_LAST_SYNC);
            helper.set(&entry.user_id, &account).await
        })
        .await
    }

    async fn rollback(&self, helper: &MigrationHelper) -> MigrationResult<()> {
        for_each_account(helper, |entry| async move {
            let Some(last_sync) = helper
                .get_from_user::<Value>(&entry.user_id, &LAST_SYNC)
                .await?
            else {
                return Ok(());
            };
            if let Some(mut account) = entry.account {
                set_path(&mut account, PROFILE_LAST_SYNC, last_sync);
                helper.set(&entry.user_id, &account).await?;
            }
            helper.remove_from_user(&entry.user_id, &LAST_SYNC).await
        })
        .await
    }
}
