use async_trait::async_trait;

use super::{for_each_account, remove_path};
use crate::error::{MigrationError, MigrationResult};
use crate::helper::MigrationHelper;
use crate::migrator::{bounded_migrator, Migrator, MigratorBounds};

const LEGACY_ETM_KEY: &[&str] = &["keys", "legacyEtmKey"];

bounded_migrator!(
    /// Deletes the derived `keys.legacyEtmKey`; it is recomputed on unlock.
    RemoveLegacyEtmKeyMigrator
);

#[async_trait]
impl Migrator for RemoveLegacyEtmKeyMigrator {
    fn bounds(&self) -> MigratorBounds {
        self.bounds
    }

    async fn migrate(&self, helper: &MigrationHelper) -> MigrationResult<()> {
        for_each_account(helper, |entry| async move {
            let Some(mut account) = entry.account else {
                return Ok(());
            };
            if remove_path(&mut account, LEGACY_ETM_KEY).is_some() {
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
