use async_trait::async_trait;
use serde_json::Value;

use super::{for_each_account, get_path, remove_path, set_path};
use crate::error::MigrationResult;
use crate::helper::MigrationHelper;
use crate::keys::KeyDefinition;
use crate::migrator::{bounded_migrator, Migrator, MigratorBounds};

/// Whether the toolbar badge shows a counter, per user.
pub const ENABLE_BADGE_COUNTER: KeyDefinition =
    KeyDefinition::new("badgeSettings", "enableBadgeCounter");

const DISABLE_BADGE_COUNTER: &[&str] = &["settings", "disableBadgeCounter"];

bounded_migrator!(
    /// Replaces `settings.disableBadgeCounter` with its negation under
    /// [`ENABLE_BADGE_COUNTER`]. Non-boolean values are left alone.
    BadgeSettingsMigrator
);

#[async_trait]
impl Migrator for BadgeSettingsMigrator {
    fn bounds(&self) -> MigratorBounds {
        self.bounds
    }

    async fn migrate(&self, helper: &MigrationHelper) -> MigrationResult<()> {
        for_each_account(helper, |entry| async move {
            let Some(mut account) = entry.account else {
                return Ok(());
            };
            let Some(disabled) = get_path(&account, DISABLE_BADGE_COUNTER).and_then(Value::as_bool)
            else {
                return Ok(());
            };

            helper
                .set_to_user(&entry.user_id, &ENABLE_BADGE_COUNTER, &!disabled)
                .await?;
            remove_path(&mut account, DISABLE_BADGE_COUNTER);
            helper.set(&entry.user_id, &account).await
        })
        .await
    }

    async fn rollback(&self, helper: &MigrationHelper) -> MigrationResult<()> {
        for_each_account(helper, |entry| async move {
            let Some(enabled) = helper
                .get_from_user::<bool>(&entry.user_id, &ENABLE_BADGE_COUNTER)
                .await?
            else {
                return Ok(());
            };
            if let Some(mut account) = entry.account {
                set_path(&mut account, DISABLE_BADGE_COUNTER, Value::Bool(!enabled));
                helper.set(&entry.user_id, &account).await?;
            }
            helper
                .remove_from_user(&entry.user_id, &ENABLE_BADGE_COUNTER)
                .await
        })
        .await
    }
}
