use async_trait::async_trait;
use serde_json::Value;

use super::{for_each_account, get_path, remove_path, set_path};
use crate::error::MigrationResult;
use crate::helper::MigrationHelper;
use crate::keys::{KeyDefinition, StateDefinition};
use crate::migrator::{bounded_migrator, Migrator, MigratorBounds};

const VAULT_TIMEOUT_SETTINGS: StateDefinition = StateDefinition::new("vaultTimeoutSettings");

/// Idle time before the vault locks, per user.
pub const VAULT_TIMEOUT: KeyDefinition =
    KeyDefinition::with_state(VAULT_TIMEOUT_SETTINGS, "vaultTimeout");

/// What happens when the vault times out, per user.
pub const VAULT_TIMEOUT_ACTION: KeyDefinition =
    KeyDefinition::with_state(VAULT_TIMEOUT_SETTINGS, "vaultTimeoutAction");

const LEGACY_TIMEOUT: &[&str] = &["settings", "vaultTimeout"];
const LEGACY_ACTION: &[&str] = &["settings", "vaultTimeoutAction"];

/// Legacy numeric sentinels and their named replacements.
const SENTINELS: &[(i64, &str)] = &[(-1, "onRestart"), (-2, "never")];

fn to_named(timeout: &Value) -> Value {
    timeout
        .as_i64()
        .and_then(|t| SENTINELS.iter().find(|(n, _)| *n == t))
        .map(|(_, name)| Value::from(*name))
        .unwrap_or_else(|| timeout.clone())
}

fn to_sentinel(timeout: &Value) -> Value {
    timeout
        .as_str()
        .and_then(|t| SENTINELS.iter().find(|(_, name)| *name == t))
        .map(|(n, _)| Value::from(*n))
        .unwrap_or_else(|| timeout.clone())
}

bounded_migrator!(
    /// Moves `settings.vaultTimeout` and `settings.vaultTimeoutAction` to
    /// their own user keys, naming the `-1`/`-2` timeout sentinels.
    /// Explicit `null` legacy values stay in the account blob.
    VaultTimeoutSettingsMigrator
);

#[async_trait]
impl Migrator for VaultTimeoutSettingsMigrator {
    fn bounds(&self) -> MigratorBounds {
        self.bounds
    }

    async fn migrate(&self, helper: &MigrationHelper) -> MigrationResult<()> {
        for_each_account(helper, |entry| async move {
            let Some(mut account) = entry.account else {
                return Ok(());
            };
            let user_id = entry.user_id.as_str();
            let timeout = get_path(&account, LEGACY_TIMEOUT)
                .filter(|v| !v.is_null())
                .cloned();
            let action = get_path(&account, LEGACY_ACTION)
                .filter(|v| !v.is_null())
                .cloned();
            if timeout.is_none() && action.is_none() {
                return Ok(());
            }

            if let Some(timeout) = &timeout {
                helper
                    .set_to_user(user_id, &VAULT_TIMEOUT, &to_named(timeout))
                    .await?;
                remove_path(&mut account, LEGACY_TIMEOUT);
            }
            if let Some(action) = &action {
                helper
                    .set_to_user(user_id, &VAULT_TIMEOUT_ACTION, action)
                    .await?;
                remove_path(&mut account, LEGACY_ACTION);
            }
            helper.set(user_id, &account).await
        })
        .await
    }

    async fn rollback(&self, helper: &MigrationHelper) -> MigrationResult<()> {
        for_each_account(helper, |entry| async move {
            let user_id = entry.user_id.as_str();
            let timeout = helper.get_from_user::<Value>(user_id, &VAULT_TIMEOUT).await?;
            let action = helper
                .get_from_user::<Value>(user_id, &VAULT_TIMEOUT_ACTION)
                .await?;
            if timeout.is_none() && action.is_none() {
                return Ok(());
            }

            if let Some(mut account) = entry.account {
                if let Some(timeout) = &timeout {
                    set_path(&mut account, LEGACY_TIMEOUT, to_sentinel(timeout));
                }
                if let Some(action) = action.clone() {
                    set_path(&mut account, LEGACY_ACTION, action);
                }
                helper.set(user_id, &account).await?;
            }
            if timeout.is_some() {
                helper.remove_from_user(user_id, &VAULT_TIMEOUT).await?;
            }
            if action.is_some() {
                helper.remove_from_user(user_id, &VAULT_TIMEOUT_ACTION).await?;
            }
            Ok(())
        })
        .await
    }
}
