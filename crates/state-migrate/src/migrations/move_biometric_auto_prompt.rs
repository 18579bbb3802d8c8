use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{for_each_account, set_path};
use crate::error::{MigrationError, MigrationResult};
use crate::helper::{MigrationHelper, GLOBAL_KEY};
use crate::migrator::{bounded_migrator, Migrator, MigratorBounds};

const NO_AUTO_PROMPT: &str = "noAutoPromptBiometrics";
const DISABLE_AUTO_PROMPT: &[&str] = &["settings", "disableAutoBiometricsPrompt"];

bounded_migrator!(
    /// Moves the global `noAutoPromptBiometrics` flag onto every account as
    /// `settings.disableAutoBiometricsPrompt`.
    ///
    /// Irreversible: once copied, the per-account values may diverge and
    /// there is no single global value to restore.
    MoveBiometricAutoPromptToAccountMigrator
);

#[async_trait]
impl Migrator for MoveBiometricAutoPromptToAccountMigrator {
    fn bounds(&self) -> MigratorBounds {
        self.bounds
    }

    async fn migrate(&self, helper: &MigrationHelper) -> MigrationResult<()> {
        let Some(mut global) = helper.get::<Map<String, Value>>(GLOBAL_KEY).await? else {
            return Ok(());
        };
        let Some(no_auto_prompt) = global.remove(NO_AUTO_PROMPT) else {
            return Ok(());
        };

        if no_auto_prompt.as_bool() == Some(true) {
            for_each_account(helper, |entry| async move {
                let Some(mut account) = entry.account else {
                    return Ok(());
                };
                set_path(&mut account, DISABLE_AUTO_PROMPT, Value::Bool(true));
                helper.set(&entry.user_id, &account).await
            })
            .await?;
        }

        helper.set(GLOBAL_KEY, &global).await
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

    fn migrator() -> MoveBiometricAutoPromptToAccountMigrator {
        MoveBiometricAutoPromptToAccountMigrator::from(MigratorBounds::new(6, 7).unwrap())
    }

    #[tokio::test]
    async fn copies_flag_to_every_account() {
        let storage = Arc::new(MemoryStorage::from_json(json!({
            "global": { "noAutoPromptBiometrics": true, "stateVersion": 6 },
            "authenticatedAccounts": ["u1", "u2"],
            "u1": { "settings": { "theme": "dark" } },
            "u2": {},
        })));
        let helper = MigrationHelper::new(6, storage.clone());

        migrator().migrate(&helper).await.unwrap();

        let snapshot = storage.snapshot();
        assert_eq!(snapshot["global"], json!({ "stateVersion": 6 }));
        assert_eq!(
            snapshot["u1"],
            json!({ "settings": { "theme": "dark", "disableAutoBiometricsPrompt": true } })
        );
        assert_eq!(
            snapshot["u2"],
            json!({ "settings": { "disableAutoBiometricsPrompt": true } })
        );
    }

    #[tokio::test]
    async fn false_flag_is_just_dropped() {
        let storage = Arc::new(MemoryStorage::from_json(json!({
            "global": { "noAutoPromptBiometrics": false },
            "authenticatedAccounts": ["u1"],
            "u1": { "settings": {} },
        })));
        let helper = MigrationHelper::new(6, storage.clone());

        migrator().migrate(&helper).await.unwrap();

        let snapshot = storage.snapshot();
        assert_eq!(snapshot["global"], json!({}));
        assert_eq!(snapshot["u1"], json!({ "settings": {} }));
        assert_eq!(storage.write_count(), 1);
    }

    #[tokio::test]
    async fn absent_flag_writes_nothing() {
        let storage = Arc::new(MemoryStorage::from_json(json!({
            "global": { "theme": "light" },
            "authenticatedAccounts": ["u1"],
            "u1": {},
        })));
        let helper = MigrationHelper::new(6, storage.clone());

        migrator().migrate(&helper).await.unwrap();
        assert_eq!(storage.write_count(), 0);
    }
}
