use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::MigrationResult;
use crate::helper::{MigrationHelper, GLOBAL_KEY};
use crate::keys::KeyDefinition;
use crate::migrator::{bounded_migrator, Migrator, MigratorBounds};

/// Whether passkeys may be offered, stored globally.
pub const ENABLE_PASSKEYS: KeyDefinition = KeyDefinition::new("vaultSettings", "enablePasskeys");

const DISABLE_PASSKEYS: &str = "disablePasskeys";

bounded_migrator!(
    /// Replaces `global.disablePasskeys` with its negation under
    /// [`ENABLE_PASSKEYS`].
    EnablePasskeysMigrator
);

#[async_trait]
impl Migrator for EnablePasskeysMigrator {
    fn bounds(&self) -> MigratorBounds {
        self.bounds
    }

    async fn migrate(&self, helper: &MigrationHelper) -> MigrationResult<()> {
        let Some(mut global) = helper.get::<Map<String, Value>>(GLOBAL_KEY).await? else {
            return Ok(());
        };
        let Some(disabled) = global.get(DISABLE_PASSKEYS).and_then(Value::as_bool) else {
            return Ok(());
        };

        helper.set_to_global(&ENABLE_PASSKEYS, &!disabled).await?;
        global.remove(DISABLE_PASSKEYS);
        helper.set(GLOBAL_KEY, &global).await
    }

    async fn rollback(&self, helper: &MigrationHelper) -> MigrationResult<()> {
        let Some(enabled) = helper.get_from_global::<bool>(&ENABLE_PASSKEYS).await? else {
            return Ok(());
        };

        let mut global: Map<String, Value> = helper.get(GLOBAL_KEY).await?.unwrap_or_default();
        global.insert(DISABLE_PASSKEYS.to_string(), Value::Bool(!enabled));
        helper.set(GLOBAL_KEY, &global).await?;
        helper.remove_from_global(&ENABLE_PASSKEYS).await
    }
}
