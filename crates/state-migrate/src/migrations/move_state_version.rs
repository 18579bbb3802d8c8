use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{MigrationError, MigrationResult};
use crate::helper::{MigrationHelper, GLOBAL_KEY, STATE_VERSION_KEY};
use crate::migrator::{bounded_migrator, Migrator, MigratorBounds};

bounded_migrator!(
    /// Moves the version marker out of the global blob to its own
    /// top-level key.
    ///
    /// The marker location for the version being written is resolved by
    /// [`MigrationHelper::persist_version`], so the default
    /// `update_version` writes `stateVersion` going up and
    /// `global.stateVersion` coming back down.
    MoveStateVersionMigrator
);

#[async_trait]
impl Migrator for MoveStateVersionMigrator {
    fn bounds(&self) -> MigratorBounds {
        self.bounds
    }

    async fn migrate(&self, helper: &MigrationHelper) -> MigrationResult<()> {
        let mut global: Map<String, Value> = helper.get(GLOBAL_KEY).await?.unwrap_or_default();
        let Some(version) = global.remove(STATE_VERSION_KEY).filter(|v| !v.is_null()) else {
            return Err(MigrationError::StepFailed {
                from: self.from_version(),
                to: self.to_version(),
                reason: "state version not found in global".into(),
            });
        };

        helper.set(STATE_VERSION_KEY, &version).await?;
        helper.set(GLOBAL_KEY, &global).await
    }

    async fn rollback(&self, helper: &MigrationHelper) -> MigrationResult<()> {
        let Some(version) = helper.get::<Value>(STATE_VERSION_KEY).await? else {
            return Ok(());
        };
        let mut global: Map<String, Value> = helper.get(GLOBAL_KEY).await?.unwrap_or_default();
        global.insert(STATE_VERSION_KEY.to_string(), version);

        helper.set(GLOBAL_KEY, &global).await?;
        helper.remove(STATE_VERSION_KEY).await
    }
}
