use async_trait::async_trait;

use crate::error::{MigrationError, MigrationResult};
use crate::helper::MigrationHelper;
use crate::migrator::{bounded_migrator, Direction, Migrator, MigratorBounds};

/// Oldest schema version the chain can upgrade.
pub const MIN_VERSION: u32 = 3;

bounded_migrator!(
    /// Guard at the head of the chain, bounded `(0, MIN_VERSION)`.
    ///
    /// Fires for any store older than [`MIN_VERSION`] (not only an exact
    /// match) and aborts the pass with [`MigrationError::TooOld`].
    MinVersionMigrator
);

#[async_trait]
impl Migrator for MinVersionMigrator {
    fn bounds(&self) -> MigratorBounds {
        self.bounds
    }

    fn should_migrate(&self, helper: &MigrationHelper, direction: Direction) -> bool {
        direction == Direction::Up && helper.current_version < self.to_version()
    }

    async fn migrate(&self, helper: &MigrationHelper) -> MigrationResult<()> {
        Err(MigrationError::TooOld {
            current: helper.current_version,
            minimum: self.to_version(),
        })
    }

    async fn rollback(&self, _helper: &MigrationHelper) -> MigrationResult<()> {
        Err(MigrationError::Irreversible)
    }
}
