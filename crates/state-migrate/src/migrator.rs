use core::fmt;

use async_trait::async_trait;

use crate::error::{MigrationError, MigrationResult};
use crate::helper::MigrationHelper;

/// Which way a chain entry runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Upgrade: `from` → `to`.
    Up,
    /// Downgrade: `to` → `from`.
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => f.write_str("up"),
            Self::Down => f.write_str("down"),
        }
    }
}

/// The exact pair of schema versions a migrator bridges.
///
/// Only constructible with `from < to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MigratorBounds {
    from: u32,
    to: u32,
}

impl MigratorBounds {
    pub fn new(from: u32, to: u32) -> MigrationResult<Self> {
        if from >= to {
            return Err(MigrationError::InvalidBounds { from, to });
        }
        Ok(Self { from, to })
    }

    pub fn from_version(&self) -> u32 {
        self.from
    }

    pub fn to_version(&self) -> u32 {
        self.to
    }

    /// Version the store is at once this step has run in `direction`.
    pub fn end_version(&self, direction: Direction) -> u32 {
        match direction {
            Direction::Up => self.to,
            Direction::Down => self.from,
        }
    }

    /// Version the store must be at for this step to run in `direction`.
    pub fn start_version(&self, direction: Direction) -> u32 {
        match direction {
            Direction::Up => self.from,
            Direction::Down => self.to,
        }
    }
}

/// A single schema change between two exact versions.
///
/// Moving the data ([`migrate`](Self::migrate) / [`rollback`](Self::rollback))
/// and advancing the marker ([`update_version`](Self::update_version)) are
/// separate calls; the builder runs them in that order and only when
/// [`should_migrate`](Self::should_migrate) allows it.
///
/// Bodies must treat absent data as "nothing to do". A step with no valid
/// inverse returns [`MigrationError::Irreversible`] from `rollback`.
#[async_trait]
pub trait Migrator: Send + Sync {
    fn bounds(&self) -> MigratorBounds;

    /// Diagnostic name used in log lines.
    fn name(&self) -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    fn from_version(&self) -> u32 {
        self.bounds().from_version()
    }

    fn to_version(&self) -> u32 {
        self.bounds().to_version()
    }

    /// Eligible when the store sits exactly at this step's start version.
    fn should_migrate(&self, helper: &MigrationHelper, direction: Direction) -> bool {
        helper.current_version == self.bounds().start_version(direction)
    }

    async fn migrate(&self, helper: &MigrationHelper) -> MigrationResult<()>;

    async fn rollback(&self, helper: &MigrationHelper) -> MigrationResult<()>;

    async fn update_version(
        &self,
        helper: &mut MigrationHelper,
        direction: Direction,
    ) -> MigrationResult<()> {
        helper
            .persist_version(self.bounds().end_version(direction))
            .await
    }
}

/// Declares a migrator struct that only carries its bounds.
macro_rules! bounded_migrator {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        pub struct $name {
            bounds: $crate::migrator::MigratorBounds,
        }

        impl From<$crate::migrator::MigratorBounds> for $name {
            fn from(bounds: $crate::migrator::MigratorBounds) -> Self {
                Self { bounds }
            }
        }
    };
}

pub(crate) use bounded_migrator;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use state_store::MemoryStorage;
    use std::sync::Arc;

    bounded_migrator!(NoopMigrator);

    #[async_trait]
    impl Migrator for NoopMigrator {
        fn bounds(&self) -> MigratorBounds {
            self.bounds
        }

        async fn migrate(&self, _helper: &MigrationHelper) -> MigrationResult<()> {
            Ok(())
        }

        async fn rollback(&self, _helper: &MigrationHelper) -> MigrationResult<()> {
            Ok(())
        }
    }

    fn noop(from: u32, to: u32) -> NoopMigrator {
        NoopMigrator::from(MigratorBounds::new(from, to).unwrap())
    }

    #[test]
    fn bounds_require_increasing_versions() {
        assert!(MigratorBounds::new(0, 1).is_ok());
        assert_eq!(
            MigratorBounds::new(1, 1),
            Err(MigrationError::InvalidBounds { from: 1, to: 1 })
        );
        assert_eq!(
            MigratorBounds::new(2, 1),
            Err(MigrationError::InvalidBounds { from: 2, to: 1 })
        );
    }

    #[test]
    fn bounds_start_and_end() {
        let bounds = MigratorBounds::new(4, 5).unwrap();
        assert_eq!(bounds.start_version(Direction::Up), 4);
        assert_eq!(bounds.end_version(Direction::Up), 5);
        assert_eq!(bounds.start_version(Direction::Down), 5);
        assert_eq!(bounds.end_version(Direction::Down), 4);
    }

    #[test]
    fn default_should_migrate_is_exact_match() {
        let storage = Arc::new(MemoryStorage::new());
        let migrator = noop(10, 11);

        let helper = MigrationHelper::new(10, storage.clone());
        assert!(migrator.should_migrate(&helper, Direction::Up));
        assert!(!migrator.should_migrate(&helper, Direction::Down));

        let helper = MigrationHelper::new(11, storage.clone());
        assert!(!migrator.should_migrate(&helper, Direction::Up));
        assert!(migrator.should_migrate(&helper, Direction::Down));

        let helper = MigrationHelper::new(9, storage);
        assert!(!migrator.should_migrate(&helper, Direction::Up));
        assert!(!migrator.should_migrate(&helper, Direction::Down));
    }

    #[tokio::test]
    async fn default_update_version_keeps_marker_and_field_in_sync() {
        let storage = Arc::new(MemoryStorage::new());
        let migrator = noop(10, 11);
        let mut helper = MigrationHelper::new(10, storage.clone());

        migrator
            .update_version(&mut helper, Direction::Up)
            .await
            .unwrap();
        assert_eq!(helper.current_version, 11);
        assert_eq!(storage.snapshot()["stateVersion"], json!(11));

        migrator
            .update_version(&mut helper, Direction::Down)
            .await
            .unwrap();
        assert_eq!(helper.current_version, 10);
        assert_eq!(storage.snapshot()["stateVersion"], json!(10));
    }

    #[test]
    fn name_is_short_type_name() {
        assert_eq!(noop(0, 1).name(), "NoopMigrator");
        assert_eq!(Direction::Up.to_string(), "up");
        assert_eq!(Direction::Down.to_string(), "down");
    }
}
