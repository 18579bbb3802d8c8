use crate::error::{MigrationError, MigrationResult};
use crate::helper::MigrationHelper;
use crate::migrator::{Direction, Migrator, MigratorBounds};

/// Builds a boxed migrator from validated bounds.
pub type MigratorFactory = fn(MigratorBounds) -> Box<dyn Migrator>;

/// [`MigratorFactory`] for any migrator constructible from its bounds.
pub fn factory<M>(bounds: MigratorBounds) -> Box<dyn Migrator>
where
    M: Migrator + From<MigratorBounds> + 'static,
{
    Box::new(M::from(bounds))
}

struct MigrationEntry {
    migrator: Box<dyn Migrator>,
    direction: Direction,
}

/// Description of one chain entry, for listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEntry {
    pub name: &'static str,
    pub from: u32,
    pub to: u32,
    pub direction: Direction,
}

/// Assembles, validates, and runs an ordered migration chain.
///
/// Entries run in the order they were added. Every "up" entry must start
/// where the previous "up" entry ended, and every "down" entry must end
/// where the previous "down" entry started; anything else is rejected when
/// the entry is appended, before any data is touched.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use state_migrate::{MigrationBuilder, MigrationHelper, MinVersionMigrator, MIN_VERSION};
/// use state_store::MemoryStorage;
///
/// let builder = MigrationBuilder::create()
///     .with::<MinVersionMigrator>(0, MIN_VERSION)
///     .unwrap();
///
/// let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// rt.block_on(async {
///     let mut helper = MigrationHelper::new(MIN_VERSION, Arc::new(MemoryStorage::new()));
///     builder.migrate(&mut helper).await.unwrap();
///     assert_eq!(helper.current_version, MIN_VERSION);
/// });
/// ```
#[derive(Default)]
pub struct MigrationBuilder {
    entries: Vec<MigrationEntry>,
}

impl MigrationBuilder {
    pub fn create() -> Self {
        Self::default()
    }

    /// Append an upgrade step `from` → `to`.
    pub fn with<M>(self, from: u32, to: u32) -> MigrationResult<Self>
    where
        M: Migrator + From<MigratorBounds> + 'static,
    {
        self.step(Direction::Up, from, to, factory::<M>)
    }

    /// Append a downgrade step `to` → `from`.
    pub fn rollback<M>(self, from: u32, to: u32) -> MigrationResult<Self>
    where
        M: Migrator + From<MigratorBounds> + 'static,
    {
        self.step(Direction::Down, from, to, factory::<M>)
    }

    /// Append a step built by `make`.
    pub fn step(
        mut self,
        direction: Direction,
        from: u32,
        to: u32,
        make: MigratorFactory,
    ) -> MigrationResult<Self> {
        let bounds = MigratorBounds::new(from, to)?;
        self.check_contiguous(direction, bounds)?;
        self.entries.push(MigrationEntry {
            migrator: make(bounds),
            direction,
        });
        Ok(self)
    }

    fn check_contiguous(&self, direction: Direction, bounds: MigratorBounds) -> MigrationResult<()> {
        let previous = self
            .entries
            .iter()
            .rev()
            .find(|e| e.direction == direction)
            .map(|e| e.migrator.bounds());

        let Some(previous) = previous else {
            return Ok(());
        };

        let (expected, found) = match direction {
            Direction::Up => (previous.to_version(), bounds.from_version()),
            Direction::Down => (previous.from_version(), bounds.to_version()),
        };
        if expected != found {
            return Err(MigrationError::NonContiguousChain { expected, found });
        }
        Ok(())
    }

    /// Number of entries in the chain.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// List the chain as `(name, from, to, direction)` entries.
    pub fn entries(&self) -> Vec<ChainEntry> {
        self.entries
            .iter()
            .map(|e| ChainEntry {
                name: e.migrator.name(),
                from: e.migrator.from_version(),
                to: e.migrator.to_version(),
                direction: e.direction,
            })
            .collect()
    }

    /// Run every eligible entry, in order, against `helper`.
    ///
    /// Stops at the first failing entry; entries already applied stay
    /// applied and the marker reflects the last completed step.
    pub async fn migrate(&self, helper: &mut MigrationHelper) -> MigrationResult<()> {
        for entry in &self.entries {
            Self::run_migrator(entry.migrator.as_ref(), helper, entry.direction).await?;
        }
        Ok(())
    }

    async fn run_migrator(
        migrator: &dyn Migrator,
        helper: &mut MigrationHelper,
        direction: Direction,
    ) -> MigrationResult<()> {
        let should_migrate = migrator.should_migrate(helper, direction);
        log::info!(
            "Migrator {} (to version {}) should migrate: {should_migrate} - {direction}",
            migrator.name(),
            migrator.to_version(),
        );
        if !should_migrate {
            return Ok(());
        }

        match direction {
            Direction::Up => migrator.migrate(helper).await?,
            Direction::Down => migrator.rollback(helper).await?,
        }
        log::info!(
            "Migrator {} (to version {}) migrated - {direction}",
            migrator.name(),
            migrator.to_version(),
        );

        migrator.update_version(helper, direction).await?;
        log::info!(
            "Migrator {} (to version {}) updated version - {direction}",
            migrator.name(),
            migrator.to_version(),
        );
        Ok(())
    }
}
