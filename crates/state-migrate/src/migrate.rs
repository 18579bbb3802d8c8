//! Entry points: version detection, the shipped chain, and the
//! upgrade/downgrade passes built on it.

use std::sync::Arc;

use serde_json::Value;
use state_store::StorageService;

use crate::builder::{factory, MigrationBuilder, MigratorFactory};
use crate::error::{MigrationError, MigrationResult};
use crate::helper::{MigrationHelper, GLOBAL_KEY, STATE_VERSION_KEY};
use crate::migrations::{
    AddKeyTypeToOrgKeysMigrator, BadgeSettingsMigrator, ClearClipboardDelayMigrator,
    EnablePasskeysMigrator, KnownAccountsMigrator, LastSyncMigrator,
    MoveBiometricAutoPromptToAccountMigrator, MoveBrowserSettingsToGlobalMigrator,
    MoveStateVersionMigrator, RemoveEverBeenUnlockedMigrator, RemoveLegacyEtmKeyMigrator,
    TwoFactorTokenRecordMigrator, VaultTimeoutSettingsMigrator,
};
use crate::migrator::Direction;
use crate::min_version::{MinVersionMigrator, MIN_VERSION};

/// Schema version written by this build.
pub const CURRENT_VERSION: u32 = 16;

/// The shipped chain, oldest step first.
const CHAIN: &[(u32, u32, MigratorFactory)] = &[
    (0, MIN_VERSION, factory::<MinVersionMigrator>),
    (3, 4, factory::<RemoveEverBeenUnlockedMigrator>),
    (4, 5, factory::<AddKeyTypeToOrgKeysMigrator>),
    (5, 6, factory::<RemoveLegacyEtmKeyMigrator>),
    (6, 7, factory::<MoveBiometricAutoPromptToAccountMigrator>),
    (7, 8, factory::<MoveStateVersionMigrator>),
    (8, 9, factory::<MoveBrowserSettingsToGlobalMigrator>),
    (9, 10, factory::<LastSyncMigrator>),
    (10, 11, factory::<EnablePasskeysMigrator>),
    (11, 12, factory::<BadgeSettingsMigrator>),
    (12, 13, factory::<ClearClipboardDelayMigrator>),
    (13, 14, factory::<TwoFactorTokenRecordMigrator>),
    (14, 15, factory::<KnownAccountsMigrator>),
    (15, CURRENT_VERSION, factory::<VaultTimeoutSettingsMigrator>),
];

/// Integral JSON numbers, including floats such as `11.0`, that fit a `u32`.
fn parse_version(value: &Value) -> Option<u32> {
    value
        .as_u64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|v| v.fract() == 0.0 && *v >= 0.0)
                .map(|v| v as u64)
        })
        .and_then(|v| u32::try_from(v).ok())
}

/// Version the stored data is at.
///
/// Looks at the top-level marker first, then inside the global blob. An
/// unreadable top-level marker falls through to the nested one. `None`
/// means neither marker exists, which is treated as a fresh install; a
/// marker that exists but cannot be read is [`MigrationError::UnreadableVersion`].
pub async fn current_version(storage: &dyn StorageService) -> MigrationResult<Option<u32>> {
    let mut unreadable = None;

    if let Some(value) = storage
        .get(STATE_VERSION_KEY)
        .await?
        .filter(|v| !v.is_null())
    {
        match parse_version(&value) {
            Some(version) => {
                log::info!("State version from {STATE_VERSION_KEY}: {version}");
                return Ok(Some(version));
            }
            None => {
                log::warn!("Unreadable state version at {STATE_VERSION_KEY}: {value}");
                unreadable = Some((STATE_VERSION_KEY, value));
            }
        }
    }

    let nested = storage
        .get(GLOBAL_KEY)
        .await?
        .and_then(|mut global| global.get_mut(STATE_VERSION_KEY).map(Value::take))
        .filter(|v| !v.is_null());
    if let Some(value) = nested {
        match parse_version(&value) {
            Some(version) => {
                log::info!("State version from global.stateVersion: {version}");
                return Ok(Some(version));
            }
            None => {
                log::warn!("Unreadable state version at global.stateVersion: {value}");
                if unreadable.is_none() {
                    unreadable = Some(("global.stateVersion", value));
                }
            }
        }
    }

    match unreadable {
        Some((key, value)) => Err(MigrationError::UnreadableVersion {
            key: key.to_string(),
            value: value.to_string(),
        }),
        None => {
            log::info!("No state version found");
            Ok(None)
        }
    }
}

/// The upgrade chain from any supported version to [`CURRENT_VERSION`].
pub fn create_migration_builder() -> MigrationResult<MigrationBuilder> {
    CHAIN
        .iter()
        .try_fold(MigrationBuilder::create(), |builder, &(from, to, make)| {
            builder.step(Direction::Up, from, to, make)
        })
}

/// Bring the stored data up to [`CURRENT_VERSION`].
///
/// A store with no version marker at all is taken to be a fresh install:
/// the current version is written and no migrator runs. A store newer than
/// this build is left alone.
pub async fn migrate(storage: Arc<dyn StorageService>) -> MigrationResult<()> {
    let Some(version) = current_version(&*storage).await? else {
        log::info!("No state version found, marking store as v{CURRENT_VERSION}");
        storage
            .save(STATE_VERSION_KEY, &Value::from(CURRENT_VERSION))
            .await?;
        return Ok(());
    };

    if version > CURRENT_VERSION {
        log::warn!(
            "State version {version} is newer than this build (v{CURRENT_VERSION}); not migrating"
        );
        return Ok(());
    }

    let mut helper = MigrationHelper::new(version, storage);
    create_migration_builder()?.migrate(&mut helper).await?;
    log::info!("State is at version {}", helper.current_version);
    Ok(())
}

/// Downgrade the stored data to `target`.
///
/// Runs the inverse of every step above `target`, newest first. Stops with
/// [`MigrationError::Irreversible`] at the first step that cannot be
/// undone; steps already rolled back stay rolled back.
pub async fn rollback_to(storage: Arc<dyn StorageService>, target: u32) -> MigrationResult<()> {
    if !(MIN_VERSION..=CURRENT_VERSION).contains(&target) {
        return Err(MigrationError::InvalidRollbackTarget {
            target,
            min: MIN_VERSION,
            max: CURRENT_VERSION,
        });
    }

    let Some(version) = current_version(&*storage).await? else {
        log::info!("No state version found, nothing to roll back");
        return Ok(());
    };

    let builder = CHAIN
        .iter()
        .rev()
        .filter(|(from, _, _)| *from >= target)
        .try_fold(MigrationBuilder::create(), |builder, &(from, to, make)| {
            builder.step(Direction::Down, from, to, make)
        })?;

    let mut helper = MigrationHelper::new(version, storage);
    builder.migrate(&mut helper).await?;
    log::info!("State is at version {}", helper.current_version);
    Ok(())
}

/// Whether [`migrate`] would change anything.
pub async fn needs_migration(storage: &dyn StorageService) -> MigrationResult<bool> {
    Ok(current_version(storage)
        .await?
        .map_or(true, |version| version < CURRENT_VERSION))
}
