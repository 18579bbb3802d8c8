use std::sync::Arc;

use serde_json::{Map, Value};
use state_migrate::{
    create_migration_builder, current_version, ChainEntry, CURRENT_VERSION, MIN_VERSION,
};
use state_store::{JournalMode, SqliteConfig, SqliteStorage, StorageError, StorageService};

type Result = std::result::Result<(), Box<dyn std::error::Error>>;

fn open(db_path: &str, journal_mode: JournalMode) -> std::result::Result<SqliteStorage, StorageError> {
    SqliteStorage::open_with_config(
        db_path,
        SqliteConfig {
            journal_mode,
            ..SqliteConfig::default()
        },
    )
}

/// Upgrade steps that still have to run for a store at `version`.
fn pending_steps(version: u32) -> std::result::Result<Vec<ChainEntry>, Box<dyn std::error::Error>> {
    Ok(create_migration_builder()?
        .entries()
        .into_iter()
        .filter(|e| e.from >= version && e.from >= MIN_VERSION)
        .collect())
}

fn print_steps(steps: &[ChainEntry]) {
    println!("  {:>6}  {:<44}", "Step", "Migrator");
    println!("  {}", "-".repeat(52));
    for step in steps {
        println!(
            "  {:>6}  {:<44}",
            format!("{}→{}", step.from, step.to),
            step.name
        );
    }
}

/// `statemig status <db>`: stored version, target version, pending steps.
pub async fn status(db_path: &str, journal_mode: JournalMode) -> Result {
    let store = open(db_path, journal_mode)?;
    let size = store.file_size()?;
    let journal = store.journal_mode()?;
    let entries = store.entry_count()?;

    println!("Database: {db_path} (SQLite, {journal} mode)");
    println!("Size: {}", format_bytes(size));
    println!("Keys: {entries}");
    println!();

    let Some(version) = current_version(&store).await? else {
        println!("Stored version: (none, will be marked v{CURRENT_VERSION} as a fresh install)");
        return Ok(());
    };
    println!("Stored version: v{version}");
    println!("Current version: v{CURRENT_VERSION}");

    if version < MIN_VERSION {
        println!();
        println!("  Too old to migrate (minimum is v{MIN_VERSION})");
        return Ok(());
    }
    if version > CURRENT_VERSION {
        println!();
        println!("  Newer than this build; nothing will run");
        return Ok(());
    }

    let steps = pending_steps(version)?;
    println!();
    if steps.is_empty() {
        println!("  (up to date)");
    } else {
        print_steps(&steps);
    }
    Ok(())
}

/// `statemig migrate <db>`: run the upgrade chain.
pub async fn migrate(db_path: &str, journal_mode: JournalMode, dry_run: bool) -> Result {
    let store = Arc::new(open(db_path, journal_mode)?);
    let before = current_version(&*store).await?;

    if dry_run {
        match before {
            None => println!("Would mark store as v{CURRENT_VERSION} (fresh install)"),
            Some(version) => {
                let steps = pending_steps(version)?;
                println!("Would run {} step(s):", steps.len());
                print_steps(&steps);
            }
        }
        return Ok(());
    }

    state_migrate::migrate(store.clone()).await?;
    let after = current_version(&*store).await?;

    match (before, after) {
        (Some(from), Some(to)) if from == to => println!("Already at v{to}"),
        (Some(from), Some(to)) => println!("Migrated v{from} → v{to}"),
        (None, Some(to)) => println!("Marked fresh store as v{to}"),
        (_, None) => println!("No version marker after migration"),
    }
    Ok(())
}

/// `statemig rollback <db> --to <version>`: run the downgrade chain.
pub async fn rollback(db_path: &str, journal_mode: JournalMode, target: u32) -> Result {
    let store = Arc::new(open(db_path, journal_mode)?);
    let before = current_version(&*store).await?;

    let result = state_migrate::rollback_to(store.clone(), target).await;
    let after = current_version(&*store).await?;

    if let (Some(from), Some(to)) = (before, after) {
        if from != to {
            println!("Rolled back v{from} → v{to}");
        }
    }
    result?;
    Ok(())
}

/// `statemig export <db> [key]`: dump stored values as pretty JSON.
pub async fn export(db_path: &str, journal_mode: JournalMode, key: Option<&str>) -> Result {
    let store = open(db_path, journal_mode)?;

    let keys = match key {
        Some(key) => vec![key.to_string()],
        None => store.keys().await?,
    };

    let mut out = Map::new();
    for key in keys {
        match store.get(&key).await? {
            Some(value) => {
                out.insert(key, value);
            }
            None => eprintln!("Key '{key}' not found"),
        }
    }

    println!("{}", serde_json::to_string_pretty(&Value::Object(out))?);
    Ok(())
}

/// `statemig chain`: list the shipped migration chain.
pub fn chain() -> Result {
    let entries = create_migration_builder()?.entries();
    println!("Migration chain (v0 → v{CURRENT_VERSION}, minimum v{MIN_VERSION}):");
    println!();
    print_steps(&entries);
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
