//! # Upgrade Store
//!
//! Seeds a SQLite file the way an old client (v5) left it, runs the
//! migration pass, and prints the keys before and after.
//!
//! Run with: `cargo run -p state-migrate --example upgrade_store`

use std::sync::Arc;

use serde_json::json;
use state_migrate::{create_migration_builder, current_version, migrate, CURRENT_VERSION};
use state_store::{SqliteStorage, StorageService};

async fn print_keys(label: &str, store: &SqliteStorage) -> Result<(), Box<dyn std::error::Error>> {
    println!("{label}:");
    for key in store.keys().await? {
        let value = store.get(&key).await?.unwrap_or_default();
        println!("  {key:<52} {value}");
    }
    println!();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = std::env::temp_dir().join("state-migrate-demo");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("client_state.db");
    let _ = std::fs::remove_file(&path);

    println!("=== state-migrate: upgrade a v5 store ===\n");

    let store = Arc::new(SqliteStorage::open(&path)?);
    store
        .save(
            "global",
            &json!({ "stateVersion": 5, "noAutoPromptBiometrics": true, "disablePasskeys": false }),
        )
        .await?;
    store
        .save("authenticatedAccounts", &json!(["3f2a", "9c1d"]))
        .await?;
    store.save("activeUserId", &json!("3f2a")).await?;
    store
        .save(
            "3f2a",
            &json!({
                "profile": { "email": "ann@example.com", "lastSync": "2024-03-01T10:00:00Z" },
                "keys": { "legacyEtmKey": "etm" },
                "settings": { "disableBadgeCounter": true, "clearClipboard": 30, "vaultTimeout": -1 },
            }),
        )
        .await?;
    store
        .save(
            "9c1d",
            &json!({
                "profile": { "email": "bob@example.com" },
                "settings": { "neverDomains": { "intranet.example": null } },
            }),
        )
        .await?;

    print_keys("Before", &store).await?;

    println!("Chain:");
    for entry in create_migration_builder()?.entries() {
        println!("  v{:<2} → v{:<2}  {}", entry.from, entry.to, entry.name);
    }
    println!();

    migrate(store.clone()).await?;

    print_keys("After", &store).await?;

    let version = current_version(&*store).await?;
    assert_eq!(version, Some(CURRENT_VERSION));
    println!("Store is at v{CURRENT_VERSION}.");

    Ok(())
}
