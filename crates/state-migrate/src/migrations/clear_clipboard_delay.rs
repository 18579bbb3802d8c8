use async_trait::async_trait;
use serde_json::Value;

use super::{for_each_account, get_path, remove_path, set_path};
use crate::error::MigrationResult;
use crate::helper::MigrationHelper;
use crate::keys::KeyDefinition;
use crate::migrator::{bounded_migrator, Migrator, MigratorBounds};

/// How long copied secrets stay on the clipboard, per user.
pub const CLEAR_CLIPBOARD_DELAY: KeyDefinition =
    KeyDefinition::new("autofillSettingsLocal", "clearClipboardDelay");

const CLEAR_CLIPBOARD: &[&str] = &["settings", "clearClipboard"];

const NEVER: &str = "never";

/// Seconds to named delay. A legacy `null` means [`NEVER`].
const DELAYS: &[(i64, &str)] = &[
    (10, "tenSeconds"),
    (20, "twentySeconds"),
    (30, "thirtySeconds"),
    (60, "oneMinute"),
    (120, "twoMinutes"),
    (300, "fiveMinutes"),
];

fn to_named(seconds: &Value) -> Value {
    if seconds.is_null() {
        return Value::from(NEVER);
    }
    seconds
        .as_i64()
        .and_then(|s| DELAYS.iter().find(|(secs, _)| *secs == s))
        .map(|(_, name)| Value::from(*name))
        .unwrap_or_else(|| seconds.clone())
}

fn to_seconds(named: &Value) -> Value {
    match named.as_str() {
        Some(NEVER) => Value::Null,
        Some(name) => DELAYS
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(secs, _)| Value::from(*secs))
            .unwrap_or_else(|| named.clone()),
        None => named.clone(),
    }
}

bounded_migrator!(
    /// Converts `settings.clearClipboard` (seconds, or `null` for never)
    /// into a named delay under [`CLEAR_CLIPBOARD_DELAY`].
    ///
    /// Values outside the known set are carried over unchanged.
    ClearClipboardDelayMigrator
);

#[async_trait]
impl Migrator for ClearClipboardDelayMigrator {
    fn bounds(&self) -> MigratorBounds {
        self.bounds
    }

    async fn migrate(&self, helper: &MigrationHelper) -> MigrationResult<()> {
        for_each_account(helper, |entry| async move {
            let Some(mut account) = entry.account else {
                return Ok(());
            };
            if get_path(&account, CLEAR_CLIPBOARD).is_none() {
                return Ok(());
            }
            let seconds = remove_path(&mut account, CLEAR_CLIPBOARD).unwrap_or(Value::Null);

            helper
                .set_to_user(&entry.user_id, &CLEAR_CLIPBOARD_DELAY, &to_named(&seconds))
                .await?;
            helper.set(&entry.user_id, &account).await
        })
        .await
    }

    async fn rollback(&self, helper: &MigrationHelper) -> MigrationResult<()> {
        for_each_account(helper, |entry| async move {
            let Some(named) = helper
                .get_from_user::<Value>(&entry.user_id, &CLEAR_CLIPBOARD_DELAY)
                .await?
            else {
                return Ok(());
            };
            if let Some(mut account) = entry.account {
                set_path(&mut account, CLEAR_CLIPBOARD, to_seconds(&named));
                helper.set(&entry.user_id, &account).await?;
            }
            helper
                .remove_from_user(&entry.user_id, &CLEAR_CLIPBOARD_DELAY)
                .await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use state_store::MemoryStorage;
    use std::sync::Arc;

    fn migrator() -> ClearClipboardDelayMigrator {
        ClearClipboardDelayMigrator::from(MigratorBounds::new(12, 13).unwrap())
    }

    #[test]
    fn named_delays() {
        assert_eq!(to_named(&Value::Null), json!("never"));
        assert_eq!(to_named(&json!(10)), json!("tenSeconds"));
        assert_eq!(to_named(&json!(60)), json!("oneMinute"));
        assert_eq!(to_named(&json!(300)), json!("fiveMinutes"));
        assert_eq!(to_named(&json!(45)), json!(45));

        assert_eq!(to_seconds(&json!("never")), Value::Null);
        assert_eq!(to_seconds(&json!("twoMinutes")), json!(120));
        assert_eq!(to_seconds(&json!(45)), json!(45));
    }

    #[tokio::test]
    async fn converts_per_user() {
        let storage = Arc::new(MemoryStorage::from_json(json!({
            "authenticatedAccounts": ["u1", "u2", "u3"],
            "u1": { "settings": { "clearClipboard": 20 } },
            "u2": { "settings": { "clearClipboard": null } },
            "u3": { "settings": {} },
        })));
        let helper = MigrationHelper::new(12, storage.clone());

        migrator().migrate(&helper).await.unwrap();

        let snapshot = storage.snapshot();
        assert_eq!(
            snapshot["user_u1_autofillSettingsLocal_clearClipboardDelay"],
            json!("twentySeconds")
        );
        assert_eq!(
            snapshot["user_u2_autofillSettingsLocal_clearClipboardDelay"],
            json!("never")
        );
        assert!(!snapshot.contains_key("user_u3_autofillSettingsLocal_clearClipboardDelay"));
        assert_eq!(snapshot["u1"], json!({ "settings": {} }));
        assert_eq!(snapshot["u3"], json!({ "settings": {} }));
    }

    #[tokio::test]
    async fn round_trip() {
        let original = json!({
            "authenticatedAccounts": ["u1", "u2"],
            "u1": { "settings": { "clearClipboard": 120 } },
            "u2": { "settings": { "clearClipboard": 7 } },
        });
        let storage = Arc::new(MemoryStorage::from_json(original.clone()));
        let migrator = migrator();

        migrator
            .migrate(&MigrationHelper::new(12, storage.clone()))
            .await
            .unwrap();
        migrator
            .rollback(&MigrationHelper::new(13, storage.clone()))
            .await
            .unwrap();

        assert_eq!(storage.snapshot(), MemoryStorage::from_json(original).snapshot());
    }
}
