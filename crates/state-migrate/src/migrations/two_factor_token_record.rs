use async_trait::async_trait;
use serde_json::{Map, Value};

use super::get_path;
use crate::error::MigrationResult;
use crate::helper::{MigrationHelper, GLOBAL_KEY};
use crate::keys::KeyDefinition;
use crate::migrator::{bounded_migrator, Migrator, MigratorBounds};

/// Remembered two-factor tokens keyed by account email, stored globally.
pub const TWO_FACTOR_TOKEN_RECORD: KeyDefinition =
    KeyDefinition::new("tokenDiskLocal", "twoFactorTokenRecord");

const TWO_FACTOR_TOKEN: &str = "twoFactorToken";
const PROFILE_EMAIL: &[&str] = &["profile", "email"];

/// Emails of the enumerated accounts, in enumeration order.
async fn account_emails(helper: &MigrationHelper) -> MigrationResult<Vec<String>> {
    Ok(helper
        .get_accounts::<Value>()
        .await?
        .into_iter()
        .filter_map(|entry| {
            entry
                .account
                .as_ref()
                .and_then(|a| get_path(a, PROFILE_EMAIL))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .collect())
}

bounded_migrator!(
    /// Replaces the single `global.twoFactorToken` with a record mapping
    /// each account's email to that token.
    ///
    /// If no account has an email the legacy token is left in place.
    TwoFactorTokenRecordMigrator
);

#[async_trait]
impl Migrator for TwoFactorTokenRecordMigrator {
    fn bounds(&self) -> MigratorBounds {
        self.bounds
    }

    async fn migrate(&self, helper: &MigrationHelper) -> MigrationResult<()> {
        let Some(mut global) = helper.get::<Map<String, Value>>(GLOBAL_KEY).await? else {
            return Ok(());
        };
        let Some(token) = global.get(TWO_FACTOR_TOKEN).filter(|t| !t.is_null()).cloned() else {
            return Ok(());
        };

        let emails = account_emails(helper).await?;
        if emails.is_empty() {
            log::debug!("No account email to key the two-factor token by");
            return Ok(());
        }

        let mut record: Map<String, Value> = helper
            .get_from_global(&TWO_FACTOR_TOKEN_RECORD)
            .await?
            .unwrap_or_default();
        for email in emails {
            record.entry(email).or_insert_with(|| token.clone());
        }

        helper.set_to_global(&TWO_FACTOR_TOKEN_RECORD, &record).await?;
        global.remove(TWO_FACTOR_TOKEN);
        helper.set(GLOBAL_KEY, &global).await
    }

    async fn rollback(&self, helper: &MigrationHelper) -> MigrationResult<()> {
        let Some(record) = helper
            .get_from_global::<Map<String, Value>>(&TWO_FACTOR_TOKEN_RECORD)
            .await?
        else {
            return Ok(());
        };

        let emails = account_emails(helper).await?;
        let token = emails
            .iter()
            .find_map(|email| record.get(email))
            .or_else(|| record.values().next())
            .cloned();

        if let Some(token) = token {
            let mut global: Map<String, Value> = helper.get(GLOBAL_KEY).await?.unwrap_or_default();
            global.insert(TWO_FACTOR_TOKEN.to_string(), token);
            helper.set(GLOBAL_KEY, &global).await?;
        }
        helper.remove_from_global(&TWO_FACTOR_TOKEN_RECORD).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use state_store::MemoryStorage;
    use std::sync::Arc;

    fn migrator() -> TwoFactorTokenRecordMigrator {
        TwoFactorTokenRecordMigrator::from(MigratorBounds::new(13, 14).unwrap())
    }

    fn store() -> Value {
        json!({
            "global": { "twoFactorToken": "tok", "theme": "dark" },
            "authenticatedAccounts": ["u1", "u2", "u3"],
            "u1": { "profile": { "email": "a@example.com" } },
            "u2": { "profile": { "email": "b@example.com" } },
            "u3": { "profile": {} },
        })
    }

    #[tokio::test]
    async fn fans_token_into_record() {
        let storage = Arc::new(MemoryStorage::from_json(store()));
        let helper = MigrationHelper::new(13, storage.clone());

        migrator().migrate(&helper).await.unwrap();

        let snapshot = storage.snapshot();
        assert_eq!(
            snapshot["global_tokenDiskLocal_twoFactorTokenRecord"],
            json!({ "a@example.com": "tok", "b@example.com": "tok" })
        );
        assert_eq!(snapshot["global"], json!({ "theme": "dark" }));
    }

    #[tokio::test]
    async fn existing_record_entries_win() {
        let storage = Arc::new(MemoryStorage::from_json(json!({
            "global": { "twoFactorToken": "tok" },
            "global_tokenDiskLocal_twoFactorTokenRecord": { "a@example.com": "newer" },
            "authenticatedAccounts": ["u1"],
            "u1": { "profile": { "email": "a@example.com" } },
        })));
        let helper = MigrationHelper::new(13, storage.clone());

        migrator().migrate(&helper).await.unwrap();

        assert_eq!(
            storage.snapshot()["global_tokenDiskLocal_twoFactorTokenRecord"],
            json!({ "a@example.com": "newer" })
        );
    }

    #[tokio::test]
    async fn no_emails_keeps_legacy_token() {
        let storage = Arc::new(MemoryStorage::from_json(json!({
            "global": { "twoFactorToken": "tok" },
            "authenticatedAccounts": [],
        })));
        let helper = MigrationHelper::new(13, storage.clone());

        migrator().migrate(&helper).await.unwrap();
        assert_eq!(storage.write_count(), 0);
    }

    #[tokio::test]
    async fn round_trip() {
        let original = store();
        let storage = Arc::new(MemoryStorage::from_json(original.clone()));
        let migrator = migrator();

        migrator
            .migrate(&MigrationHelper::new(13, storage.clone()))
            .await
            .unwrap();
        migrator
            .rollback(&MigrationHelper::new(14, storage.clone()))
            .await
            .unwrap();

        assert_eq!(storage.snapshot(), MemoryStorage::from_json(original).snapshot());
    }
}
