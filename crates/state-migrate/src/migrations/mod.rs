//! The concrete schema changes, one module per step.
//!
//! Each migrator inspects untyped JSON: a missing account, a missing legacy
//! field, or a missing namespaced value means "nothing to do" and produces
//! no writes.

use std::future::Future;

use futures::future::try_join_all;
use serde_json::{Map, Value};

use crate::error::MigrationResult;
use crate::helper::{AccountEntry, MigrationHelper};

mod add_key_type_to_org_keys;
mod badge_settings;
mod clear_clipboard_delay;
mod enable_passkeys;
mod known_accounts;
mod last_sync;
mod move_biometric_auto_prompt;
mod move_browser_settings_to_global;
mod move_state_version;
mod remove_ever_been_unlocked;
mod remove_legacy_etm_key;
mod two_factor_token_record;
mod vault_timeout_settings;

pub use add_key_type_to_org_keys::AddKeyTypeToOrgKeysMigrator;
pub use badge_settings::{BadgeSettingsMigrator, ENABLE_BADGE_COUNTER};
pub use clear_clipboard_delay::{ClearClipboardDelayMigrator, CLEAR_CLIPBOARD_DELAY};
pub use enable_passkeys::{EnablePasskeysMigrator, ENABLE_PASSKEYS};
pub use known_accounts::KnownAccountsMigrator;
pub use last_sync::{LastSyncMigrator, LAST_SYNC};
pub use move_biometric_auto_prompt::MoveBiometricAutoPromptToAccountMigrator;
pub use move_browser_settings_to_global::MoveBrowserSettingsToGlobalMigrator;
pub use move_state_version::MoveStateVersionMigrator;
pub use remove_ever_been_unlocked::RemoveEverBeenUnlockedMigrator;
pub use remove_legacy_etm_key::RemoveLegacyEtmKeyMigrator;
pub use two_factor_token_record::{TwoFactorTokenRecordMigrator, TWO_FACTOR_TOKEN_RECORD};
pub use vault_timeout_settings::{VaultTimeoutSettingsMigrator, VAULT_TIMEOUT, VAULT_TIMEOUT_ACTION};

/// Run `f` for every known account concurrently and wait for all of them.
pub(crate) async fn for_each_account<F, Fut>(helper: &MigrationHelper, f: F) -> MigrationResult<()>
where
    F: FnMut(AccountEntry<Value>) -> Fut,
    Fut: Future<Output = MigrationResult<()>>,
{
    let accounts = helper.get_accounts::<Value>().await?;
    try_join_all(accounts.into_iter().map(f)).await?;
    Ok(())
}

/// Value at `path`, if every segment exists.
pub(crate) fn get_path<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |node, segment| node.get(*segment))
}

/// Remove and return the leaf at `path`.
pub(crate) fn remove_path(value: &mut Value, path: &[&str]) -> Option<Value> {
    let (leaf, parents) = path.split_last()?;
    let mut node = value;
    for segment in parents {
        node = node.get_mut(*segment)?;
    }
    node.as_object_mut()?.remove(*leaf)
}

/// Write `new` at `path`, creating (or replacing non-object) parents.
pub(crate) fn set_path(value: &mut Value, path: &[&str], new: Value) {
    let Some((leaf, parents)) = path.split_last() else {
        *value = new;
        return;
    };
    let mut node = value;
    for segment in parents {
        node = object_mut(node)
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    object_mut(node).insert(leaf.to_string(), new);
}

fn object_mut(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just made an object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_path_walks_objects() {
        let doc = json!({ "settings": { "a": { "b": 1 } } });
        assert_eq!(get_path(&doc, &["settings", "a", "b"]), Some(&json!(1)));
        assert_eq!(get_path(&doc, &["settings", "missing"]), None);
        assert_eq!(get_path(&json!(5), &["settings"]), None);
    }

    #[test]
    fn remove_path_takes_leaf_only() {
        let mut doc = json!({ "settings": { "a": true, "b": false } });
        assert_eq!(remove_path(&mut doc, &["settings", "a"]), Some(json!(true)));
        assert_eq!(doc, json!({ "settings": { "b": false } }));
        assert_eq!(remove_path(&mut doc, &["settings", "a"]), None);
        assert_eq!(remove_path(&mut doc, &["nope", "a"]), None);
    }

    #[test]
    fn set_path_creates_parents() {
        let mut doc = json!({});
        set_path(&mut doc, &["settings", "flag"], json!(true));
        assert_eq!(doc, json!({ "settings": { "flag": true } }));

        let mut doc = json!({ "settings": null });
        set_path(&mut doc, &["settings", "flag"], json!(1));
        assert_eq!(doc, json!({ "settings": { "flag": 1 } }));
    }
}
