//! Versioned key addressing.
//!
//! Up to [`NAMESPACED_KEYS_VERSION`] every location was a hand-written flat
//! key (`"global"`, `"<userId>"`, `"authenticatedAccounts"`). From that
//! version on, state lives under keys derived from a [`KeyDefinition`]:
//!
//! ```text
//! global_<state>_<key>
//! user_<userId>_<state>_<key>
//! ```
//!
//! The builders refuse to run for older versions: a migrator from the flat
//! era asking for a namespaced key is a bug, not a data problem.

use crate::error::{MigrationError, MigrationResult};

/// First schema version whose state is stored under namespaced keys.
pub const NAMESPACED_KEYS_VERSION: u32 = 9;

/// A named group of related state (the `<state>` part of a key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateDefinition {
    name: &'static str,
}

impl StateDefinition {
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// One namespaced storage location: a state definition plus a field key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyDefinition {
    state: StateDefinition,
    key: &'static str,
}

impl KeyDefinition {
    pub const fn new(state: &'static str, key: &'static str) -> Self {
        Self {
            state: StateDefinition::new(state),
            key,
        }
    }

    pub const fn with_state(state: StateDefinition, key: &'static str) -> Self {
        Self { state, key }
    }

    pub fn state(&self) -> StateDefinition {
        self.state
    }

    pub fn key(&self) -> &'static str {
        self.key
    }
}

/// Map of every known account, keyed by user id.
pub const ACCOUNT_ACCOUNTS: KeyDefinition = KeyDefinition::new("account", "accounts");

/// Id of the account currently in use.
pub const ACCOUNT_ACTIVE_ACCOUNT_ID: KeyDefinition =
    KeyDefinition::new("account", "activeAccountId");

fn ensure_namespaced(current_version: u32) -> MigrationResult<()> {
    if current_version < NAMESPACED_KEYS_VERSION {
        return Err(MigrationError::KeyBuilderUnavailable {
            current: current_version,
            introduced: NAMESPACED_KEYS_VERSION,
        });
    }
    Ok(())
}

/// Flat key of a global (shared by all accounts) location.
pub fn global_key(current_version: u32, def: &KeyDefinition) -> MigrationResult<String> {
    ensure_namespaced(current_version)?;
    Ok(format!("global_{}_{}", def.state.name, def.key))
}

/// Flat key of a location private to `user_id`.
pub fn user_key(current_version: u32, user_id: &str, def: &KeyDefinition) -> MigrationResult<String> {
    ensure_namespaced(current_version)?;
    Ok(format!("user_{}_{}_{}", user_id, def.state.name, def.key))
}
