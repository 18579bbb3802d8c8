use state_store::StorageError;
use thiserror::Error;

/// Error during a migration pass or while assembling a chain.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MigrationError {
    /// A migrator was constructed with `from >= to`.
    #[error("invalid migrator bounds: v{from} must be lower than v{to}")]
    InvalidBounds { from: u32, to: u32 },

    /// `rollback_to` was asked for a version outside the shipped chain.
    #[error("cannot roll back to v{target}: target must be between v{min} and v{max}")]
    InvalidRollbackTarget { target: u32, min: u32, max: u32 },

    /// An appended entry does not continue the chain built so far.
    #[error("migration chain is not contiguous: expected v{expected}, found v{found}")]
    NonContiguousChain { expected: u32, found: u32 },

    /// The store is older than the oldest version the chain can upgrade.
    #[error(
        "Your local data is too old to be migrated. Your current state version is {current}, \
         but minimum version is {minimum}."
    )]
    TooOld { current: u32, minimum: u32 },

    /// A version marker is present but is not a non-negative integer.
    #[error("unreadable state version at {key}: {value}")]
    UnreadableVersion { key: String, value: String },

    /// The step has no valid inverse.
    #[error("migration step is irreversible")]
    Irreversible,

    /// A namespaced key was resolved before namespaced addressing existed.
    #[error("no key builder should be used for versions prior to {introduced} (current v{current})")]
    KeyBuilderUnavailable { current: u32, introduced: u32 },

    /// A migration step found data it cannot work with.
    #[error("migration v{from}→v{to} failed: {reason}")]
    StepFailed { from: u32, to: u32, reason: String },

    /// A stored value did not have the expected shape.
    #[error("deserialization error for key {key}: {reason}")]
    Deserialization { key: String, reason: String },

    /// A value could not be turned into JSON.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Error from the storage port.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type alias for [`MigrationError`].
pub type MigrationResult<T> = Result<T, MigrationError>;
