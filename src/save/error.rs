use crate::persistence::PersistenceError;

/// Errors raised while building the save system.
///
/// Runtime failures of loads and saves are not reported through this type;
/// they surface through the state stream and completion callbacks instead.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// No tokio runtime to schedule persistence work on
    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Backend could not be set up
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Reason a commit was not scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommitRejection {
    /// The handle's local player has been dropped
    #[error("its local player is gone")]
    OwnerGone,

    #[error("its slot name is empty")]
    EmptySlotName,

    /// Exclusive commit requested while an earlier one has not reported back
    #[error("another save is in progress")]
    SaveInProgress,
}
