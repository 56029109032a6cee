//! Errors for the protocol traits in this crate.

use thiserror::Error;

/// Errors a hook may raise while observing or intervening.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum HookError {
    /// The hook itself failed (not a halt decision — an actual fault).
    #[error("hook failed: {0}")]
    Failed(String),

    /// Catch-all for hook implementations with their own error types.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from a persistence adapter.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PersistError {
    /// No session with this id exists in the backing store.
    #[error("session not found: {0}")]
    NotFound(String),

    /// The stored snapshot failed to deserialize (version skew, corruption).
    #[error("corrupt snapshot: {0}")]
    Corrupt(String),

    /// The write itself failed.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// Catch-all for backend-specific failures.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
