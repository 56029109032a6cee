//! The facade's error type: a single enum a caller of the public API
//! can match on, converting from whichever lower crate actually raised
//! the failure.

use charter_types::{CommandError, ConfigError, ResolveError, ValidationError};
use charter_wire::WireError;

/// Errors surfaced by the facade's `create_*`/`run_*` functions.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum CharterError {
    /// Charter/node construction failed (duplicate ids, scope
    /// collisions, missing executor).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A name failed to resolve while validating charter construction.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// A machine's initial state failed schema validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Driving the machine loop failed.
    #[error(transparent)]
    Machine(#[from] charter_loop::MachineError),

    /// Running a command failed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Serialization, hydration, or client projection failed.
    #[error(transparent)]
    Wire(#[from] WireError),
}
