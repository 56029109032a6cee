//! Cross-cutting protocol traits shared by the runtime's upper crates:
//! observability hooks and the session-persistence boundary.
//!
//! Kept separate from `charter-types` because these traits are
//! consumed by multiple independent crates (`charter-loop`,
//! `charter-hooks`, `charter-wire`, `charter-store-memory`) that
//! otherwise have no reason to depend on each other.

pub mod error;
pub mod hook;
pub mod persist;

pub use error::{HookError, PersistError};
pub use hook::{fire_hooks, Hook, HookAction, HookContext, HookPoint};
pub use persist::{PersistenceAdapter, SessionSummary, Snapshot};
