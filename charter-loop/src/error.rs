//! Errors the machine loop can surface outside the `Step` stream
//! itself.
//!
//! Most failure modes the spec names (transition misuse, unresolved
//! tool names, schema violations) are folded into a `Step` as an
//! error-text response rather than raised here — they're part of the
//! turn, not a fault in driving it. This enum is reserved for failures
//! that abort the stream outright: a hard backend fault, a hook
//! erroring, or a malformed resume request.

use charter_types::InstanceId;

/// Errors from driving a [`crate::run_machine`] stream.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum MachineError {
    /// The inference backend call itself failed.
    #[error(transparent)]
    Backend(#[from] charter_exec::BackendError),
    /// Applying a queued transition as tree surgery failed.
    #[error(transparent)]
    Transition(#[from] charter_types::TransitionError),
    /// A hook raised an error while firing.
    #[error(transparent)]
    Hook(#[from] charter_protocol::HookError),
    /// A resume input named an instance that isn't suspended.
    #[error("instance {0} is not suspended")]
    NotSuspended(InstanceId),
    /// A resume input's `suspend_id` didn't match the instance's
    /// current suspension.
    #[error("suspend id mismatch for instance {instance_id}: expected {expected}, got {actual}")]
    SuspendMismatch {
        /// The instance being resumed.
        instance_id: InstanceId,
        /// The suspension's actual id.
        expected: String,
        /// The id the caller supplied.
        actual: String,
    },
    /// A resume input named an instance that no longer exists.
    #[error("unknown instance {0}")]
    UnknownInstance(InstanceId),
}
