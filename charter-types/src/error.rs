//! Error taxonomy for the charter runtime.
//!
//! Mirrors the categories laid out by the spec's error-handling design:
//! validation and resolution failures are returned as values and never
//! abort a turn; configuration errors are raised at charter-build time;
//! cycle/depth errors indicate a programming bug in the charter itself.

use thiserror::Error;

/// A state or pack-state patch failed schema validation.
#[non_exhaustive]
#[derive(Debug, Clone, Error)]
#[error("validation failed: {0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    /// Build a validation error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Name resolution failed while walking the scope chain.
#[non_exhaustive]
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// No tool or transition of this name is visible from the instance.
    #[error("unknown name: {0}")]
    UnknownName(String),

    /// A `{ ref }` transition or node reference did not resolve against
    /// the charter's registries.
    #[error("unknown ref: {0}")]
    UnknownRef(String),

    /// Two entries in the *same* scope collide on name (e.g. a node
    /// tool and a node transition sharing a name). Shadowing across
    /// scopes is fine; collisions within one scope are a configuration
    /// bug.
    #[error("name collision within scope: {0}")]
    ScopeCollision(String),
}

/// Raised at charter/node/pack construction time. These are bugs, not
/// runtime conditions — they never occur mid-turn.
#[non_exhaustive]
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// A tool name collides with a transition/built-in name in the same
    /// node, or a commands map key doesn't match its command's own idea
    /// of its name.
    #[error("configuration error: {0}")]
    Invalid(String),

    /// A charter was built with no executor configured.
    #[error("charter has no executor configured")]
    MissingExecutor,
}

/// Errors from tool execution, surfaced as failed tool-result content
/// rather than aborting the turn (spec §7: "tool execution error").
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ToolError {
    /// The named tool is not visible from the calling instance.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// Input failed the tool's declared schema.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The tool's `execute` future returned an error.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// A tool owned by an ancestor attempted to mutate state. Ancestor
    /// state is read-only from a descendant's tool context.
    #[error("ancestor state is read-only")]
    AncestorReadOnly,

    /// A state patch failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A second transition tool call arrived after one was already
    /// queued for this step (spec invariant 8: at most one transition
    /// per inference response).
    #[error("a transition is already queued for this step")]
    TransitionAlreadyQueued,

    /// Name resolution failed while routing a tool call.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Errors from applying a queued transition to the instance tree.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TransitionError {
    /// `transition-to` supplied no state and the target node has no
    /// initial state to fall back on.
    #[error("transition-to requires state: target node has no initial state")]
    MissingState,

    /// The transition's own `execute` returned an error.
    #[error("transition execution failed: {0}")]
    ExecutionFailed(String),

    /// Name/ref resolution failed while applying the transition.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The resulting state failed validation against the target node.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Errors from the command executor (spec §4.5, §7).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CommandError {
    /// No such instance in the tree.
    #[error("instance not found: {0}")]
    InstanceNotFound(String),

    /// Neither the node nor any of its packs declares this command.
    #[error("command not found: {0}")]
    NotFound(String),

    /// Command input failed its declared schema.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The command's `execute` future returned an error.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// The command's result required applying a transition outcome and
    /// that application failed.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// A resume command referenced a `suspendId` that no suspended
    /// instance carries.
    #[error("no suspended instance with id: {0}")]
    SuspendMismatch(String),
}

/// Tree traversal exceeded the depth cap or revisited an id — a
/// programming bug in charter construction, not a runtime condition.
#[non_exhaustive]
#[derive(Debug, Clone, Error)]
pub enum TreeError {
    /// The instance tree exceeded the configured depth cap.
    #[error("instance tree exceeds depth cap of {0}")]
    DepthExceeded(usize),

    /// An id was encountered twice during traversal, implying a cycle.
    #[error("cycle detected at instance: {0}")]
    Cycle(String),

    /// The referenced instance id is not present in the tree's arena.
    #[error("no such instance: {0}")]
    MissingInstance(String),
}
