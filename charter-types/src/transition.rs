//! Transitions: the discriminated-union outcome a node's control flow
//! produces, and the charter-level declarations that can yield one.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::error::TransitionError;
use crate::instance::{ExecutorConfig, InstanceId};
use crate::message::Message;
use crate::serial::RefOr;

/// Where a transition or spawn sends control: a charter-registered
/// node name, or an inline definition supplied at call time (spec
/// §4.8, `General` transitions).
pub type NodeTarget = RefOr<crate::serial::SerialNode>;

/// Content attached to a `cede` outcome, handed back to the parent.
#[derive(Debug, Clone)]
pub enum CedeContent {
    /// A single text summary.
    Text(String),
    /// A full set of messages to splice into the parent's history.
    Messages(Vec<Message>),
}

/// A child to create as part of a `spawn` outcome.
#[derive(Debug, Clone)]
pub struct SpawnChild {
    /// The node the new child instance realizes.
    pub node: NodeTarget,
    /// Initial state for the new instance; falls back to the node's
    /// own `initial_state` when `None`.
    pub state: Option<Value>,
    /// Executor override cascaded onto the new instance.
    pub executor_config: Option<ExecutorConfig>,
    /// Whether this child runs as a worker (parallel, non-primary)
    /// leaf rather than the primary leaf (spec §3: "primary vs. worker
    /// leaves").
    pub worker: bool,
}

/// The outcome of applying a transition: tree surgery the engine
/// performs against the instance arena (spec §4.4).
#[derive(Debug, Clone)]
pub enum TransitionResult {
    /// Replace the current instance's node and state in place.
    TransitionTo {
        /// The node to transition to.
        node: NodeTarget,
        /// New state; `None` falls back to the target node's
        /// `initial_state`, and it is an error (`MissingState`) if
        /// neither is present.
        state: Option<Value>,
        /// Executor override cascaded onto the transitioned instance.
        executor_config: Option<ExecutorConfig>,
    },
    /// Append one or more children to the current instance.
    Spawn {
        /// The children to create.
        children: Vec<SpawnChild>,
    },
    /// End the current instance's turn and hand control back to its
    /// parent, carrying optional content forward.
    Cede {
        /// Content surfaced to the parent, if any.
        content: Option<CedeContent>,
    },
    /// Pause the current instance pending an external resume.
    Suspend {
        /// Id the matching resume input must echo back.
        suspend_id: String,
        /// Human-readable reason surfaced to clients while suspended.
        reason: String,
        /// Opaque metadata passed through unchanged.
        metadata: Option<Value>,
    },
}

/// Runtime context given to a transition's `execute` call.
pub struct TransitionContext {
    /// The instance the transition is running against.
    pub instance_id: InstanceId,
    /// Call-time arguments, validated against the transition's
    /// `arguments` schema.
    pub args: Value,
}

/// A pinned, boxed future returned by a code transition's `execute`.
pub type TransitionFuture<'a> =
    Pin<Box<dyn Future<Output = Result<TransitionResult, TransitionError>> + Send + 'a>>;

/// Object-safe transition body, parameterized over call-time
/// arguments, producing a [`TransitionResult`].
pub trait TransitionFn: Send + Sync {
    /// Run the transition body.
    fn call<'a>(&'a self, ctx: TransitionContext) -> TransitionFuture<'a>;
}

impl<F> TransitionFn for F
where
    F: for<'a> Fn(TransitionContext) -> TransitionFuture<'a> + Send + Sync,
{
    fn call<'a>(&'a self, ctx: TransitionContext) -> TransitionFuture<'a> {
        self(ctx)
    }
}

/// A charter-declared transition.
///
/// `Code` is the general case: arbitrary logic producing any
/// `TransitionResult`. `Serial` and `General` are the two shapes the
/// spec singles out for direct LLM invocation without a backing
/// closure — `Serial` always transitions to the same pre-registered
/// target node, `General` lets the call supply the target node inline
/// (spec §4.8).
#[derive(Clone)]
pub enum Transition {
    /// Arbitrary transition logic.
    Code {
        /// Description surfaced to the inference backend.
        description: String,
        /// JSON Schema for call-time arguments, if any.
        arguments_schema: Option<Value>,
        /// The transition body.
        execute: std::sync::Arc<dyn TransitionFn>,
    },
    /// Always transitions to a fixed, pre-registered target node.
    Serial {
        /// Description surfaced to the inference backend.
        description: String,
        /// The fixed target node.
        node: NodeTarget,
    },
    /// Transitions to a node supplied inline at call time.
    General {
        /// Description surfaced to the inference backend.
        description: String,
    },
}

impl std::fmt::Debug for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Code { description, .. } => {
                f.debug_struct("Code").field("description", description).finish()
            }
            Self::Serial { description, node } => f
                .debug_struct("Serial")
                .field("description", description)
                .field("node", node)
                .finish(),
            Self::General { description } => {
                f.debug_struct("General").field("description", description).finish()
            }
        }
    }
}
