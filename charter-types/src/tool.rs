//! Tool definitions and the context passed to their `execute` calls.
//!
//! Mirrors the teacher's `ToolDyn`/`ToolRegistry` split (object-safe
//! trait + `Arc<dyn _>` storage) but widens the signature to carry the
//! spec's richer tool context (state access, instance-scoped message
//! history) and three-way outcome (plain value, user/LLM tool-reply,
//! or suspend marker).

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::error::ToolError;
use crate::instance::InstanceId;
use crate::message::{Message, OutputBlock};

/// A request to suspend the current instance pending an external
/// resume (spec §3 Lifecycle, §4.4 `suspend`).
#[derive(Debug, Clone)]
pub struct SuspendRequest {
    /// Caller-chosen id; the matching resume input must carry it back.
    pub suspend_id: String,
    /// Human-readable reason, surfaced to clients while suspended.
    pub reason: String,
    /// Opaque metadata passed through unchanged.
    pub metadata: Option<Value>,
}

/// What a tool call produced.
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    /// A plain value; becomes the tool-result content verbatim.
    Value(Value),
    /// Separate content for the user-facing transcript and for what
    /// the LLM sees as the tool result.
    Reply {
        /// Enqueued as an assistant-role output block; `None` if the
        /// tool has nothing user-facing to say.
        user_message: Option<OutputBlock>,
        /// Becomes the tool-result content seen by the model.
        llm_message: Value,
    },
    /// The tool wants the instance to suspend, as if the node had
    /// transitioned to a `suspend` outcome.
    Suspend(SuspendRequest),
}

/// Runtime context given to a tool's `execute` call.
///
/// Scoping rules (spec §4.3): a tool owned by the current node or the
/// charter gets writable node state; a tool owned by an ancestor gets
/// a read-only view (`update_state` returns
/// [`ToolError::AncestorReadOnly`]); a pack tool's `update_state`
/// writes pack state rather than node state, validated against the
/// pack's own schema. Which of these applies is decided by whoever
/// constructs the context (the tool pipeline), not by this trait.
pub trait ToolContext: Send + Sync {
    /// The instance this tool call is running against.
    fn instance_id(&self) -> InstanceId;

    /// A snapshot of the state this context exposes (node or pack
    /// state, depending on the tool's owner).
    fn state(&self) -> Value;

    /// Merge `patch` into the exposed state, validate the result, and
    /// — on success — make it the new exposed state. Fails without
    /// mutating anything if validation fails or the context is
    /// read-only.
    fn update_state(&self, patch: Value) -> Result<Value, ToolError>;

    /// History filtered to messages that originated from this
    /// instance (spec: `getInstanceMessages()`).
    fn instance_messages(&self) -> Vec<Message>;
}

/// A pinned, boxed future returned by [`ToolDyn::call`].
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<ToolOutcome, ToolError>> + Send + 'a>>;

/// Object-safe tool implementation.
///
/// Any tool source (a closure registered on a node, a pack tool, a
/// charter-wide tool) implements this trait; tools are stored as
/// `Arc<dyn ToolDyn>` so they can be shared across instances without
/// cloning their closures.
pub trait ToolDyn: Send + Sync {
    /// The tool's name, unique within whatever scope declares it.
    fn name(&self) -> &str;

    /// Human-readable description, surfaced to the inference backend.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's input.
    fn input_schema(&self) -> &Value;

    /// Whether a call to this tool should end the turn with
    /// `end_turn` rather than `tool_use` (spec §4.3 yield-reason
    /// rule). Most tools are not terminal.
    fn terminal(&self) -> bool {
        false
    }

    /// Execute the tool against the given input and context.
    fn call<'a>(&'a self, input: Value, ctx: &'a dyn ToolContext) -> ToolFuture<'a>;
}

/// A boxed-closure [`ToolDyn`] for the common case of a plain async fn
/// without its own named type. Used by `Node`/`Pack`/`Charter`
/// builders so callers don't need to hand-implement `ToolDyn` for
/// every tool.
pub struct FnTool<F> {
    name: String,
    description: String,
    input_schema: Value,
    terminal: bool,
    execute: F,
}

impl<F> FnTool<F>
where
    F: for<'a> Fn(Value, &'a dyn ToolContext) -> ToolFuture<'a> + Send + Sync,
{
    /// Wrap a closure as a [`ToolDyn`].
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        execute: F,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            terminal: false,
            execute,
        }
    }

    /// Mark this tool as terminal (spec §4.3 yield-reason rule).
    #[must_use]
    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }
}

impl<F> ToolDyn for FnTool<F>
where
    F: for<'a> Fn(Value, &'a dyn ToolContext) -> ToolFuture<'a> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    fn terminal(&self) -> bool {
        self.terminal
    }

    fn call<'a>(&'a self, input: Value, ctx: &'a dyn ToolContext) -> ToolFuture<'a> {
        (self.execute)(input, ctx)
    }
}
