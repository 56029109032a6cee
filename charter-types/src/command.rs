//! Commands: synchronous, externally-invoked operations against a
//! live instance, distinct from tool calls made by the model mid-turn
//! (spec §4.5).

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::error::CommandError;
use crate::instance::InstanceId;
use crate::message::Message;
use crate::transition::TransitionResult;

/// Runtime context given to a command's `execute` call. Mirrors
/// [`crate::tool::ToolContext`]; commands and tools share the same
/// state-scoping rules.
pub trait CommandContext: Send + Sync {
    /// The instance this command is running against.
    fn instance_id(&self) -> InstanceId;

    /// A snapshot of the state this context exposes.
    fn state(&self) -> Value;

    /// Merge `patch` into the exposed state, validating the result.
    fn update_state(&self, patch: Value) -> Result<Value, CommandError>;

    /// History filtered to messages that originated from this
    /// instance.
    fn instance_messages(&self) -> Vec<Message>;
}

/// What a command produced.
#[derive(Debug, Clone)]
pub enum CommandResult {
    /// A plain value, returned directly to the caller.
    Value(Value),
    /// Resume a suspended instance, clearing its suspension and
    /// letting the step loop resume inference on it.
    Resume,
    /// Apply a transition outcome as if a model-invoked transition
    /// tool had produced it.
    Transition(TransitionResult),
}

/// A pinned, boxed future returned by [`CommandFn::call`].
pub type CommandFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CommandResult, CommandError>> + Send + 'a>>;

/// Object-safe command body.
pub trait CommandFn: Send + Sync {
    /// Run the command body.
    fn call<'a>(&'a self, input: Value, ctx: &'a dyn CommandContext) -> CommandFuture<'a>;
}

/// A charter- or pack-declared command.
pub struct Command {
    /// The command's name, unique within whatever scope declares it.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the command's input, if any.
    pub input_schema: Option<Value>,
    /// The command body.
    pub execute: std::sync::Arc<dyn CommandFn>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}
