//! Core data model for the charter agent runtime: nodes, tools,
//! transitions, packs, instances, and messages.
//!
//! This crate sits at the bottom of the workspace's dependency graph
//! (no upward deps on any other `charter-*` crate). Concrete behavior
//! — name resolution, schema validation, tool dispatch — lives in the
//! crates above it; this crate only defines the shapes they operate
//! on and the trait seams (`ToolContext`, `CommandContext`,
//! `SystemPromptBuilder`) those crates implement.

pub mod charter;
pub mod command;
pub mod error;
pub mod instance;
pub mod message;
pub mod node;
pub mod pack;
pub mod serial;
pub mod step;
pub mod tool;
pub mod transition;

pub use charter::{Charter, DefaultPromptBuilder, PromptContext, SystemPromptBuilder};
pub use command::{Command, CommandContext, CommandFn, CommandFuture, CommandResult};
pub use error::{
    CommandError, ConfigError, ResolveError, ToolError, TransitionError, TreeError, ValidationError,
};
pub use instance::{ExecutorConfig, Instance, InstanceId, SuspendInfo, SuspendSource};
pub use message::{ContentBlock, InstanceEvent, Message, MessageMetadata, MessageSource, OutputBlock, Role};
pub use node::Node;
pub use pack::Pack;
pub use serial::{RefOr, SerialNode, SerialTransition};
pub use step::{Machine, MachineInput, Step, YieldReason, MAX_TREE_DEPTH};
pub use tool::{FnTool, SuspendRequest, ToolContext, ToolDyn, ToolFuture, ToolOutcome};
pub use transition::{
    CedeContent, NodeTarget, SpawnChild, Transition, TransitionContext, TransitionFn,
    TransitionFuture, TransitionResult,
};
