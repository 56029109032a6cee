//! Messages and content blocks exchanged between the runtime, the
//! inference backend, and tool calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::instance::{InstanceId, SuspendInfo};

/// The role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A human user.
    User,
    /// An AI assistant.
    Assistant,
    /// A system message.
    System,
    /// A synchronous, user-invoked command (spec §4.5).
    Command,
}

/// An application-specific output block, carried on assistant messages
/// produced by a tool-reply's `userMessage` half.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputBlock {
    /// Plain text output.
    Text(String),
    /// Structured, application-defined output.
    Structured(Value),
}

/// An internal event describing a mutation applied to an instance
/// during a step. These are emitted by the tool pipeline and the
/// transition handler, drained from the machine's queue, and applied
/// to the tree in order (spec §4.7 step 2c).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InstanceEvent {
    /// Node state changed.
    State {
        /// Instance whose state changed.
        instance_id: InstanceId,
        /// The new state.
        state: Value,
    },
    /// A pack's root-scoped state changed.
    PackState {
        /// Name of the pack whose state changed.
        pack: String,
        /// The new pack state.
        state: Value,
    },
    /// A transition was applied, replacing the instance with a new node.
    Transition {
        /// Instance that transitioned.
        instance_id: InstanceId,
        /// Target node id (or inline node, serialized elsewhere).
        to_node: String,
    },
    /// One or more children were appended to an instance.
    Spawn {
        /// Parent instance.
        instance_id: InstanceId,
        /// Newly created child instance ids.
        children: Vec<InstanceId>,
    },
    /// An instance ceded control back to its parent.
    Cede {
        /// Instance that ceded.
        instance_id: InstanceId,
    },
    /// An instance suspended pending external resume.
    Suspend {
        /// Instance that suspended.
        instance_id: InstanceId,
        /// The suspension record attached to it.
        info: SuspendInfo,
    },
}

/// A content block within a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text content.
    Text(String),
    /// Extended thinking from reasoning models.
    Thinking {
        /// The thinking text.
        thinking: String,
    },
    /// A tool invocation request from the assistant.
    ToolUse {
        /// Unique identifier for this tool call.
        id: String,
        /// Name of the tool to invoke.
        name: String,
        /// JSON input arguments.
        input: Value,
    },
    /// Result of a tool invocation.
    ToolResult {
        /// References the `id` from the corresponding `ToolUse`.
        tool_use_id: String,
        /// The tool-result content (already rendered to a value the
        /// inference backend can embed).
        content: Value,
        /// Whether this result represents an error.
        is_error: bool,
    },
    /// Application-specific output, not forwarded to the inference
    /// backend as conversational content.
    Output(OutputBlock),
    /// An internal runtime event, not forwarded to the inference
    /// backend.
    Instance(InstanceEvent),
}

/// Where a message originated, for filtering per-instance history
/// (spec: `getInstanceMessages()`) and for distinguishing externally
/// injected transcripts from inference-produced ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageSource {
    /// The instance that produced this message, if any.
    pub instance_id: Option<InstanceId>,
    /// True when the message was injected from outside inference
    /// (e.g. a resume payload), rather than produced by a model call.
    #[serde(default)]
    pub external: bool,
}

/// Metadata carried alongside a message's content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Origin of this message.
    pub source: Option<MessageSource>,
}

/// A message in the machine's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message author.
    pub role: Role,
    /// The content blocks of this message.
    pub content: Vec<ContentBlock>,
    /// Metadata about the message's origin.
    #[serde(default)]
    pub metadata: MessageMetadata,
}

impl Message {
    /// Create a user message with a single text block.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text(text.into())],
            metadata: MessageMetadata::default(),
        }
    }

    /// Create an assistant message with a single text block.
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::Text(text.into())],
            metadata: MessageMetadata::default(),
        }
    }

    /// Create a message carrying a single internal instance event.
    #[must_use]
    pub fn instance_event(event: InstanceEvent) -> Self {
        Self {
            role: Role::System,
            content: vec![ContentBlock::Instance(event)],
            metadata: MessageMetadata::default(),
        }
    }

    /// Tag this message as originating from the given instance.
    #[must_use]
    pub fn from_instance(mut self, instance_id: InstanceId) -> Self {
        self.metadata.source = Some(MessageSource {
            instance_id: Some(instance_id),
            external: false,
        });
        self
    }

    /// Tag this message as externally injected (e.g. a resume payload).
    #[must_use]
    pub fn external(mut self) -> Self {
        let source = self.metadata.source.get_or_insert(MessageSource::default());
        source.external = true;
        self
    }

    /// Extract concatenated text content, ignoring tool/instance blocks.
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}
