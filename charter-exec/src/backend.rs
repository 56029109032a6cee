//! The inference backend contract (spec §6: "Inference backend
//! (consumed)"). The runtime treats this as a single-method interface
//! — one implementation per provider, plus test doubles — per Design
//! Notes ("Dynamic dispatch").

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool definition offered to the inference backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name, unique within the request.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's input.
    pub input_schema: Value,
}

/// A content block as produced or consumed by the inference backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendBlock {
    /// Plain text.
    Text { text: String },
    /// Extended thinking.
    Thinking { thinking: String },
    /// A tool invocation request.
    ToolUse { id: String, name: String, input: Value },
    /// A tool result being sent back to the backend.
    ToolResult { tool_use_id: String, content: Value, is_error: bool },
}

/// One entry of conversation history as sent to the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendMessage {
    /// `"user"`, `"assistant"`, or `"system"`.
    pub role: String,
    /// The message's content blocks.
    pub content: Vec<BackendBlock>,
}

/// Why the backend stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural completion with no further tool calls.
    EndTurn,
    /// The backend wants to invoke one or more tools.
    ToolUse,
    /// The backend's own token budget was exhausted.
    MaxTokens,
}

/// A single inference request (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferRequest {
    /// The assembled system prompt.
    pub system: String,
    /// Tool definitions, in C2 priority order.
    pub tools: Vec<ToolDefinition>,
    /// Conversation history.
    pub history: Vec<BackendMessage>,
    /// The new user input for this call.
    pub user: String,
}

/// The backend's response to one [`InferRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferResponse {
    /// Response content blocks.
    pub content: Vec<BackendBlock>,
    /// Why generation stopped.
    pub stop_reason: StopReason,
}

/// Errors from calling the inference backend.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend call itself failed (network, auth, rate limit).
    #[error("inference backend error: {0}")]
    RequestFailed(String),
}

/// A pluggable inference backend. Exactly one method: request in,
/// response out. Implementations wrap a specific provider's API;
/// test doubles implement this directly for deterministic executor
/// tests.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Run one inference call.
    async fn infer(&self, request: InferRequest) -> Result<InferResponse, BackendError>;
}
