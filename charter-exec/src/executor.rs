//! The standard executor (spec §4.6): one inference call per
//! invocation, followed by a hand-off to the tool pipeline when the
//! backend asks for tools. Worker leaves run the same path with an
//! empty user turn and without ending the outer step on `end_turn`.

use std::collections::HashMap;

use charter_resolve::AncestorLink;
use charter_tool::{run_tool_pipeline, PipelineInput, ToolCall};
use charter_types::{
    CedeContent, Charter, ContentBlock, InstanceId, Message, MessageMetadata, MessageSource, Node,
    Role, SuspendInfo, TransitionResult, YieldReason,
};
use serde_json::Value;

use crate::backend::{BackendBlock, BackendError, BackendMessage, InferRequest, InferenceBackend, StopReason};
use crate::prompt::{build_system_prompt, PromptInput};
use crate::toolset::collect_tool_definitions;

/// Everything one executor invocation needs.
pub struct ExecutorInput<'a> {
    /// The charter the instance runs against.
    pub charter: &'a Charter,
    /// The instance being advanced.
    pub instance_id: InstanceId,
    /// The node the instance currently realizes.
    pub node: &'a Node,
    /// Ancestor chain, nearest-first.
    pub ancestors: &'a [AncestorLink<'a>],
    /// Ancestor states, aligned index-for-index with `ancestors`.
    pub ancestor_states: &'a [Value],
    /// The instance's current state.
    pub node_state: Value,
    /// Active pack states, keyed by pack name. Ignored for worker
    /// invocations (spec §4.6).
    pub pack_states: HashMap<String, Value>,
    /// This instance's slice of history.
    pub history: &'a [Message],
    /// The new user input for this call; empty for a worker turn.
    pub user_input: Option<String>,
    /// `(current_step, max_steps)` for the step-remaining warning.
    pub step_budget: (usize, usize),
    /// Threshold (steps remaining) at which the warning is appended.
    pub step_warning_threshold: usize,
    /// Whether the active instance is a worker leaf.
    pub is_worker: bool,
}

/// Everything one executor invocation produced.
pub struct ExecutorOutput {
    /// The assistant's final text for this call, if any.
    pub response: Option<String>,
    /// Messages to append to history, in spec-mandated order.
    pub messages: Vec<Message>,
    /// The instance's state after this call.
    pub node_state: Value,
    /// Pack states that changed during this call.
    pub pack_state_updates: HashMap<String, Value>,
    /// The transition outcome to apply as tree surgery, if any.
    pub transition_result: Option<TransitionResult>,
    /// Why this call yielded.
    pub yield_reason: YieldReason,
    /// Content carried by a `cede` outcome, if that's what happened.
    pub cede_content: Option<CedeContent>,
    /// Suspension info, if that's why this call yielded.
    pub suspend_info: Option<SuspendInfo>,
}

/// Run one executor invocation: assemble the prompt and tool list,
/// call the backend exactly once, and either return immediately (no
/// tool calls) or hand the batch to the tool pipeline.
pub async fn run_executor(
    backend: &dyn InferenceBackend,
    input: ExecutorInput<'_>,
) -> Result<ExecutorOutput, BackendError> {
    let empty_pack_states = HashMap::new();
    let prompt_packs = if input.is_worker { &empty_pack_states } else { &input.pack_states };
    let system = build_system_prompt(&PromptInput {
        charter: input.charter,
        node: input.node,
        node_state: &input.node_state,
        ancestors: input.ancestors,
        ancestor_states: input.ancestor_states,
        pack_states: prompt_packs,
        is_worker: input.is_worker,
        step_budget: input.step_budget,
        step_warning_threshold: input.step_warning_threshold,
    });

    let tools = collect_tool_definitions(input.charter, input.node, input.ancestors, input.is_worker);
    let history = to_backend_history(input.history);
    let user = input.user_input.unwrap_or_default();

    tracing::debug!(instance_id = %input.instance_id, node = %input.node.id, "charter.exec.infer");
    let response = backend
        .infer(InferRequest { system, tools, history, user })
        .await?;

    let assistant_content: Vec<ContentBlock> =
        response.content.iter().map(backend_block_to_content).collect();
    let response_text = extract_text(&assistant_content);
    let tool_calls = extract_tool_calls(&response.content);

    let assistant_message = Message {
        role: Role::Assistant,
        content: assistant_content,
        metadata: MessageMetadata {
            source: Some(MessageSource { instance_id: Some(input.instance_id), external: false }),
        },
    };

    if tool_calls.is_empty() {
        let yield_reason = match response.stop_reason {
            StopReason::MaxTokens => YieldReason::MaxTokens,
            StopReason::EndTurn | StopReason::ToolUse if input.is_worker => {
                tracing::warn!(
                    instance_id = %input.instance_id,
                    node = %input.node.id,
                    "charter.exec.worker_end_turn_ignored"
                );
                YieldReason::ToolUse
            }
            StopReason::EndTurn | StopReason::ToolUse => YieldReason::EndTurn,
        };
        return Ok(ExecutorOutput {
            response: response_text,
            messages: vec![assistant_message],
            node_state: input.node_state,
            pack_state_updates: HashMap::new(),
            transition_result: None,
            yield_reason,
            cede_content: None,
            suspend_info: None,
        });
    }

    tracing::debug!(
        instance_id = %input.instance_id,
        calls = tool_calls.len(),
        "charter.exec.tool_use"
    );
    let any_terminal = tool_calls.iter().any(|call| {
        charter_resolve::resolve_tool(input.charter, input.instance_id, input.node, input.ancestors, &call.name)
            .map(|resolved| resolved.tool.terminal())
            .unwrap_or(false)
    });

    let pipeline_output = run_tool_pipeline(PipelineInput {
        charter: input.charter,
        instance_id: input.instance_id,
        node: input.node,
        ancestors: input.ancestors,
        node_state: input.node_state,
        pack_states: input.pack_states,
        history: input.history,
        calls: tool_calls,
        any_terminal,
    })
    .await;

    let mut messages = vec![assistant_message];
    messages.extend(pipeline_output.messages);

    Ok(ExecutorOutput {
        response: response_text,
        messages,
        node_state: pipeline_output.node_state,
        pack_state_updates: pipeline_output.pack_state_updates,
        transition_result: pipeline_output.transition_result,
        yield_reason: pipeline_output.yield_reason,
        cede_content: pipeline_output.cede_content,
        suspend_info: pipeline_output.suspend_info,
    })
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User | Role::Command => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

fn to_backend_block(block: &ContentBlock) -> Option<BackendBlock> {
    match block {
        ContentBlock::Text(text) => Some(BackendBlock::Text { text: text.clone() }),
        ContentBlock::Thinking { thinking } => Some(BackendBlock::Thinking { thinking: thinking.clone() }),
        ContentBlock::ToolUse { id, name, input } => {
            Some(BackendBlock::ToolUse { id: id.clone(), name: name.clone(), input: input.clone() })
        }
        ContentBlock::ToolResult { tool_use_id, content, is_error } => Some(BackendBlock::ToolResult {
            tool_use_id: tool_use_id.clone(),
            content: content.clone(),
            is_error: *is_error,
        }),
        // Application output and internal events never go back to the backend.
        ContentBlock::Output(_) | ContentBlock::Instance(_) => None,
    }
}

fn to_backend_history(history: &[Message]) -> Vec<BackendMessage> {
    history
        .iter()
        .filter_map(|message| {
            let content: Vec<BackendBlock> = message.content.iter().filter_map(to_backend_block).collect();
            if content.is_empty() {
                None
            } else {
                Some(BackendMessage { role: role_str(message.role).to_string(), content })
            }
        })
        .collect()
}

fn backend_block_to_content(block: &BackendBlock) -> ContentBlock {
    match block {
        BackendBlock::Text { text } => ContentBlock::Text(text.clone()),
        BackendBlock::Thinking { thinking } => ContentBlock::Thinking { thinking: thinking.clone() },
        BackendBlock::ToolUse { id, name, input } => {
            ContentBlock::ToolUse { id: id.clone(), name: name.clone(), input: input.clone() }
        }
        BackendBlock::ToolResult { tool_use_id, content, is_error } => ContentBlock::ToolResult {
            tool_use_id: tool_use_id.clone(),
            content: content.clone(),
            is_error: *is_error,
        },
    }
}

fn extract_tool_calls(blocks: &[BackendBlock]) -> Vec<ToolCall> {
    blocks
        .iter()
        .filter_map(|block| match block {
            BackendBlock::ToolUse { id, name, input } => {
                Some(ToolCall { id: id.clone(), name: name.clone(), input: input.clone() })
            }
            _ => None,
        })
        .collect()
}

fn extract_text(blocks: &[ContentBlock]) -> Option<String> {
    let text: String = blocks
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text(text) => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("");
    (!text.is_empty()).then_some(text)
}
