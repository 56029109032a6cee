//! The tool pipeline (spec §4.3): built-in tools, scoped dispatch to
//! node/ancestor/pack/charter tools, and transition queuing.

use std::collections::HashMap;
use std::sync::Arc;

use charter_resolve::{resolve_tool, AncestorLink, ToolOwner};
use charter_schema::{NullValidator, SchemaValidator};
use charter_types::{
    CedeContent, Charter, ContentBlock, InstanceId, Message, MessageMetadata, MessageSource, Node,
    OutputBlock, Role, SpawnChild, SuspendInfo, ToolContext, ToolError, ToolOutcome, Transition,
    TransitionContext, TransitionError, TransitionResult, YieldReason,
};
use serde_json::Value;

use crate::context::{ReadOnlyAncestorContext, WritableNodeContext, WritablePackContext, WritableState};

/// A single tool-use block, as produced by the inference backend.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Id correlating this call to its result.
    pub id: String,
    /// The tool (or built-in) name invoked.
    pub name: String,
    /// The call's input.
    pub input: Value,
}

/// Everything the pipeline needs to process one batch of tool calls.
pub struct PipelineInput<'a> {
    /// The charter the instance runs against.
    pub charter: &'a Charter,
    /// The instance making these calls.
    pub instance_id: InstanceId,
    /// The node the instance currently realizes.
    pub node: &'a Node,
    /// Ancestor chain, nearest-first.
    pub ancestors: &'a [AncestorLink<'a>],
    /// The instance's current state before this batch runs.
    pub node_state: Value,
    /// Current pack states, keyed by pack name (root-instance scoped,
    /// but the pipeline only ever sees the working copies it needs).
    pub pack_states: HashMap<String, Value>,
    /// This instance's message history, for `instance_messages()`.
    pub history: &'a [Message],
    /// The calls to process, in order.
    pub calls: Vec<ToolCall>,
    /// Whether any tool in this batch is terminal, overriding the
    /// default `tool_use` yield reason with `end_turn` (spec §4.3).
    pub any_terminal: bool,
}

/// What a `transition`/`transition_<name>` call queued, pending
/// resolution once the whole batch has been processed.
struct QueuedTransition {
    name: String,
    reason: Option<String>,
    args: Value,
}

/// Everything the pipeline produced from one batch.
pub struct PipelineOutput {
    /// Messages to append to history, in spec-mandated order: state →
    /// packState(s) → tool-results → tool-reply outputs → transition.
    pub messages: Vec<Message>,
    /// The instance's state after this batch (unchanged if no tool
    /// wrote to it).
    pub node_state: Value,
    /// Pack states that changed during this batch.
    pub pack_state_updates: HashMap<String, Value>,
    /// The transition outcome to apply as tree surgery, if any
    /// transition was queued and successfully resolved.
    pub transition_result: Option<TransitionResult>,
    /// Final yield reason for this batch.
    pub yield_reason: YieldReason,
    /// Content carried by a `cede` transition outcome, if that's what
    /// happened.
    pub cede_content: Option<CedeContent>,
    /// Suspension info, if a `suspend` outcome (from a transition or a
    /// tool's own suspend return) occurred.
    pub suspend_info: Option<SuspendInfo>,
}

/// Run a batch of tool calls to completion (spec §4.3-§4.4).
pub async fn run_tool_pipeline(input: PipelineInput<'_>) -> PipelineOutput {
    let node_validator: Box<dyn SchemaValidator> =
        charter_schema::JsonSchemaValidator::compile(&input.node.state_schema)
            .map(|v| Box::new(v) as Box<dyn SchemaValidator>)
            .unwrap_or_else(|_| Box::new(NullValidator));
    let node_state = WritableState::new(input.node_state.clone(), node_validator.as_ref());

    let mut pack_validators: HashMap<String, Box<dyn SchemaValidator>> = HashMap::new();
    let mut pack_states: HashMap<String, Arc<WritableState<'_>>> = HashMap::new();
    for pack_name in &input.node.packs {
        if let Some(pack) = input.charter.pack(pack_name) {
            let validator = charter_schema::JsonSchemaValidator::compile(&pack.state_schema)
                .map(|v| Box::new(v) as Box<dyn SchemaValidator>)
                .unwrap_or_else(|_| Box::new(NullValidator));
            pack_validators.insert(pack_name.clone(), validator);
        }
    }
    for (name, validator) in &pack_validators {
        let initial = input
            .pack_states
            .get(name)
            .cloned()
            .unwrap_or(Value::Object(Default::default()));
        pack_states.insert(name.clone(), Arc::new(WritableState::new(initial, validator.as_ref())));
    }

    let mut tool_result_blocks: Vec<ContentBlock> = Vec::new();
    let mut output_blocks: Vec<OutputBlock> = Vec::new();
    let mut queued_transition: Option<QueuedTransition> = None;
    let mut suspend_info: Option<SuspendInfo> = None;
    let mut changed_packs: Vec<String> = Vec::new();

    for call in &input.calls {
        if call.name == "updateState" {
            let patch = call.input.clone();
            match node_state.update(patch) {
                Ok(new_state) => tool_result_blocks.push(success_result(&call.id, &new_state)),
                Err(err) => tool_result_blocks.push(error_result(&call.id, &err.to_string())),
            }
            continue;
        }

        if call.name == "transition" {
            if queued_transition.is_some() {
                tool_result_blocks.push(error_result(
                    &call.id,
                    &ToolError::TransitionAlreadyQueued.to_string(),
                ));
                continue;
            }
            let to = call.input.get("to").and_then(Value::as_str).map(str::to_string);
            let reason = call.input.get("reason").and_then(Value::as_str).map(str::to_string);
            match to {
                Some(name) => {
                    queued_transition = Some(QueuedTransition {
                        name,
                        reason,
                        args: Value::Object(Default::default()),
                    });
                    tool_result_blocks.push(success_result(&call.id, &Value::String("queued".into())));
                }
                None => tool_result_blocks
                    .push(error_result(&call.id, "transition call requires a `to` field")),
            }
            continue;
        }

        if let Some(name) = call.name.strip_prefix("transition_") {
            if queued_transition.is_some() {
                tool_result_blocks.push(error_result(
                    &call.id,
                    &ToolError::TransitionAlreadyQueued.to_string(),
                ));
                continue;
            }
            let mut args = call.input.clone();
            let reason = args
                .as_object_mut()
                .and_then(|m| m.remove("reason"))
                .and_then(|v| v.as_str().map(str::to_string));
            queued_transition = Some(QueuedTransition {
                name: name.to_string(),
                reason,
                args,
            });
            tool_result_blocks.push(success_result(&call.id, &Value::String("queued".into())));
            continue;
        }

        // Regular tool: resolve by scope and dispatch.
        let ancestor_links = input.ancestors;
        let resolved = match resolve_tool(
            input.charter,
            input.instance_id,
            input.node,
            ancestor_links,
            &call.name,
        ) {
            Ok(resolved) => resolved,
            Err(err) => {
                tool_result_blocks.push(error_result(&call.id, &err.to_string()));
                continue;
            }
        };

        let outcome = match &resolved.owner {
            ToolOwner::Instance(owner_id) if *owner_id == input.instance_id => {
                let ctx = WritableNodeContext {
                    instance_id: input.instance_id,
                    state: &node_state,
                    history: input.history,
                };
                resolved.tool.call(call.input.clone(), &ctx).await
            }
            ToolOwner::Instance(_ancestor_id) => {
                let ctx = ReadOnlyAncestorContext {
                    instance_id: input.instance_id,
                    state: input.node_state.clone(),
                    history: input.history,
                };
                resolved.tool.call(call.input.clone(), &ctx).await
            }
            ToolOwner::Charter => {
                let ctx = WritableNodeContext {
                    instance_id: input.instance_id,
                    state: &node_state,
                    history: input.history,
                };
                resolved.tool.call(call.input.clone(), &ctx).await
            }
            ToolOwner::Pack(pack_name) => {
                let Some(cell) = pack_states.get(pack_name).cloned() else {
                    tool_result_blocks.push(error_result(
                        &call.id,
                        &format!("pack not attached to node: {pack_name}"),
                    ));
                    continue;
                };
                let ctx = WritablePackContext {
                    instance_id: input.instance_id,
                    state: cell,
                    history: input.history,
                };
                let outcome = resolved.tool.call(call.input.clone(), &ctx).await;
                if outcome.is_ok() && !changed_packs.contains(pack_name) {
                    changed_packs.push(pack_name.clone());
                }
                outcome
            }
        };

        match outcome {
            Ok(ToolOutcome::Value(value)) => tool_result_blocks.push(success_result(&call.id, &value)),
            Ok(ToolOutcome::Reply { user_message, llm_message }) => {
                tool_result_blocks.push(success_result(&call.id, &llm_message));
                if let Some(block) = user_message {
                    output_blocks.push(block);
                }
            }
            Ok(ToolOutcome::Suspend(request)) => {
                suspend_info = Some(SuspendInfo {
                    suspend_id: request.suspend_id,
                    reason: request.reason,
                    suspended_at: chrono::Utc::now(),
                    metadata: request.metadata,
                    source: charter_types::SuspendSource::Tool,
                });
            }
            Err(err) => tool_result_blocks.push(error_result(&call.id, &err.to_string())),
        }
    }

    let final_node_state = node_state.get();
    let state_changed = final_node_state != input.node_state;

    let mut pack_state_updates = HashMap::new();
    for name in &changed_packs {
        if let Some(cell) = pack_states.get(name) {
            pack_state_updates.insert(name.clone(), cell.get());
        }
    }

    let mut messages = Vec::new();
    if state_changed {
        messages.push(
            Message::instance_event(charter_types::InstanceEvent::State {
                instance_id: input.instance_id,
                state: final_node_state.clone(),
            })
            .from_instance(input.instance_id),
        );
    }
    for (pack, state) in &pack_state_updates {
        messages.push(Message::instance_event(charter_types::InstanceEvent::PackState {
            pack: pack.clone(),
            state: state.clone(),
        }));
    }
    if !tool_result_blocks.is_empty() {
        messages.push(Message {
            role: Role::User,
            content: tool_result_blocks,
            metadata: MessageMetadata {
                source: Some(MessageSource {
                    instance_id: Some(input.instance_id),
                    external: false,
                }),
            },
        });
    }
    if !output_blocks.is_empty() {
        messages.push(Message {
            role: Role::Assistant,
            content: output_blocks.into_iter().map(ContentBlock::Output).collect(),
            metadata: MessageMetadata {
                source: Some(MessageSource {
                    instance_id: Some(input.instance_id),
                    external: false,
                }),
            },
        });
    }

    let mut transition_result = None;
    let mut cede_content = None;
    let mut yield_reason = if suspend_info.is_some() {
        YieldReason::Suspend
    } else if input.any_terminal {
        YieldReason::EndTurn
    } else {
        YieldReason::ToolUse
    };

    if let Some(queued) = queued_transition {
        match resolve_and_apply_transition(input.node, input.instance_id, queued).await {
            Ok(result) => {
                let event = match &result {
                    TransitionResult::TransitionTo { node, .. } => {
                        charter_types::InstanceEvent::Transition {
                            instance_id: input.instance_id,
                            to_node: target_node_name(node),
                        }
                    }
                    TransitionResult::Spawn { children } => charter_types::InstanceEvent::Spawn {
                        instance_id: input.instance_id,
                        children: (0..children.len()).map(|_| InstanceId::new()).collect(),
                    },
                    TransitionResult::Cede { .. } => charter_types::InstanceEvent::Cede {
                        instance_id: input.instance_id,
                    },
                    TransitionResult::Suspend { suspend_id, reason, metadata } => {
                        suspend_info = Some(SuspendInfo {
                            suspend_id: suspend_id.clone(),
                            reason: reason.clone(),
                            suspended_at: chrono::Utc::now(),
                            metadata: metadata.clone(),
                            source: charter_types::SuspendSource::Transition,
                        });
                        charter_types::InstanceEvent::Suspend {
                            instance_id: input.instance_id,
                            info: suspend_info.clone().expect("just set"),
                        }
                    }
                };
                if let TransitionResult::Cede { content } = &result {
                    cede_content = content.clone();
                    yield_reason = YieldReason::Cede;
                } else if matches!(result, TransitionResult::Suspend { .. }) {
                    yield_reason = YieldReason::Suspend;
                }
                messages.push(Message::instance_event(event).from_instance(input.instance_id));
                transition_result = Some(result);
            }
            Err(err) => {
                tool_result_blocks_push_error(&mut messages, input.instance_id, &err.to_string());
            }
        }
    }

    PipelineOutput {
        messages,
        node_state: final_node_state,
        pack_state_updates,
        transition_result,
        yield_reason,
        cede_content,
        suspend_info,
    }
}

fn tool_result_blocks_push_error(messages: &mut Vec<Message>, instance_id: InstanceId, error: &str) {
    messages.push(
        Message {
            role: Role::System,
            content: vec![ContentBlock::Text(format!("transition failed: {error}"))],
            metadata: MessageMetadata {
                source: Some(MessageSource {
                    instance_id: Some(instance_id),
                    external: false,
                }),
            },
        },
    );
}

fn target_node_name(target: &charter_types::NodeTarget) -> String {
    match target {
        charter_types::RefOr::Ref { name } => name.clone(),
        charter_types::RefOr::Inline(_) => "<inline>".to_string(),
    }
}

async fn resolve_and_apply_transition(
    node: &Node,
    instance_id: InstanceId,
    queued: QueuedTransition,
) -> Result<TransitionResult, TransitionError> {
    let transition = charter_resolve::resolve_transition(node, &queued.name)?;
    match transition {
        Transition::Code { execute, .. } => {
            execute
                .call(TransitionContext { instance_id, args: queued.args })
                .await
        }
        Transition::Serial { node, .. } => Ok(TransitionResult::TransitionTo {
            node: node.clone(),
            state: None,
            executor_config: None,
        }),
        Transition::General { .. } => {
            let target = queued
                .args
                .get("node")
                .cloned()
                .ok_or(TransitionError::MissingState)?;
            let node_target: charter_types::NodeTarget =
                serde_json::from_value(target).map_err(|e| TransitionError::ExecutionFailed(e.to_string()))?;
            let state = queued.args.get("state").cloned();
            Ok(TransitionResult::TransitionTo {
                node: node_target,
                state,
                executor_config: None,
            })
        }
    }
}

fn success_result(call_id: &str, value: &Value) -> ContentBlock {
    ContentBlock::ToolResult {
        tool_use_id: call_id.to_string(),
        content: value.clone(),
        is_error: false,
    }
}

fn error_result(call_id: &str, message: &str) -> ContentBlock {
    ContentBlock::ToolResult {
        tool_use_id: call_id.to_string(),
        content: Value::String(message.to_string()),
        is_error: true,
    }
}

/// Exposed for `charter-control`/`charter-loop`: turn a `Spawn`'s
/// children specs into the pending work they need (the tool pipeline
/// doesn't own instance creation — that's tree surgery, applied by
/// the loop when it drains the queue).
#[must_use]
pub fn spawn_child_specs(result: &TransitionResult) -> Vec<SpawnChild> {
    match result {
        TransitionResult::Spawn { children } => children.clone(),
        _ => Vec::new(),
    }
}
