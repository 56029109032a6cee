//! The machine loop (spec §4.7): drives `runMachine`'s step sequence as
//! an async stream, the one deliberate departure from the teacher's
//! synchronous `AgentLoop::run()` — the spec models `runMachine` as a
//! coroutine the caller can iterate and resume, not a call that blocks
//! to completion.

use std::collections::HashMap;
use std::sync::Arc;

use async_stream::try_stream;
use charter_control::{apply_transition_result, excise_ceded_instance};
use charter_exec::InferenceBackend;
use charter_protocol::{fire_hooks, Hook, HookAction, HookContext, HookPoint};
use charter_types::{InstanceId, Machine, MachineInput, Message, Role, Step, SuspendSource, YieldReason};
use futures::Stream;

use crate::config::RunOptions;
use crate::error::MachineError;
use crate::leaves::{active_leaves, classify};
use crate::run::{run_leaf, LeafResult};

/// Drives machines forward: an injected backend, a set of observability
/// hooks, and the step budget they run under.
///
/// Hooks are registered here rather than on the charter, mirroring the
/// teacher's `AgentLoopBuilder` — the charter is the static registry;
/// who's watching a particular run is a driver concern.
pub struct MachineDriver {
    backend: Arc<dyn InferenceBackend>,
    hooks: Vec<Arc<dyn Hook>>,
    options: RunOptions,
}

impl MachineDriver {
    /// Start building a driver around the given backend, with default
    /// options and no hooks.
    #[must_use]
    pub fn new(backend: Arc<dyn InferenceBackend>) -> Self {
        Self { backend, hooks: Vec::new(), options: RunOptions::default() }
    }

    /// Replace the default [`RunOptions`].
    #[must_use]
    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Register a hook. Hooks fire in registration order at each point
    /// they subscribe to (spec's observability boundary).
    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn Hook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Drive `machine` forward from `input`, yielding one [`Step`] per
    /// round of the loop (spec §4.7). The stream ends when the turn
    /// completes (`done == true` on the last step) or when a leaf
    /// suspends — a suspension ends the stream without `done`; the
    /// caller resumes with a fresh `run_machine` call carrying
    /// [`MachineInput::Resume`].
    pub fn run_machine<'a>(
        &'a self,
        machine: &'a mut Machine,
        input: MachineInput,
    ) -> impl Stream<Item = Result<Step, MachineError>> + 'a {
        try_stream! {
            let mut counters = UsageCounters::default();

            apply_input(machine, input)?;

            let mut step_index = 0usize;
            loop {
                if step_index >= self.options.max_steps {
                    let instance_id = active_leaves(machine)
                        .first()
                        .map(|leaf| leaf.instance_id)
                        .unwrap_or(machine.root_id);
                    yield Step {
                        instance_id,
                        messages: Vec::new(),
                        yield_reason: YieldReason::MaxTokens,
                        response: None,
                        done: true,
                        cede_content: None,
                        suspend_info: None,
                    };
                    return;
                }

                let leaves = active_leaves(machine);
                if leaves.is_empty() {
                    yield Step {
                        instance_id: machine.root_id,
                        messages: Vec::new(),
                        yield_reason: YieldReason::EndTurn,
                        response: None,
                        done: true,
                        cede_content: None,
                        suspend_info: None,
                    };
                    return;
                }
                let classification = classify(leaves);

                for leaf in classification.primary.iter().chain(classification.workers.iter()) {
                    let ctx = HookContext::new(HookPoint::PreInference, leaf.instance_id);
                    if let Some(reason) = self.check_halt(&ctx).await? {
                        yield halt_step(leaf.instance_id, reason);
                        return;
                    }
                }

                let machine_ref: &Machine = machine;
                // Primary always occupies index 0 when present (used by
                // `fold_yield` below); workers follow in traversal order.
                let mut results: Vec<LeafResult> = Vec::new();
                if self.options.parallel_workers {
                    let mut futs: Vec<std::pin::Pin<Box<dyn std::future::Future<Output = Result<LeafResult, charter_exec::BackendError>> + '_>>> = Vec::new();
                    if let Some(leaf) = &classification.primary {
                        futs.push(Box::pin(run_leaf(self.backend.as_ref(), machine_ref, leaf, step_index, self.options.max_steps, self.options.step_warning_threshold)));
                    }
                    for leaf in &classification.workers {
                        futs.push(Box::pin(run_leaf(self.backend.as_ref(), machine_ref, leaf, step_index, self.options.max_steps, self.options.step_warning_threshold)));
                    }
                    results = futures::future::try_join_all(futs).await?;
                } else {
                    if let Some(leaf) = &classification.primary {
                        results.push(run_leaf(self.backend.as_ref(), machine_ref, leaf, step_index, self.options.max_steps, self.options.step_warning_threshold).await?);
                    }
                    for leaf in &classification.workers {
                        results.push(run_leaf(self.backend.as_ref(), machine_ref, leaf, step_index, self.options.max_steps, self.options.step_warning_threshold).await?);
                    }
                }

                for result in &results {
                    counters.requests_used += 1;
                    let mut ctx = HookContext::new(HookPoint::PostInference, result.instance_id);
                    ctx.requests_used = counters.requests_used;
                    ctx.tool_calls_used = counters.tool_calls_used;
                    if let Some(reason) = self.check_halt(&ctx).await? {
                        yield halt_step(result.instance_id, reason);
                        return;
                    }
                }

                let primary_index = classification.primary.as_ref().map(|_| 0usize);
                let mut step_messages = Vec::new();
                for result in &results {
                    commit_leaf(machine, result)?;
                    step_messages.extend(result.output.messages.iter().cloned());
                    counters.tool_calls_used += count_tool_calls(&result.output.messages);
                }
                machine.history.extend(step_messages.iter().cloned());

                for result in &results {
                    if matches!(result.output.yield_reason, YieldReason::Cede) {
                        if let Some(parent_id) = result.parent_id {
                            excise_ceded_instance(machine, parent_id, result.instance_id);
                        }
                    }
                }

                let (overall_yield, overall_done) = fold_yield(primary_index, &results);

                let primary_result = primary_index.map(|i| &results[i]);
                let step = Step {
                    instance_id: primary_result
                        .map(|r| r.instance_id)
                        .or_else(|| results.first().map(|r| r.instance_id))
                        .unwrap_or(machine.root_id),
                    messages: step_messages,
                    yield_reason: overall_yield,
                    response: primary_result.and_then(|r| r.output.response.clone()),
                    done: overall_done,
                    cede_content: if matches!(overall_yield, YieldReason::Cede) {
                        primary_result.and_then(|r| r.output.cede_content.clone())
                    } else {
                        None
                    },
                    suspend_info: if matches!(overall_yield, YieldReason::Suspend) {
                        primary_result.and_then(|r| r.output.suspend_info.clone())
                    } else {
                        None
                    },
                };

                let final_step = matches!(overall_yield, YieldReason::Suspend) || overall_done;
                let step_for_hook = step.clone();
                yield step;

                for hook in &self.hooks {
                    if !hook.points().contains(&HookPoint::StepEmitted) {
                        continue;
                    }
                    let mut ctx = HookContext::new(HookPoint::StepEmitted, step_for_hook.instance_id);
                    ctx.requests_used = counters.requests_used;
                    ctx.tool_calls_used = counters.tool_calls_used;
                    hook.on_event(&ctx).await?;
                }

                if final_step {
                    return;
                }

                step_index += 1;
            }
        }
    }

    async fn check_halt(&self, ctx: &HookContext) -> Result<Option<String>, MachineError> {
        match fire_hooks(&self.hooks, ctx).await? {
            HookAction::Continue | HookAction::SkipTool { .. } => Ok(None),
            HookAction::Halt { reason } => Ok(Some(reason)),
        }
    }
}

#[derive(Default)]
struct UsageCounters {
    requests_used: u64,
    tool_calls_used: u64,
}

fn halt_step(instance_id: InstanceId, reason: String) -> Step {
    Step {
        instance_id,
        messages: Vec::new(),
        yield_reason: YieldReason::External,
        response: Some(reason),
        done: true,
        cede_content: None,
        suspend_info: None,
    }
}

fn count_tool_calls(messages: &[Message]) -> u64 {
    messages
        .iter()
        .flat_map(|m| &m.content)
        .filter(|b| matches!(b, charter_types::ContentBlock::ToolUse { .. }))
        .count() as u64
}

/// Apply a machine input: append the new user message to history, or
/// clear a suspension and optionally replay a synthetic tool result
/// (spec §4.7's resume paragraph).
fn apply_input(machine: &mut Machine, input: MachineInput) -> Result<(), MachineError> {
    match input {
        MachineInput::User(message) => {
            machine.history.push(message);
            Ok(())
        }
        MachineInput::Resume { instance_id, suspend_id, value, is_error } => {
            let instance = machine
                .instance(instance_id)
                .ok_or(MachineError::UnknownInstance(instance_id))?;
            let Some(suspended) = instance.suspended.clone() else {
                return Err(MachineError::NotSuspended(instance_id));
            };
            if suspended.suspend_id != suspend_id {
                return Err(MachineError::SuspendMismatch {
                    instance_id,
                    expected: suspended.suspend_id,
                    actual: suspend_id,
                });
            }

            if suspended.source == SuspendSource::Tool {
                let content = value.unwrap_or(serde_json::Value::Null);
                let message = Message {
                    role: Role::User,
                    content: vec![charter_types::ContentBlock::ToolResult {
                        tool_use_id: suspend_id,
                        content,
                        is_error,
                    }],
                    metadata: charter_types::MessageMetadata::default(),
                }
                .from_instance(instance_id)
                .external();
                machine.history.push(message);
            }

            machine
                .instance_mut(instance_id)
                .expect("checked above")
                .suspended = None;
            Ok(())
        }
    }
}

/// Commit one leaf's executor output to the tree: its state, any pack
/// state it touched, and the transition/suspend outcome it produced
/// (spec §4.7 step 2c).
fn commit_leaf(machine: &mut Machine, result: &LeafResult) -> Result<(), MachineError> {
    if let Some(instance) = machine.instance_mut(result.instance_id) {
        instance.state = result.output.node_state.clone();
    }

    if !result.output.pack_state_updates.is_empty() {
        let root_id = machine.root_id;
        if let Some(root) = machine.instance_mut(root_id) {
            let pack_states = root.pack_states.get_or_insert_with(HashMap::new);
            for (name, state) in &result.output.pack_state_updates {
                pack_states.insert(name.clone(), state.clone());
            }
        }
    }

    if let Some(transition_result) = result.output.transition_result.clone() {
        apply_transition_result(machine, result.instance_id, transition_result)?;
    } else if let Some(suspend_info) = &result.output.suspend_info {
        if let Some(instance) = machine.instance_mut(result.instance_id) {
            instance.suspended = Some(suspend_info.clone());
        }
    }

    Ok(())
}

/// Fold the primary's yield reason with the workers' (spec §4.7 step
/// 2d): cede/suspend from the primary dominate; a worker ending its
/// own turn is ignored since it isn't the primary's turn to end. When
/// no primary is active, a worker never presents `end_turn` (the
/// executor turns that into a warned-and-continued `tool_use`, spec
/// §3 invariant 4), so the outer turn only ends here if a worker's own
/// token budget is exhausted; otherwise it keeps running until every
/// worker has ceded and no leaves remain.
fn fold_yield(primary_index: Option<usize>, results: &[LeafResult]) -> (YieldReason, bool) {
    match primary_index {
        Some(i) => {
            let reason = results[i].output.yield_reason;
            let done = matches!(reason, YieldReason::EndTurn | YieldReason::MaxTokens);
            (reason, done)
        }
        None => {
            let any_max_tokens = results
                .iter()
                .any(|r| matches!(r.output.yield_reason, YieldReason::MaxTokens));
            if any_max_tokens {
                (YieldReason::MaxTokens, true)
            } else {
                (YieldReason::ToolUse, false)
            }
        }
    }
}
