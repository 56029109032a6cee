//! Observation and intervention points around the step loop.
//!
//! Ambient instrumentation, not a scheduling feature: a charter that
//! registers no hooks behaves exactly as spec.md describes. Grounded
//! in the teacher's `layer0::hook` (`Hook`/`HookPoint`/`HookAction`)
//! and `neuron-loop`'s observability firing helpers.

use async_trait::async_trait;
use charter_types::InstanceId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HookError;

/// Where in the step loop a hook fires.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
    /// Before each inference call.
    PreInference,
    /// After the model responds, before tool/transition dispatch.
    PostInference,
    /// Before a tool call is executed.
    PreToolExecution,
    /// After a tool call completes, before its result enters history.
    PostToolExecution,
    /// After a [`charter_types::Step`] has been produced and applied.
    StepEmitted,
}

/// Read-only context available to a hook at its firing point.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookContext {
    /// Which point this firing corresponds to.
    pub point: HookPoint,
    /// The instance the active step belongs to.
    pub instance_id: InstanceId,
    /// Tool name, present at `PreToolExecution`/`PostToolExecution`.
    pub tool_name: Option<String>,
    /// Tool input, present at `PreToolExecution`.
    pub tool_input: Option<Value>,
    /// Tool result, present at `PostToolExecution`.
    pub tool_result: Option<Value>,
    /// Running count of inference requests made so far this turn.
    pub requests_used: u64,
    /// Running count of tool calls made so far this turn.
    pub tool_calls_used: u64,
    /// Running count of tokens consumed so far this turn, if the
    /// executor reports usage.
    pub tokens_used: u64,
}

impl HookContext {
    /// Create a new context with only the point and instance set.
    #[must_use]
    pub fn new(point: HookPoint, instance_id: InstanceId) -> Self {
        Self {
            point,
            instance_id,
            tool_name: None,
            tool_input: None,
            tool_result: None,
            requests_used: 0,
            tool_calls_used: 0,
            tokens_used: 0,
        }
    }
}

/// What a hook decides to do at a firing point.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum HookAction {
    /// Proceed normally.
    Continue,
    /// Stop the turn. The loop yields with a dedicated hook-halt
    /// reason rather than running to `end_turn`.
    Halt {
        /// Human-readable reason, surfaced to the caller.
        reason: String,
    },
    /// Skip the pending tool call (only meaningful at
    /// `PreToolExecution`); a synthetic "skipped by policy" result is
    /// backfilled in its place.
    SkipTool {
        /// Reason for skipping.
        reason: String,
    },
}

/// A hook observing and optionally intervening in the step loop.
///
/// Hooks are registered on the driver (`charter-loop`), not the
/// charter itself — the charter doesn't know who's watching.
/// Implementations should return quickly; an expensive hook adds
/// latency to every firing point it subscribes to.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Which points this hook wants to fire at.
    fn points(&self) -> &[HookPoint];

    /// Called at each subscribed point.
    async fn on_event(&self, ctx: &HookContext) -> Result<HookAction, HookError>;
}

/// Apply a sequence of hooks in order, short-circuiting on the first
/// non-`Continue` action.
pub async fn fire_hooks(
    hooks: &[std::sync::Arc<dyn Hook>],
    ctx: &HookContext,
) -> Result<HookAction, HookError> {
    for hook in hooks {
        if !hook.points().contains(&ctx.point) {
            continue;
        }
        match hook.on_event(ctx).await? {
            HookAction::Continue => continue,
            other => return Ok(other),
        }
    }
    Ok(HookAction::Continue)
}
