//! A [`Hook`] that emits structured [`tracing`] events and never
//! intervenes.
//!
//! Wire to any `tracing`-compatible subscriber (`tracing-subscriber`
//! for stdout, `tracing-opentelemetry` for export).

use async_trait::async_trait;
use charter_protocol::{Hook, HookAction, HookContext, HookError, HookPoint};

const ALL_POINTS: &[HookPoint] = &[
    HookPoint::PreInference,
    HookPoint::PostInference,
    HookPoint::PreToolExecution,
    HookPoint::PostToolExecution,
    HookPoint::StepEmitted,
];

/// A [`Hook`] that emits a `tracing` event at every firing point.
///
/// Always returns [`HookAction::Continue`] — observes but never
/// controls.
///
/// | Point | Level |
/// |-------|-------|
/// | `PreInference`, `PostInference`, `PreToolExecution`, `PostToolExecution` | `DEBUG` |
/// | `StepEmitted` | `INFO` |
pub struct TracingHook;

impl TracingHook {
    /// Create a new `TracingHook`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for TracingHook {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Hook for TracingHook {
    fn points(&self) -> &[HookPoint] {
        ALL_POINTS
    }

    async fn on_event(&self, ctx: &HookContext) -> Result<HookAction, HookError> {
        match ctx.point {
            HookPoint::PreInference => {
                tracing::debug!(instance_id = %ctx.instance_id, requests_used = ctx.requests_used, "charter.llm.pre_call");
            }
            HookPoint::PostInference => {
                tracing::debug!(instance_id = %ctx.instance_id, requests_used = ctx.requests_used, tool_calls_used = ctx.tool_calls_used, "charter.llm.post_call");
            }
            HookPoint::PreToolExecution => {
                tracing::debug!(instance_id = %ctx.instance_id, tool = ctx.tool_name.as_deref().unwrap_or("?"), "charter.tool.pre_execution");
            }
            HookPoint::PostToolExecution => {
                tracing::debug!(instance_id = %ctx.instance_id, tool = ctx.tool_name.as_deref().unwrap_or("?"), "charter.tool.post_execution");
            }
            HookPoint::StepEmitted => {
                tracing::info!(
                    instance_id = %ctx.instance_id,
                    requests_used = ctx.requests_used,
                    tool_calls_used = ctx.tool_calls_used,
                    "charter.loop.step_emitted"
                );
            }
        }
        Ok(HookAction::Continue)
    }
}
