//! A [`Hook`] that halts a turn once configured usage budgets are
//! exceeded.
//!
//! [`HookContext`] reports a single running token count rather than
//! separate input/output counters, so this narrows the teacher's
//! `UsageLimits` (`request_limit`, `tool_calls_limit`,
//! `input_tokens_limit`, `output_tokens_limit`, `total_tokens_limit`)
//! down to `request_limit`, `tool_calls_limit`, and `tokens_limit`.

use async_trait::async_trait;
use charter_protocol::{Hook, HookAction, HookContext, HookError, HookPoint};

const POINTS: &[HookPoint] = &[HookPoint::PostInference, HookPoint::StepEmitted];

/// Usage budgets enforced across a single turn.
///
/// ```
/// use charter_hooks::UsageLimitHook;
///
/// let hook = UsageLimitHook::new()
///     .with_request_limit(50)
///     .with_tokens_limit(100_000);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageLimitHook {
    request_limit: Option<u64>,
    tool_calls_limit: Option<u64>,
    tokens_limit: Option<u64>,
}

impl UsageLimitHook {
    /// Create an unconfigured hook (no limits enforced until one is
    /// set).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of inference requests made this turn.
    #[must_use]
    pub fn with_request_limit(mut self, limit: u64) -> Self {
        self.request_limit = Some(limit);
        self
    }

    /// Cap the number of tool calls made this turn.
    #[must_use]
    pub fn with_tool_calls_limit(mut self, limit: u64) -> Self {
        self.tool_calls_limit = Some(limit);
        self
    }

    /// Cap the number of tokens consumed this turn.
    #[must_use]
    pub fn with_tokens_limit(mut self, limit: u64) -> Self {
        self.tokens_limit = Some(limit);
        self
    }

    fn exceeded(&self, ctx: &HookContext) -> Option<String> {
        if let Some(limit) = self.request_limit {
            if ctx.requests_used > limit {
                return Some(format!("request limit exceeded: {} > {limit}", ctx.requests_used));
            }
        }
        if let Some(limit) = self.tool_calls_limit {
            if ctx.tool_calls_used > limit {
                return Some(format!("tool call limit exceeded: {} > {limit}", ctx.tool_calls_used));
            }
        }
        if let Some(limit) = self.tokens_limit {
            if ctx.tokens_used > limit {
                return Some(format!("token limit exceeded: {} > {limit}", ctx.tokens_used));
            }
        }
        None
    }
}

#[async_trait]
impl Hook for UsageLimitHook {
    fn points(&self) -> &[HookPoint] {
        POINTS
    }

    async fn on_event(&self, ctx: &HookContext) -> Result<HookAction, HookError> {
        match self.exceeded(ctx) {
            Some(reason) => Ok(HookAction::Halt { reason }),
            None => Ok(HookAction::Continue),
        }
    }
}
