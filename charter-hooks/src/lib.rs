//! Concrete [`charter_protocol::Hook`] implementations: a tracing
//! instrument and usage-limit guardrails, registered on a
//! `charter-loop::MachineDriver` rather than on the charter itself.

mod tracing_hook;
mod usage_limit;

pub use tracing_hook::TracingHook;
pub use usage_limit::UsageLimitHook;

#[cfg(test)]
mod tests {
    use super::*;
    use charter_protocol::{Hook, HookAction, HookContext, HookPoint};
    use charter_types::InstanceId;

    #[tokio::test]
    async fn tracing_hook_always_continues() {
        let hook = TracingHook::new();
        for point in [
            HookPoint::PreInference,
            HookPoint::PostInference,
            HookPoint::PreToolExecution,
            HookPoint::PostToolExecution,
            HookPoint::StepEmitted,
        ] {
            let ctx = HookContext::new(point, InstanceId::new());
            let action = hook.on_event(&ctx).await.unwrap();
            assert!(matches!(action, HookAction::Continue));
        }
    }

    #[tokio::test]
    async fn usage_limit_hook_halts_once_request_limit_is_passed() {
        let hook = UsageLimitHook::new().with_request_limit(2);
        let mut ctx = HookContext::new(HookPoint::PostInference, InstanceId::new());

        ctx.requests_used = 2;
        assert!(matches!(hook.on_event(&ctx).await.unwrap(), HookAction::Continue));

        ctx.requests_used = 3;
        assert!(matches!(hook.on_event(&ctx).await.unwrap(), HookAction::Halt { .. }));
    }

    #[tokio::test]
    async fn usage_limit_hook_halts_once_tool_calls_limit_is_passed() {
        let hook = UsageLimitHook::new().with_tool_calls_limit(5);
        let mut ctx = HookContext::new(HookPoint::StepEmitted, InstanceId::new());

        ctx.tool_calls_used = 5;
        assert!(matches!(hook.on_event(&ctx).await.unwrap(), HookAction::Continue));

        ctx.tool_calls_used = 6;
        assert!(matches!(hook.on_event(&ctx).await.unwrap(), HookAction::Halt { .. }));
    }

    #[tokio::test]
    async fn unconfigured_usage_limit_hook_never_halts() {
        let hook = UsageLimitHook::new();
        let mut ctx = HookContext::new(HookPoint::PostInference, InstanceId::new());
        ctx.requests_used = 1_000_000;
        ctx.tool_calls_used = 1_000_000;
        ctx.tokens_used = 1_000_000;
        assert!(matches!(hook.on_event(&ctx).await.unwrap(), HookAction::Continue));
    }
}
