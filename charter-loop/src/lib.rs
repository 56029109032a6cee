//! The machine loop (spec §4.7, C8): turns a [`charter_types::Machine`]
//! and an [`charter_types::MachineInput`] into a stream of
//! [`charter_types::Step`]s, driving the executor and tool pipeline
//! underneath.

pub mod config;
pub mod error;
pub mod leaves;
pub mod loop_impl;
pub mod run;

pub use config::RunOptions;
pub use error::MachineError;
pub use loop_impl::MachineDriver;

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use charter_exec::{BackendBlock, BackendError, InferRequest, InferResponse, InferenceBackend, StopReason};
    use charter_types::{
        Charter, DefaultPromptBuilder, ExecutorConfig, FnTool, Machine, MachineInput, Message, Node,
        YieldReason,
    };
    use futures::{pin_mut, StreamExt};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn echo_charter() -> Arc<Charter> {
        let echo = Arc::new(FnTool::new(
            "echo",
            "echoes its input",
            serde_json::json!({ "type": "object" }),
            |input, _ctx| Box::pin(async move { Ok(charter_types::ToolOutcome::Value(input)) }),
        ));
        let node = Node::new("root", "be helpful", serde_json::json!({ "type": "object" }))
            .with_tool(echo)
            .with_initial_state(serde_json::json!({}));
        let mut nodes = HashMap::new();
        nodes.insert("root".to_string(), Arc::new(node));
        Arc::new(Charter {
            name: "echo-charter".into(),
            executor: ExecutorConfig::default(),
            tools: HashMap::new(),
            transitions: HashMap::new(),
            nodes,
            packs: HashMap::new(),
            instructions: None,
            system_prompt_builder: Arc::new(DefaultPromptBuilder),
            root_node: "root".into(),
        })
    }

    struct EndTurnBackend;

    #[async_trait]
    impl InferenceBackend for EndTurnBackend {
        async fn infer(&self, _request: InferRequest) -> Result<InferResponse, BackendError> {
            Ok(InferResponse {
                content: vec![BackendBlock::Text { text: "done".to_string() }],
                stop_reason: StopReason::EndTurn,
            })
        }
    }

    #[tokio::test]
    async fn simple_turn_ends_in_one_step() {
        let charter = echo_charter();
        let mut machine = Machine::new(charter);
        let driver = MachineDriver::new(Arc::new(EndTurnBackend))
            .with_options(RunOptions { parallel_workers: false, ..RunOptions::default() });

        let stream = driver.run_machine(&mut machine, MachineInput::User(Message::user("hi")));
        pin_mut!(stream);

        let step = stream.next().await.unwrap().unwrap();
        assert!(step.done);
        assert!(matches!(step.yield_reason, YieldReason::EndTurn));
        assert_eq!(step.response.as_deref(), Some("done"));
        assert!(stream.next().await.is_none());
    }

    /// First call makes a tool call, second call ends the turn —
    /// exercises the multi-step loop and history accumulation.
    struct ToolThenEndBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl InferenceBackend for ToolThenEndBackend {
        async fn infer(&self, _request: InferRequest) -> Result<InferResponse, BackendError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(InferResponse {
                    content: vec![BackendBlock::ToolUse {
                        id: "call-1".to_string(),
                        name: "echo".to_string(),
                        input: serde_json::json!("hello"),
                    }],
                    stop_reason: StopReason::ToolUse,
                })
            } else {
                Ok(InferResponse {
                    content: vec![BackendBlock::Text { text: "wrapped up".to_string() }],
                    stop_reason: StopReason::EndTurn,
                })
            }
        }
    }

    #[tokio::test]
    async fn tool_use_step_is_followed_by_end_turn_step() {
        let charter = echo_charter();
        let mut machine = Machine::new(charter);
        let driver = MachineDriver::new(Arc::new(ToolThenEndBackend { calls: AtomicUsize::new(0) }))
            .with_options(RunOptions { parallel_workers: false, ..RunOptions::default() });

        let stream = driver.run_machine(&mut machine, MachineInput::User(Message::user("hi")));
        pin_mut!(stream);

        let first = stream.next().await.unwrap().unwrap();
        assert!(!first.done);
        assert!(matches!(first.yield_reason, YieldReason::ToolUse));

        let second = stream.next().await.unwrap().unwrap();
        assert!(second.done);
        assert_eq!(second.response.as_deref(), Some("wrapped up"));

        assert!(stream.next().await.is_none());
        assert!(machine.history.len() >= 4);
    }

    #[tokio::test]
    async fn max_steps_exhaustion_ends_the_turn() {
        let charter = echo_charter();
        let mut machine = Machine::new(charter);
        let driver = MachineDriver::new(Arc::new(ToolThenEndBackend { calls: AtomicUsize::new(0) }))
            .with_options(RunOptions { max_steps: 1, parallel_workers: false, ..RunOptions::default() });

        let stream = driver.run_machine(&mut machine, MachineInput::User(Message::user("hi")));
        pin_mut!(stream);

        let first = stream.next().await.unwrap().unwrap();
        assert!(!first.done);

        let second = stream.next().await.unwrap().unwrap();
        assert!(second.done);
        assert!(matches!(second.yield_reason, YieldReason::MaxTokens));
        assert!(stream.next().await.is_none());
    }
}
