//! The inference driver (spec §4.6, C7): system-prompt assembly, a
//! single call against an injected [`InferenceBackend`], and hand-off
//! to the tool pipeline when the backend asks for tools.

pub mod backend;
pub mod executor;
pub mod prompt;
pub mod toolset;

pub use backend::{
    BackendBlock, BackendError, BackendMessage, InferRequest, InferResponse, InferenceBackend,
    StopReason, ToolDefinition,
};
pub use executor::{run_executor, ExecutorInput, ExecutorOutput};
pub use prompt::{build_system_prompt, PromptInput};
pub use toolset::collect_tool_definitions;

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use charter_resolve::AncestorLink;
    use charter_types::{Charter, DefaultPromptBuilder, ExecutorConfig, FnTool, Node};
    use std::collections::HashMap;
    use std::sync::Arc;

    struct EchoBackend;

    #[async_trait]
    impl InferenceBackend for EchoBackend {
        async fn infer(&self, _request: InferRequest) -> Result<InferResponse, BackendError> {
            Ok(InferResponse {
                content: vec![BackendBlock::Text { text: "hi".to_string() }],
                stop_reason: StopReason::EndTurn,
            })
        }
    }

    struct ToolUseBackend;

    #[async_trait]
    impl InferenceBackend for ToolUseBackend {
        async fn infer(&self, _request: InferRequest) -> Result<InferResponse, BackendError> {
            Ok(InferResponse {
                content: vec![BackendBlock::ToolUse {
                    id: "call-1".to_string(),
                    name: "echo".to_string(),
                    input: serde_json::json!("hello"),
                }],
                stop_reason: StopReason::ToolUse,
            })
        }
    }

    fn echo_charter() -> Charter {
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
        Charter {
            name: "echo-charter".into(),
            executor: ExecutorConfig::default(),
            tools: HashMap::new(),
            transitions: HashMap::new(),
            nodes,
            packs: HashMap::new(),
            instructions: None,
            system_prompt_builder: Arc::new(DefaultPromptBuilder),
            root_node: "root".into(),
        }
    }

    #[tokio::test]
    async fn end_turn_with_no_tool_calls_returns_immediately() {
        let charter = echo_charter();
        let node = charter.node("root").unwrap().clone();
        let instance_id = charter_types::InstanceId::new();
        let ancestors: Vec<AncestorLink<'_>> = Vec::new();

        let output = run_executor(
            &EchoBackend,
            ExecutorInput {
                charter: &charter,
                instance_id,
                node: &node,
                ancestors: &ancestors,
                ancestor_states: &[],
                node_state: serde_json::json!({}),
                pack_states: HashMap::new(),
                history: &[],
                user_input: Some("hello".to_string()),
                step_budget: (0, 50),
                step_warning_threshold: 5,
                is_worker: false,
            },
        )
        .await
        .unwrap();

        assert!(matches!(output.yield_reason, charter_types::YieldReason::EndTurn));
        assert_eq!(output.response.as_deref(), Some("hi"));
        assert_eq!(output.messages.len(), 1);
    }

    #[tokio::test]
    async fn tool_use_hands_off_to_the_pipeline() {
        let charter = echo_charter();
        let node = charter.node("root").unwrap().clone();
        let instance_id = charter_types::InstanceId::new();
        let ancestors: Vec<AncestorLink<'_>> = Vec::new();

        let output = run_executor(
            &ToolUseBackend,
            ExecutorInput {
                charter: &charter,
                instance_id,
                node: &node,
                ancestors: &ancestors,
                ancestor_states: &[],
                node_state: serde_json::json!({}),
                pack_states: HashMap::new(),
                history: &[],
                user_input: Some("hello".to_string()),
                step_budget: (0, 50),
                step_warning_threshold: 5,
                is_worker: false,
            },
        )
        .await
        .unwrap();

        assert!(matches!(output.yield_reason, charter_types::YieldReason::ToolUse));
        // Assistant tool-use message plus the pipeline's tool-result message.
        assert_eq!(output.messages.len(), 2);
    }
}
