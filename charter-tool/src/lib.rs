//! The tool pipeline: scoped tool contexts, built-in tools
//! (`updateState`, `transition`, `transition_<name>`), and the
//! at-most-one-queued-transition discipline (spec §4.3).

pub mod builtin;
pub mod context;
pub mod pipeline;

pub use context::{ReadOnlyAncestorContext, WritableNodeContext, WritablePackContext, WritableState};
pub use pipeline::{run_tool_pipeline, spawn_child_specs, PipelineInput, PipelineOutput, ToolCall};

#[cfg(test)]
mod tests {
    use super::*;
    use charter_resolve::AncestorLink;
    use charter_types::{Charter, DefaultPromptBuilder, ExecutorConfig, FnTool, Node, YieldReason};
    use std::collections::HashMap;
    use std::sync::Arc;

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
        let node = Arc::new(node);
        nodes.insert("root".to_string(), node.clone());
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
    async fn s1_simple_turn_echoes_and_ends_turn() {
        let charter = echo_charter();
        let node = charter.node("root").unwrap().clone();
        let instance_id = charter_types::InstanceId::new();
        let ancestors: Vec<AncestorLink<'_>> = Vec::new();

        let output = run_tool_pipeline(PipelineInput {
            charter: &charter,
            instance_id,
            node: &node,
            ancestors: &ancestors,
            node_state: serde_json::json!({}),
            pack_states: HashMap::new(),
            history: &[],
            calls: vec![ToolCall {
                id: "call-1".into(),
                name: "echo".into(),
                input: serde_json::json!("hello"),
            }],
            any_terminal: false,
        })
        .await;

        assert!(matches!(output.yield_reason, YieldReason::ToolUse));
        assert_eq!(output.messages.len(), 1);
    }

    #[tokio::test]
    async fn second_transition_call_in_same_batch_is_rejected() {
        let charter = echo_charter();
        let mut node = (*charter.node("root").unwrap().clone()).clone_for_test();
        node.transitions.insert(
            "go".to_string(),
            charter_types::Transition::General { description: "go".into() },
        );
        let node = Arc::new(node);
        let instance_id = charter_types::InstanceId::new();
        let ancestors: Vec<AncestorLink<'_>> = Vec::new();

        let output = run_tool_pipeline(PipelineInput {
            charter: &charter,
            instance_id,
            node: &node,
            ancestors: &ancestors,
            node_state: serde_json::json!({}),
            pack_states: HashMap::new(),
            history: &[],
            calls: vec![
                ToolCall {
                    id: "c1".into(),
                    name: "transition_go".into(),
                    input: serde_json::json!({ "node": { "ref": "root" } }),
                },
                ToolCall {
                    id: "c2".into(),
                    name: "transition_go".into(),
                    input: serde_json::json!({ "node": { "ref": "root" } }),
                },
            ],
            any_terminal: false,
        })
        .await;

        let has_rejection = output.messages.iter().any(|m| {
            m.content.iter().any(|b| {
                matches!(b, charter_types::ContentBlock::ToolResult { is_error: true, content, .. }
                    if content.as_str().map(|s| s.contains("already queued")).unwrap_or(false))
            })
        });
        assert!(has_rejection);
    }

    trait CloneForTest {
        fn clone_for_test(&self) -> Node;
    }

    impl CloneForTest for Node {
        fn clone_for_test(&self) -> Node {
            let mut node = Node::new(self.id.clone(), self.instructions.clone(), self.state_schema.clone());
            node.tools = self.tools.clone();
            node.transitions = HashMap::new();
            node.initial_state = self.initial_state.clone();
            node
        }
    }
}
