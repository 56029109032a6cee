//! Tree surgery for transition outcomes (spec §4.4) and the
//! synchronous command executor (spec §4.5).

pub mod command;
pub mod hydrate;
pub mod transition;

pub use command::{default_target_instance, run_command, CommandOutcome};
pub use hydrate::{hydrate_node, materialize_node};
pub use transition::{apply_transition_result, excise_ceded_instance};

#[cfg(test)]
mod tests {
    use super::*;
    use charter_types::{
        Charter, DefaultPromptBuilder, ExecutorConfig, Machine, Node, NodeTarget, TransitionResult,
    };
    use std::collections::HashMap;
    use std::sync::Arc;

    fn two_node_charter() -> Arc<Charter> {
        let mut nodes = HashMap::new();
        nodes.insert(
            "a".to_string(),
            Arc::new(
                Node::new("a", "node a", serde_json::json!({ "type": "object" }))
                    .with_initial_state(serde_json::json!({})),
            ),
        );
        nodes.insert(
            "b".to_string(),
            Arc::new(
                Node::new("b", "node b", serde_json::json!({ "type": "object" }))
                    .with_initial_state(serde_json::json!({ "arrived": true })),
            ),
        );
        Arc::new(Charter {
            name: "test".into(),
            executor: ExecutorConfig::default(),
            tools: HashMap::new(),
            transitions: HashMap::new(),
            nodes,
            packs: HashMap::new(),
            instructions: None,
            system_prompt_builder: Arc::new(DefaultPromptBuilder),
            root_node: "a".into(),
        })
    }

    #[test]
    fn transition_to_replaces_node_and_clears_children() {
        let charter = two_node_charter();
        let mut machine = Machine::new(charter);
        let root_id = machine.root_id;

        apply_transition_result(
            &mut machine,
            root_id,
            TransitionResult::TransitionTo {
                node: NodeTarget::Ref { name: "b".to_string() },
                state: None,
                executor_config: None,
            },
        )
        .unwrap();

        let instance = machine.instance(root_id).unwrap();
        assert_eq!(instance.node_id, "b");
        assert_eq!(instance.state, serde_json::json!({ "arrived": true }));
        assert!(instance.children.is_empty());
    }

    #[test]
    fn spawn_appends_children_in_order() {
        let charter = two_node_charter();
        let mut machine = Machine::new(charter);
        let root_id = machine.root_id;

        apply_transition_result(
            &mut machine,
            root_id,
            TransitionResult::Spawn {
                children: vec![charter_types::SpawnChild {
                    node: NodeTarget::Ref { name: "b".to_string() },
                    state: None,
                    executor_config: None,
                    worker: true,
                }],
            },
        )
        .unwrap();

        let instance = machine.instance(root_id).unwrap();
        assert_eq!(instance.children.len(), 1);
        let child = machine.instance(instance.children[0]).unwrap();
        assert_eq!(child.node_id, "b");
        assert_eq!(child.worker_override, Some(true));
    }

    #[test]
    #[should_panic(expected = "depth cap")]
    fn spawn_beyond_depth_cap_panics() {
        let charter = two_node_charter();
        let mut machine = Machine::new(charter);
        let mut leaf_id = machine.root_id;

        for _ in 0..=charter_types::MAX_TREE_DEPTH {
            apply_transition_result(
                &mut machine,
                leaf_id,
                TransitionResult::Spawn {
                    children: vec![charter_types::SpawnChild {
                        node: NodeTarget::Ref { name: "b".to_string() },
                        state: None,
                        executor_config: None,
                        worker: true,
                    }],
                },
            )
            .unwrap();
            leaf_id = machine.instance(leaf_id).unwrap().children[0];
        }
    }
}
