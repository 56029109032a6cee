//! Materializing a [`charter_types::NodeTarget`] into a concrete node,
//! registering inline definitions on the machine as needed (spec
//! §4.8: "Unregistered items are inlined").

use std::sync::Arc;

use charter_types::{Charter, Machine, Node, NodeTarget, RefOr, SerialNode, SerialTransition, Transition};

/// Resolve a target into `(node_id, node)`, inserting any inline node
/// into `machine.inline_nodes` under a synthetic id.
pub fn materialize_node(machine: &mut Machine, target: &NodeTarget) -> (String, Arc<Node>) {
    match target {
        RefOr::Ref { name } => {
            let node = machine
                .resolve_node(name)
                .unwrap_or_else(|| panic!("unknown node ref: {name}"));
            (name.clone(), node)
        }
        RefOr::Inline(serial) => {
            let id = format!("inline:{}", uuid::Uuid::new_v4());
            let node = Arc::new(hydrate_node(&machine.charter, &id, serial));
            machine.inline_nodes.insert(id.clone(), node.clone());
            (id, node)
        }
    }
}

/// Turn a [`SerialNode`] into a concrete [`Node`], resolving its tool
/// names against the charter's tool registry (inline tool closures
/// cannot be represented this way, per spec §4.8 — names with no
/// charter match are simply absent).
#[must_use]
pub fn hydrate_node(charter: &Charter, id: &str, serial: &SerialNode) -> Node {
    let mut node = Node::new(id.to_string(), serial.instructions.clone(), serial.state_schema.clone());
    node.initial_state = serial.initial_state.clone();
    for name in &serial.tools {
        if let Some(tool) = charter.tools.get(name) {
            node.tools.insert(name.clone(), tool.clone());
        }
    }
    for (name, target) in &serial.transitions {
        let transition = match target {
            RefOr::Ref { name: ref_name } => charter.transitions.get(ref_name).cloned(),
            RefOr::Inline(serial_transition) => Some(hydrate_transition(serial_transition)),
        };
        if let Some(transition) = transition {
            node.transitions.insert(name.clone(), transition);
        }
    }
    node
}

fn hydrate_transition(serial: &SerialTransition) -> Transition {
    Transition::Serial {
        description: serial.description.clone(),
        node: serial.node.clone(),
    }
}
