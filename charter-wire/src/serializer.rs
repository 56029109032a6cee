//! Ref-substitution serialization of a running [`Machine`] (spec §4.8,
//! C9): charter-registered nodes and transitions collapse to a `{
//! ref }`; anything the charter doesn't know about — nodes materialized
//! inline by a `General` transition or a dynamic `spawn` — is inlined
//! as a [`SerialNode`]/[`SerialTransition`] instead.
//!
//! `Transition::Code` and `Transition::General` bodies are backed by
//! either a closure or call-time-only data, so neither has a concrete
//! serializable shape; a node's transition entry of either kind is
//! simply absent from the serialized form unless the same name also
//! happens to be charter-registered (in which case the registered
//! definition, not the node's own, is what gets referenced).

use std::collections::HashMap;
use std::sync::Arc;

use charter_control::hydrate::hydrate_node;
use charter_types::{
    Charter, ExecutorConfig, Instance, InstanceId, Machine, Message, Node, RefOr, SerialNode,
    SerialTransition, SuspendInfo, Transition,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WireError;

/// One instance's durable form: its node by reference or inline, plus
/// everything else already carried on [`Instance`] verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedInstance {
    /// Id, preserved across the round trip.
    pub id: InstanceId,
    /// The node this instance realizes, by reference or inline.
    pub node: RefOr<SerialNode>,
    /// Current state.
    pub state: Value,
    /// Ordered child instance ids.
    pub children: Vec<InstanceId>,
    /// Pack states, present only on the root instance.
    pub pack_states: Option<HashMap<String, Value>>,
    /// Executor override, if any.
    pub executor_config: Option<ExecutorConfig>,
    /// Worker-leaf override, if any.
    pub worker_override: Option<bool>,
    /// Suspension record, if suspended.
    pub suspended: Option<SuspendInfo>,
}

/// A whole machine's durable form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedMachine {
    /// Name of the charter this payload was produced against.
    pub charter_name: String,
    /// The root instance's id.
    pub root_id: InstanceId,
    /// Every instance, by id.
    pub instances: HashMap<InstanceId, SerializedInstance>,
    /// The full message history.
    pub history: Vec<Message>,
}

/// Turn a concrete [`Node`] into a [`SerialNode`], deciding per
/// transition whether it's representable as a ref, an inline
/// `SerialTransition`, or not at all.
#[must_use]
pub fn node_to_serial(charter: &Charter, node: &Node) -> SerialNode {
    let mut transitions = HashMap::new();
    for (name, transition) in &node.transitions {
        let entry = if charter.transitions.contains_key(name) {
            RefOr::Ref { name: name.clone() }
        } else {
            match transition {
                Transition::Serial { description, node } => RefOr::Inline(Box::new(SerialTransition {
                    description: description.clone(),
                    node: node.clone(),
                    arguments: None,
                })),
                Transition::Code { .. } | Transition::General { .. } => continue,
            }
        };
        transitions.insert(name.clone(), entry);
    }

    SerialNode {
        instructions: node.instructions.clone(),
        state_schema: node.state_schema.clone(),
        transitions,
        tools: node.tools.keys().cloned().collect(),
        initial_state: node.initial_state.clone(),
    }
}

fn instance_to_serial(charter: &Charter, machine: &Machine, instance: &Instance) -> Result<SerializedInstance, WireError> {
    let node = if charter.node(&instance.node_id).is_some() {
        RefOr::Ref { name: instance.node_id.clone() }
    } else if let Some(inline) = machine.inline_nodes.get(&instance.node_id) {
        RefOr::Inline(Box::new(node_to_serial(charter, inline)))
    } else {
        return Err(WireError::UnknownNodeRef(instance.node_id.clone()));
    };

    Ok(SerializedInstance {
        id: instance.id,
        node,
        state: instance.state.clone(),
        children: instance.children.clone(),
        pack_states: instance.pack_states.clone(),
        executor_config: instance.executor_config.clone(),
        worker_override: instance.worker_override,
        suspended: instance.suspended.clone(),
    })
}

/// Serialize a machine's whole instance tree and history.
pub fn serialize_machine(machine: &Machine) -> Result<SerializedMachine, WireError> {
    let mut instances = HashMap::with_capacity(machine.instances.len());
    for instance in machine.instances.values() {
        instances.insert(instance.id, instance_to_serial(&machine.charter, machine, instance)?);
    }
    Ok(SerializedMachine {
        charter_name: machine.charter.name.clone(),
        root_id: machine.root_id,
        instances,
        history: machine.history.clone(),
    })
}

/// Rebuild a [`Machine`] from its durable form against `charter`.
///
/// Inline nodes are hydrated under freshly minted synthetic ids rather
/// than whatever synthetic id they carried when first serialized —
/// round-tripping only needs the rebuilt tree to *behave* like the
/// original, not to reuse its internal node-id bookkeeping.
pub fn deserialize_machine(charter: Arc<Charter>, serialized: &SerializedMachine) -> Result<Machine, WireError> {
    let mut instances = HashMap::with_capacity(serialized.instances.len());
    let mut inline_nodes = HashMap::new();

    for serialized_instance in serialized.instances.values() {
        let node_id = match &serialized_instance.node {
            RefOr::Ref { name } => {
                if charter.node(name).is_none() {
                    return Err(WireError::UnknownNodeRef(name.clone()));
                }
                name.clone()
            }
            RefOr::Inline(serial) => {
                let id = format!("inline:{}", uuid::Uuid::new_v4());
                let node = Arc::new(hydrate_node(&charter, &id, serial));
                inline_nodes.insert(id.clone(), node);
                id
            }
        };

        instances.insert(
            serialized_instance.id,
            Instance {
                id: serialized_instance.id,
                node_id,
                state: serialized_instance.state.clone(),
                children: serialized_instance.children.clone(),
                pack_states: serialized_instance.pack_states.clone(),
                executor_config: serialized_instance.executor_config.clone(),
                worker_override: serialized_instance.worker_override,
                suspended: serialized_instance.suspended.clone(),
            },
        );
    }

    Ok(Machine {
        charter,
        root_id: serialized.root_id,
        instances,
        history: serialized.history.clone(),
        queue: Vec::new(),
        inline_nodes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use charter_types::{DefaultPromptBuilder, ExecutorConfig as EC};
    use std::collections::HashMap as StdHashMap;

    fn two_node_charter() -> Arc<Charter> {
        let mut nodes = StdHashMap::new();
        nodes.insert(
            "a".to_string(),
            Arc::new(
                Node::new("a", "node a", serde_json::json!({ "type": "object" }))
                    .with_initial_state(serde_json::json!({})),
            ),
        );
        nodes.insert(
            "b".to_string(),
            Arc::new(Node::new("b", "node b", serde_json::json!({ "type": "object" }))),
        );
        Arc::new(Charter {
            name: "roundtrip".into(),
            executor: EC::default(),
            tools: StdHashMap::new(),
            transitions: StdHashMap::new(),
            nodes,
            packs: StdHashMap::new(),
            instructions: None,
            system_prompt_builder: Arc::new(DefaultPromptBuilder),
            root_node: "a".into(),
        })
    }

    #[test]
    fn round_trips_a_registered_node_tree() {
        let charter = two_node_charter();
        let mut machine = Machine::new(charter.clone());
        let child = Instance::new("b", serde_json::json!({ "n": 1 }));
        let child_id = child.id;
        machine.instances.insert(child_id, child);
        machine.instance_mut(machine.root_id).unwrap().children.push(child_id);
        machine.history.push(Message::user("hi"));

        let serialized = serialize_machine(&machine).unwrap();
        let restored = deserialize_machine(charter, &serialized).unwrap();

        assert_eq!(restored.root_id, machine.root_id);
        assert_eq!(restored.history.len(), 1);
        let restored_child = restored.instance(child_id).unwrap();
        assert_eq!(restored_child.node_id, "b");
        assert_eq!(restored_child.state, serde_json::json!({ "n": 1 }));
    }

    #[test]
    fn inlines_a_node_absent_from_the_charter() {
        let charter = two_node_charter();
        let mut machine = Machine::new(charter.clone());
        let inline_node = Arc::new(Node::new("inline:scratch", "ad hoc", serde_json::json!({ "type": "object" })));
        machine.inline_nodes.insert("inline:scratch".to_string(), inline_node);
        machine.instance_mut(machine.root_id).unwrap().node_id = "inline:scratch".to_string();

        let serialized = serialize_machine(&machine).unwrap();
        let root_serial = &serialized.instances[&machine.root_id];
        assert!(matches!(root_serial.node, RefOr::Inline(_)));

        let restored = deserialize_machine(charter, &serialized).unwrap();
        let restored_root = restored.root();
        assert!(restored.inline_nodes.contains_key(&restored_root.node_id));
        assert_ne!(restored_root.node_id, "inline:scratch");
    }
}
