//! The machine: a running instance tree paired with its charter and
//! history, and the `Step` values produced as it's driven forward.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::charter::Charter;
use crate::instance::{Instance, InstanceId, SuspendInfo};
use crate::message::Message;
use crate::node::Node;
use crate::transition::CedeContent;

/// Why a step yielded back to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YieldReason {
    /// The active leaf produced a final assistant turn with no further
    /// tool calls or transitions queued.
    EndTurn,
    /// A non-terminal tool call was made.
    ToolUse,
    /// The active leaf ceded control to its parent.
    Cede,
    /// The active leaf suspended pending external resume.
    Suspend,
    /// The inference backend stopped due to its own token limit.
    MaxTokens,
    /// A command was applied out of band.
    Command,
    /// Driving stopped because of an externally supplied input (e.g. a
    /// cancellation).
    External,
}

/// One unit of progress produced by driving a [`Machine`] forward.
#[derive(Debug, Clone)]
pub struct Step {
    /// The instance this step advanced.
    pub instance_id: InstanceId,
    /// Messages appended to history as part of this step.
    pub messages: Vec<Message>,
    /// Why the step stopped.
    pub yield_reason: YieldReason,
    /// The assistant's final text for this step, if any.
    pub response: Option<String>,
    /// Whether the whole turn (not just this step) is now finished.
    pub done: bool,
    /// Content carried forward by a `cede` outcome, if that's why this
    /// step yielded.
    pub cede_content: Option<CedeContent>,
    /// Suspension record, if that's why this step yielded.
    pub suspend_info: Option<SuspendInfo>,
}

/// External input fed to a machine between steps: a fresh user
/// message, or a resume payload for a specific suspended instance.
#[derive(Debug, Clone)]
pub enum MachineInput {
    /// A new user message appended to history before driving forward.
    User(Message),
    /// Resume a specific suspended instance, optionally supplying a
    /// value the resuming tool/command consumes.
    Resume {
        /// The suspended instance to resume.
        instance_id: InstanceId,
        /// Id echoed back from the original `suspend_id`.
        suspend_id: String,
        /// Value handed to whatever is resuming.
        value: Option<Value>,
        /// Whether `value` represents an error outcome, for
        /// tool-originated suspensions that get replayed as a
        /// synthetic `tool_result` (spec §4.7).
        is_error: bool,
    },
}

/// A running instance tree paired with its charter, history, and
/// pending event queue.
///
/// The tree is an arena: `instances` owns every [`Instance`] by value,
/// addressed by id, so structural edits (spawn, transition, cede) are
/// plain map operations rather than pointer surgery (spec Design
/// Notes: "Cyclic graphs").
pub struct Machine {
    /// The static registry this machine runs against.
    pub charter: Arc<Charter>,
    /// The root instance's id.
    pub root_id: InstanceId,
    /// Every live instance, by id.
    pub instances: HashMap<InstanceId, Instance>,
    /// The full message history, in order.
    pub history: Vec<Message>,
    /// Events queued during the current step, applied to the tree
    /// before the next inference call (spec §4.7 step 2c).
    pub queue: Vec<Message>,
    /// Nodes materialized inline by a `General` transition or spawn
    /// rather than looked up in the charter's registry (spec §4.8:
    /// "Unregistered items are inlined"). Keyed by a synthetic id
    /// distinct from any charter node id.
    pub inline_nodes: HashMap<String, Arc<Node>>,
}

impl Machine {
    /// Create a fresh machine with a single root instance in the
    /// charter's configured root node.
    #[must_use]
    pub fn new(charter: Arc<Charter>) -> Self {
        let root_node = charter.root_node.clone();
        let initial_state = charter
            .node(&root_node)
            .and_then(|n| n.initial_state.clone())
            .unwrap_or(Value::Null);
        let root = Instance::new_root(root_node, initial_state);
        let root_id = root.id;
        let mut instances = HashMap::new();
        instances.insert(root_id, root);
        Self {
            charter,
            root_id,
            instances,
            history: Vec::new(),
            queue: Vec::new(),
            inline_nodes: HashMap::new(),
        }
    }

    /// Look up a node by id, checking the charter's registry first and
    /// falling back to this machine's inline nodes.
    #[must_use]
    pub fn resolve_node(&self, node_id: &str) -> Option<Arc<Node>> {
        self.charter
            .node(node_id)
            .cloned()
            .or_else(|| self.inline_nodes.get(node_id).cloned())
    }

    /// Borrow an instance by id.
    #[must_use]
    pub fn instance(&self, id: InstanceId) -> Option<&Instance> {
        self.instances.get(&id)
    }

    /// Mutably borrow an instance by id.
    #[must_use]
    pub fn instance_mut(&mut self, id: InstanceId) -> Option<&mut Instance> {
        self.instances.get_mut(&id)
    }

    /// The root instance. Always present.
    #[must_use]
    pub fn root(&self) -> &Instance {
        self.instances
            .get(&self.root_id)
            .expect("root instance always present")
    }

    /// Depth of `id` below the root (the root itself is depth 0), or
    /// `None` if `id` isn't reachable by walking children from the
    /// root (spec §9: "arena of `Instance` by id; children are a list
    /// of ids").
    #[must_use]
    pub fn depth_of(&self, id: InstanceId) -> Option<usize> {
        fn walk(machine: &Machine, current: InstanceId, target: InstanceId, depth: usize) -> Option<usize> {
            if current == target {
                return Some(depth);
            }
            let instance = machine.instance(current)?;
            for child in &instance.children {
                if let Some(found) = walk(machine, *child, target, depth + 1) {
                    return Some(found);
                }
            }
            None
        }
        walk(self, self.root_id, id, 0)
    }
}

/// Maximum instance tree depth (spec §7: "exceeds depth cap (default
/// 100)").
pub const MAX_TREE_DEPTH: usize = 100;
