//! The runtime instance tree: live, stateful realizations of nodes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Unique identifier for an instance within a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub Uuid);

impl InstanceId {
    /// Mint a fresh, random instance id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-node (or per-instance) override of which executor variant runs
/// a leaf — e.g. pinning a worker subtree to a cheaper model. Opaque
/// to the runtime beyond its name; the executor crate interprets it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Name of the executor variant to use (e.g. `"standard"`,
    /// `"worker"`, or a charter-specific name). `None` means "inherit
    /// the ambient default."
    pub variant: Option<String>,
}

/// What caused an instance to suspend. The machine loop's resume path
/// (spec §4.7) only synthesizes a `tool_result` injection for
/// tool-originated suspensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspendSource {
    /// A tool returned [`crate::tool::ToolOutcome::Suspend`].
    Tool,
    /// A transition or command produced a `suspend` outcome.
    Transition,
}

/// Suspension metadata attached to a paused instance (spec §3
/// Lifecycle: "Suspension").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspendInfo {
    /// Id the caller must echo back in a resume input.
    pub suspend_id: String,
    /// Human-readable reason surfaced to clients while suspended.
    pub reason: String,
    /// When the suspension was created.
    pub suspended_at: DateTime<Utc>,
    /// Opaque metadata passed through unchanged.
    pub metadata: Option<Value>,
    /// What produced this suspension.
    pub source: SuspendSource,
}

/// A live, stateful realization of a [`crate::node::Node`] in the
/// running tree.
///
/// The tree is an arena: instances reference their children by id
/// through [`crate::instance::Machine::instances`] rather than owning
/// pointers, so the structure is trivially acyclic-by-construction and
/// cheap to walk, mutate, or serialize (spec Design Notes: "Cyclic
/// graphs").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    /// Unique id within the machine.
    pub id: InstanceId,
    /// The node this instance realizes.
    pub node_id: String,
    /// Current state, valid against `node.state_schema`.
    pub state: Value,
    /// Ordered child instance ids.
    pub children: Vec<InstanceId>,
    /// Pack states, present only on the root instance (spec invariant
    /// 3: "packStates exists only on the root instance").
    pub pack_states: Option<HashMap<String, Value>>,
    /// Executor override cascaded from a transition or spawn.
    pub executor_config: Option<ExecutorConfig>,
    /// Per-instance override of the owning node's default `worker`
    /// flag, set by a `spawn` outcome that explicitly marks a child as
    /// primary or worker regardless of its node's default.
    pub worker_override: Option<bool>,
    /// Present while the instance is paused pending an external
    /// resume.
    pub suspended: Option<SuspendInfo>,
}

impl Instance {
    /// Create a fresh, non-root instance with no children and no pack
    /// states.
    #[must_use]
    pub fn new(node_id: impl Into<String>, state: Value) -> Self {
        Self {
            id: InstanceId::new(),
            node_id: node_id.into(),
            state,
            children: Vec::new(),
            pack_states: None,
            executor_config: None,
            worker_override: None,
            suspended: None,
        }
    }

    /// Create a fresh root instance with lazily-initialized pack
    /// states (spec §3 Lifecycle: "initialized lazily from
    /// `pack.initialState` on first access at the root").
    #[must_use]
    pub fn new_root(node_id: impl Into<String>, state: Value) -> Self {
        Self {
            pack_states: Some(HashMap::new()),
            ..Self::new(node_id, state)
        }
    }

    /// True when this instance has no children.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}
