//! Node definitions: the static, charter-registered blueprints that
//! instances realize.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::command::Command;
use crate::instance::ExecutorConfig;
use crate::tool::ToolDyn;
use crate::transition::Transition;

/// A charter-registered node: instructions, a state shape, and the
/// tools/transitions/commands visible while an instance sits in it.
///
/// Name resolution layers node scope over ancestor scopes over charter
/// scope (spec §4.3 four-scope resolution); this struct holds only the
/// node's own scope. Packs contribute a further layer, named in
/// `packs` and resolved against the charter's pack registry.
pub struct Node {
    /// Unique id within the charter.
    pub id: String,
    /// Free-text instructions injected into the system prompt while an
    /// instance of this node is active.
    pub instructions: String,
    /// JSON Schema (draft 2020-12) instances of this node validate
    /// their state against.
    pub state_schema: Value,
    /// Tools declared directly on this node.
    pub tools: HashMap<String, Arc<dyn ToolDyn>>,
    /// Transitions declared directly on this node. Transitions do not
    /// participate in ancestor shadowing — they resolve only against
    /// the current node (spec §4.3: "transitions resolve against the
    /// current node only").
    pub transitions: HashMap<String, Transition>,
    /// Commands declared directly on this node.
    pub commands: HashMap<String, Command>,
    /// Default state assigned when an instance of this node is
    /// created without an explicit state.
    pub initial_state: Option<Value>,
    /// Names of packs visible to instances of this node.
    pub packs: Vec<String>,
    /// Whether instances of this node run as worker (non-primary)
    /// leaves by default.
    pub worker: bool,
    /// Default executor override for instances of this node.
    pub executor_config: Option<ExecutorConfig>,
}

impl Node {
    /// Start building a node with the given id and instructions.
    #[must_use]
    pub fn new(id: impl Into<String>, instructions: impl Into<String>, state_schema: Value) -> Self {
        Self {
            id: id.into(),
            instructions: instructions.into(),
            state_schema,
            tools: HashMap::new(),
            transitions: HashMap::new(),
            commands: HashMap::new(),
            initial_state: None,
            packs: Vec::new(),
            worker: false,
            executor_config: None,
        }
    }

    /// Register a tool on this node.
    #[must_use]
    pub fn with_tool(mut self, tool: Arc<dyn ToolDyn>) -> Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    /// Register a transition on this node.
    #[must_use]
    pub fn with_transition(mut self, name: impl Into<String>, transition: Transition) -> Self {
        self.transitions.insert(name.into(), transition);
        self
    }

    /// Register a command on this node.
    #[must_use]
    pub fn with_command(mut self, command: Command) -> Self {
        self.commands.insert(command.name.clone(), command);
        self
    }

    /// Make this node a pack consumer.
    #[must_use]
    pub fn with_pack(mut self, pack_name: impl Into<String>) -> Self {
        self.packs.push(pack_name.into());
        self
    }

    /// Set the default initial state.
    #[must_use]
    pub fn with_initial_state(mut self, state: Value) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Mark this node's instances as worker leaves by default.
    #[must_use]
    pub fn as_worker(mut self) -> Self {
        self.worker = true;
        self
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .field("transitions", &self.transitions.keys().collect::<Vec<_>>())
            .field("packs", &self.packs)
            .finish()
    }
}
