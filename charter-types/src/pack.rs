//! Packs: named bundles of shared, root-scoped state and tools,
//! available to any node that opts in (spec §4.6).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::command::Command;
use crate::tool::ToolDyn;

/// A charter-registered pack.
///
/// Pack state lives on the root instance only and is lazily
/// initialized from `initial_state` the first time a node that
/// declares this pack is reached (spec §3 Lifecycle). Pack tools
/// write through `ToolContext::update_state` exactly like node tools,
/// but the state they read and write is the pack's, not the node's.
pub struct Pack {
    /// Unique name within the charter.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema the pack's state validates against.
    pub state_schema: Value,
    /// Tools contributed to any node that declares this pack.
    pub tools: HashMap<String, Arc<dyn ToolDyn>>,
    /// Commands contributed to any node that declares this pack.
    pub commands: HashMap<String, Command>,
    /// State assigned the first time this pack is initialized on a
    /// root instance.
    pub initial_state: Option<Value>,
}

impl Pack {
    /// Start building a pack with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, state_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            state_schema,
            tools: HashMap::new(),
            commands: HashMap::new(),
            initial_state: None,
        }
    }

    /// Register a tool on this pack.
    #[must_use]
    pub fn with_tool(mut self, tool: Arc<dyn ToolDyn>) -> Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    /// Register a command on this pack.
    #[must_use]
    pub fn with_command(mut self, command: Command) -> Self {
        self.commands.insert(command.name.clone(), command);
        self
    }

    /// Set the state this pack initializes to on first access.
    #[must_use]
    pub fn with_initial_state(mut self, state: Value) -> Self {
        self.initial_state = Some(state);
        self
    }
}

impl std::fmt::Debug for Pack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pack")
            .field("name", &self.name)
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}
