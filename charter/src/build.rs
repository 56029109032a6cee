//! Charter and node construction (spec §6: `createCharter`,
//! `createNode`), with the validation the spec calls out explicitly:
//! tool-name/key parity, node-scope collisions, and executor presence.

use std::collections::HashMap;
use std::sync::Arc;

use charter_resolve::validate_node_scopes;
use charter_types::{
    Charter, ConfigError, DefaultPromptBuilder, ExecutorConfig, Node, Pack, SystemPromptBuilder,
    ToolDyn, Transition,
};
use serde_json::Value;

/// Everything needed to build a [`Charter`]. Every collection is
/// supplied as a `Vec` rather than a pre-built map so callers don't
/// have to duplicate each item's own name/id as a map key — this
/// constructor derives the keys and rejects duplicates itself (spec
/// §6: "validates tool-name/key parity").
pub struct CharterConfig {
    /// Human-readable name.
    pub name: String,
    /// Default executor configuration. Required — a charter built
    /// without one is a configuration error (spec §6).
    pub executor: Option<ExecutorConfig>,
    /// Charter-wide tools.
    pub tools: Vec<Arc<dyn ToolDyn>>,
    /// Charter-wide transitions, by name.
    pub transitions: HashMap<String, Transition>,
    /// Every node in the charter.
    pub nodes: Vec<Node>,
    /// Every pack in the charter.
    pub packs: Vec<Pack>,
    /// Charter-wide instructions.
    pub instructions: Option<String>,
    /// System-prompt builder override. Defaults to
    /// [`DefaultPromptBuilder`].
    pub system_prompt_builder: Option<Arc<dyn SystemPromptBuilder>>,
    /// The node id new root instances start in.
    pub root_node: String,
}

impl CharterConfig {
    /// Start building a config with just the required fields.
    #[must_use]
    pub fn new(name: impl Into<String>, root_node: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            executor: Some(ExecutorConfig::default()),
            tools: Vec::new(),
            transitions: HashMap::new(),
            nodes: Vec::new(),
            packs: Vec::new(),
            instructions: None,
            system_prompt_builder: None,
            root_node: root_node.into(),
        }
    }

    /// Add a node.
    #[must_use]
    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Add a pack.
    #[must_use]
    pub fn with_pack(mut self, pack: Pack) -> Self {
        self.packs.push(pack);
        self
    }

    /// Add a charter-wide tool.
    #[must_use]
    pub fn with_tool(mut self, tool: Arc<dyn ToolDyn>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Add a charter-wide transition.
    #[must_use]
    pub fn with_transition(mut self, name: impl Into<String>, transition: Transition) -> Self {
        self.transitions.insert(name.into(), transition);
        self
    }
}

/// Build a node with a caller-chosen id.
///
/// Unlike `createNode`'s uuid-assignment in spec §6, charter nodes are
/// addressed by a stable name (transitions and `{ ref }` targets name
/// them directly), so this facade leaves id assignment to the caller
/// rather than generating an opaque one nobody would reference by
/// hand. Use [`create_node_with_generated_id`] for the literal
/// spec-described behavior.
#[must_use]
pub fn create_node(id: impl Into<String>, instructions: impl Into<String>, state_schema: Value) -> Node {
    Node::new(id, instructions, state_schema)
}

/// Build a node with a freshly generated uuid id, matching spec §6's
/// `createNode` literally. Prefer [`create_node`] for nodes a charter
/// author wants to reference by a readable name.
#[must_use]
pub fn create_node_with_generated_id(instructions: impl Into<String>, state_schema: Value) -> Node {
    Node::new(uuid::Uuid::new_v4().to_string(), instructions, state_schema)
}

/// Validate and freeze a [`CharterConfig`] into an immutable [`Charter`]
/// (spec §6: `createCharter`).
pub fn create_charter(config: CharterConfig) -> Result<Arc<Charter>, ConfigError> {
    let executor = config.executor.ok_or(ConfigError::MissingExecutor)?;

    let mut nodes = HashMap::with_capacity(config.nodes.len());
    for node in config.nodes {
        validate_node_scopes(&node).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let id = node.id.clone();
        if nodes.insert(id.clone(), Arc::new(node)).is_some() {
            return Err(ConfigError::Invalid(format!("duplicate node id in charter: {id}")));
        }
    }

    if !nodes.contains_key(&config.root_node) {
        return Err(ConfigError::Invalid(format!("root node not found: {}", config.root_node)));
    }

    let mut tools = HashMap::with_capacity(config.tools.len());
    for tool in config.tools {
        let name = tool.name().to_string();
        if tools.insert(name.clone(), tool).is_some() {
            return Err(ConfigError::Invalid(format!("duplicate charter tool name: {name}")));
        }
    }

    let mut packs = HashMap::with_capacity(config.packs.len());
    for pack in config.packs {
        let name = pack.name.clone();
        if packs.insert(name.clone(), Arc::new(pack)).is_some() {
            return Err(ConfigError::Invalid(format!("duplicate pack name: {name}")));
        }
    }

    Ok(Arc::new(Charter {
        name: config.name,
        executor,
        tools,
        transitions: config.transitions,
        nodes,
        packs,
        instructions: config.instructions,
        system_prompt_builder: config
            .system_prompt_builder
            .unwrap_or_else(|| Arc::new(DefaultPromptBuilder)),
        root_node: config.root_node,
    }))
}
