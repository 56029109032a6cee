//! The charter: the static, immutable registry a machine runs against.

use std::collections::HashMap;
use std::sync::Arc;

use crate::instance::ExecutorConfig;
use crate::node::Node;
use crate::pack::Pack;
use crate::tool::ToolDyn;
use crate::transition::Transition;

/// Context handed to a [`SystemPromptBuilder`].
pub struct PromptContext<'a> {
    /// The active node's own instructions.
    pub node_instructions: &'a str,
    /// Ancestor instructions, nearest-first.
    pub ancestor_instructions: Vec<&'a str>,
    /// Charter-wide instructions, if any.
    pub charter_instructions: Option<&'a str>,
}

/// Builds the system prompt presented to the inference backend from an
/// instance's instruction chain. The default implementation simply
/// concatenates node, then ancestor, then charter instructions;
/// charters with richer prompt assembly needs supply their own.
pub trait SystemPromptBuilder: Send + Sync {
    /// Build the system prompt text.
    fn build(&self, ctx: &PromptContext<'_>) -> String;
}

/// The default, concatenation-based prompt builder.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPromptBuilder;

impl SystemPromptBuilder for DefaultPromptBuilder {
    fn build(&self, ctx: &PromptContext<'_>) -> String {
        let mut parts = vec![ctx.node_instructions.to_string()];
        parts.extend(ctx.ancestor_instructions.iter().map(|s| s.to_string()));
        if let Some(charter) = ctx.charter_instructions {
            parts.push(charter.to_string());
        }
        parts.join("\n\n")
    }
}

/// The static registry of nodes, packs, charter-wide tools and
/// transitions, and the default executor, that a [`crate::step::Machine`]
/// runs against.
///
/// A charter is immutable once built and is typically shared across
/// many concurrently running machines via `Arc`.
pub struct Charter {
    /// Human-readable name.
    pub name: String,
    /// Default executor configuration for instances that don't
    /// override it.
    pub executor: ExecutorConfig,
    /// Tools visible from every node (lowest-precedence scope in
    /// resolution, spec §4.3).
    pub tools: HashMap<String, Arc<dyn ToolDyn>>,
    /// Transitions visible from every node.
    pub transitions: HashMap<String, Transition>,
    /// All registered nodes, by id.
    pub nodes: HashMap<String, Arc<Node>>,
    /// All registered packs, by name.
    pub packs: HashMap<String, Arc<Pack>>,
    /// Charter-wide instructions, appended to every node's prompt.
    pub instructions: Option<String>,
    /// Builds the system prompt from an instance's instruction chain.
    pub system_prompt_builder: Arc<dyn SystemPromptBuilder>,
    /// The id of the node new root instances start in.
    pub root_node: String,
}

impl Charter {
    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Arc<Node>> {
        self.nodes.get(id)
    }

    /// Look up a pack by name.
    #[must_use]
    pub fn pack(&self, name: &str) -> Option<&Arc<Pack>> {
        self.packs.get(name)
    }
}

impl std::fmt::Debug for Charter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Charter")
            .field("name", &self.name)
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("packs", &self.packs.keys().collect::<Vec<_>>())
            .field("root_node", &self.root_node)
            .finish()
    }
}
