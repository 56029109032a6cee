//! Four-scope name resolution for tools, and scope validation for
//! charter construction.
//!
//! Resolution walks, in priority order: the current node's own scope,
//! then ancestors nearest-first, then the charter, then the packs
//! attached to the *current* node (spec §4.1). Transitions never walk
//! ancestors — they resolve against the current node only.

use std::sync::Arc;

use charter_types::{Charter, InstanceId, Node, ResolveError, Transition};

/// Who owns a resolved tool, for constructing the right kind of
/// [`charter_types::ToolContext`] around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOwner {
    /// Owned by a live instance — the current one if `instance_id`
    /// matches the lookup's own instance, an ancestor otherwise.
    Instance(InstanceId),
    /// Owned by the charter itself.
    Charter,
    /// Contributed by a pack of this name.
    Pack(String),
}

/// A tool resolved against the four-scope lookup, with its owner tag.
pub struct ResolvedTool {
    /// The resolved tool.
    pub tool: Arc<dyn charter_types::ToolDyn>,
    /// Who owns it.
    pub owner: ToolOwner,
}

/// One link in the ancestor chain: its instance id and the node it
/// realizes, nearest ancestor first.
pub struct AncestorLink<'a> {
    /// The ancestor instance's id.
    pub instance_id: InstanceId,
    /// The node the ancestor instance realizes.
    pub node: &'a Node,
}

/// Resolve a tool name visible from `current` against the four-scope
/// priority order. `current_id` is the instance doing the lookup;
/// `ancestors` must be ordered nearest-first.
pub fn resolve_tool(
    charter: &Charter,
    current_id: InstanceId,
    current: &Node,
    ancestors: &[AncestorLink<'_>],
    name: &str,
) -> Result<ResolvedTool, ResolveError> {
    if let Some(tool) = current.tools.get(name) {
        return Ok(ResolvedTool {
            tool: tool.clone(),
            owner: ToolOwner::Instance(current_id),
        });
    }

    for link in ancestors {
        if let Some(tool) = link.node.tools.get(name) {
            return Ok(ResolvedTool {
                tool: tool.clone(),
                owner: ToolOwner::Instance(link.instance_id),
            });
        }
    }

    if let Some(tool) = charter.tools.get(name) {
        return Ok(ResolvedTool {
            tool: tool.clone(),
            owner: ToolOwner::Charter,
        });
    }

    for pack_name in &current.packs {
        if let Some(pack) = charter.pack(pack_name) {
            if let Some(tool) = pack.tools.get(name) {
                return Ok(ResolvedTool {
                    tool: tool.clone(),
                    owner: ToolOwner::Pack(pack_name.clone()),
                });
            }
        }
    }

    Err(ResolveError::UnknownName(name.to_string()))
}

/// Resolve a transition name against the current node only — no
/// ancestor walk, no pack contribution (spec §4.1: "Transitions
/// resolve against the current node only").
pub fn resolve_transition<'a>(
    current: &'a Node,
    name: &str,
) -> Result<&'a Transition, ResolveError> {
    current
        .transitions
        .get(name)
        .ok_or_else(|| ResolveError::UnknownName(name.to_string()))
}

/// Resolve a `{ ref: name }` against the charter's node registry.
pub fn resolve_node_ref<'a>(charter: &'a Charter, name: &str) -> Result<&'a Arc<Node>, ResolveError> {
    charter
        .node(name)
        .ok_or_else(|| ResolveError::UnknownRef(name.to_string()))
}

/// Resolve a `{ ref: name }` against the charter's transition registry.
pub fn resolve_transition_ref<'a>(
    charter: &'a Charter,
    name: &str,
) -> Result<&'a Transition, ResolveError> {
    charter
        .transitions
        .get(name)
        .ok_or_else(|| ResolveError::UnknownRef(name.to_string()))
}

/// Built-in tool names reserved by the tool pipeline (spec §4.3);
/// a node or pack tool sharing one of these names is a configuration
/// collision, not a shadowing case.
pub const BUILTIN_TOOL_NAMES: &[&str] = &["updateState", "transition"];

/// Check whether `name` is the reserved `transition_<name>` shape used
/// to invoke a named transition directly as a tool call.
#[must_use]
pub fn is_named_transition_tool(name: &str) -> bool {
    name.starts_with("transition_")
}

/// Validate that a node's own tool and transition names don't collide
/// with each other or with built-ins — same-scope collisions are a
/// configuration error (spec §4.1), unlike shadowing across scopes.
pub fn validate_node_scopes(node: &Node) -> Result<(), ResolveError> {
    for tool_name in node.tools.keys() {
        if BUILTIN_TOOL_NAMES.contains(&tool_name.as_str()) || is_named_transition_tool(tool_name) {
            return Err(ResolveError::ScopeCollision(tool_name.clone()));
        }
        if node.transitions.contains_key(tool_name) {
            return Err(ResolveError::ScopeCollision(tool_name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use charter_types::{Charter, DefaultPromptBuilder, ExecutorConfig, FnTool, Node};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn dummy_tool(name: &str) -> Arc<dyn charter_types::ToolDyn> {
        Arc::new(FnTool::new(name, "a tool", serde_json::json!({}), |input, _ctx| {
            Box::pin(async move { Ok(charter_types::ToolOutcome::Value(input)) })
        }))
    }

    fn empty_charter(nodes: HashMap<String, Arc<Node>>) -> Charter {
        Charter {
            name: "test".into(),
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

    #[test]
    fn node_scope_shadows_charter_scope() {
        let node = Node::new("root", "instructions", serde_json::json!({})).with_tool(dummy_tool("t"));
        let mut charter = empty_charter(HashMap::new());
        charter.tools.insert("t".into(), dummy_tool("t-charter"));

        let resolved = resolve_tool(&charter, InstanceId::new(), &node, &[], "t").unwrap();
        assert_eq!(resolved.tool.name(), "t");
        assert!(matches!(resolved.owner, ToolOwner::Instance(_)));
    }

    #[test]
    fn falls_back_to_charter_when_node_has_no_match() {
        let node = Node::new("root", "instructions", serde_json::json!({}));
        let mut charter = empty_charter(HashMap::new());
        charter.tools.insert("t".into(), dummy_tool("t"));

        let resolved = resolve_tool(&charter, InstanceId::new(), &node, &[], "t").unwrap();
        assert_eq!(resolved.owner, ToolOwner::Charter);
    }

    #[test]
    fn unknown_name_errors() {
        let node = Node::new("root", "instructions", serde_json::json!({}));
        let charter = empty_charter(HashMap::new());
        let err = resolve_tool(&charter, InstanceId::new(), &node, &[], "missing").unwrap_err();
        assert!(matches!(err, ResolveError::UnknownName(_)));
    }

    #[test]
    fn same_scope_collision_is_rejected() {
        let node = Node::new("root", "instructions", serde_json::json!({}))
            .with_tool(dummy_tool("go"))
            .with_transition(
                "go",
                charter_types::Transition::General { description: "go".into() },
            );
        assert!(validate_node_scopes(&node).is_err());
    }
}
