//! Collecting the tool definitions offered to one inference call (spec
//! §4.6 step 2): built-ins first, then scope-resolved regular tools in
//! C2 priority order, skipping names already claimed by a
//! higher-priority scope (shadowing applies to presentation too, not
//! just dispatch).

use std::collections::HashSet;

use charter_resolve::AncestorLink;
use charter_tool::builtin;
use charter_types::{Charter, Node, Transition};

use crate::backend::ToolDefinition;

/// Build the full, ordered tool list for one inference call against
/// `node`, with `ancestors` ordered nearest-first.
#[must_use]
pub fn collect_tool_definitions(
    charter: &Charter,
    node: &Node,
    ancestors: &[AncestorLink<'_>],
    is_worker: bool,
) -> Vec<ToolDefinition> {
    let mut defs = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    defs.push(ToolDefinition {
        name: "updateState".to_string(),
        description: "Patch the current state with a shallow merge.".to_string(),
        input_schema: builtin::update_state_schema(),
    });
    seen.insert("updateState".to_string());

    if !node.transitions.is_empty() {
        defs.push(ToolDefinition {
            name: "transition".to_string(),
            description: "Transition to a named target by key.".to_string(),
            input_schema: builtin::transition_schema(),
        });
        seen.insert("transition".to_string());
    }

    for (name, transition) in &node.transitions {
        let tool_name = format!("transition_{name}");
        let (description, arguments_schema) = match transition {
            Transition::Code { description, arguments_schema, .. } => {
                (description.as_str(), arguments_schema.as_ref())
            }
            Transition::Serial { description, .. } => (description.as_str(), None),
            Transition::General { description } => (description.as_str(), None),
        };
        defs.push(ToolDefinition {
            name: tool_name.clone(),
            description: description.to_string(),
            input_schema: builtin::named_transition_schema(arguments_schema),
        });
        seen.insert(tool_name);
    }

    for (name, tool) in &node.tools {
        if seen.insert(name.clone()) {
            defs.push(ToolDefinition {
                name: name.clone(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema().clone(),
            });
        }
    }

    for link in ancestors {
        for (name, tool) in &link.node.tools {
            if seen.insert(name.clone()) {
                defs.push(ToolDefinition {
                    name: name.clone(),
                    description: tool.description().to_string(),
                    input_schema: tool.input_schema().clone(),
                });
            }
        }
    }

    for (name, tool) in &charter.tools {
        if seen.insert(name.clone()) {
            defs.push(ToolDefinition {
                name: name.clone(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema().clone(),
            });
        }
    }

    // Worker leaves omit pack context entirely (spec §4.6), so their
    // tool list stops at the charter scope.
    if !is_worker {
        for pack_name in &node.packs {
            let Some(pack) = charter.pack(pack_name) else { continue };
            for (name, tool) in &pack.tools {
                if seen.insert(name.clone()) {
                    defs.push(ToolDefinition {
                        name: name.clone(),
                        description: tool.description().to_string(),
                        input_schema: tool.input_schema().clone(),
                    });
                }
            }
        }
    }

    defs
}
