//! System-prompt assembly (spec §4.6 step 1): node instructions, state
//! JSON, available transitions with descriptions, ancestor state
//! summaries, active pack states, and an optional step-remaining
//! warning. Worker nodes omit pack context unless a charter-supplied
//! [`SystemPromptBuilder`] overrides the whole thing.

use charter_resolve::AncestorLink;
use charter_types::{Charter, Node, PromptContext, SystemPromptBuilder};
use serde_json::Value;

/// Everything needed to build the default system prompt for one
/// inference call.
pub struct PromptInput<'a> {
    /// The charter the instance runs against.
    pub charter: &'a Charter,
    /// The node the active instance currently realizes.
    pub node: &'a Node,
    /// The instance's current state.
    pub node_state: &'a Value,
    /// Ancestor chain, nearest-first.
    pub ancestors: &'a [AncestorLink<'a>],
    /// Ancestor states, aligned index-for-index with `ancestors`.
    pub ancestor_states: &'a [Value],
    /// Active pack states, keyed by pack name. Empty for worker nodes.
    pub pack_states: &'a std::collections::HashMap<String, Value>,
    /// Whether the active instance is a worker leaf (omits pack
    /// context per spec §4.6).
    pub is_worker: bool,
    /// `(current_step, max_steps)`, used to emit a step-remaining
    /// warning as the budget runs low.
    pub step_budget: (usize, usize),
    /// Threshold (steps remaining) at which the warning is appended.
    pub step_warning_threshold: usize,
}

/// Build the default system prompt, honoring a charter-supplied
/// override if present.
#[must_use]
pub fn build_system_prompt(input: &PromptInput<'_>) -> String {
    let ancestor_instructions: Vec<&str> =
        input.ancestors.iter().map(|a| a.node.instructions.as_str()).collect();
    let ctx = PromptContext {
        node_instructions: &input.node.instructions,
        ancestor_instructions,
        charter_instructions: input.charter.instructions.as_deref(),
    };
    let mut prompt = input.charter.system_prompt_builder.build(&ctx);

    prompt.push_str("\n\nCurrent state:\n");
    prompt.push_str(&render_json(input.node_state));

    if !input.ancestors.is_empty() {
        prompt.push_str("\n\nAncestor context (nearest first):");
        for (link, state) in input.ancestors.iter().zip(input.ancestor_states) {
            prompt.push_str(&format!(
                "\n- {} (instance {}): {}",
                link.node.id,
                link.instance_id,
                render_json(state)
            ));
        }
    }

    if !input.node.transitions.is_empty() {
        prompt.push_str("\n\nAvailable transitions:");
        for (name, transition) in &input.node.transitions {
            let description = match transition {
                charter_types::Transition::Code { description, .. }
                | charter_types::Transition::Serial { description, .. }
                | charter_types::Transition::General { description } => description.as_str(),
            };
            prompt.push_str(&format!("\n- {name}: {description}"));
        }
    }

    if !input.is_worker && !input.pack_states.is_empty() {
        prompt.push_str("\n\nActive packs:");
        for (name, state) in input.pack_states {
            if let Some(pack) = input.charter.pack(name) {
                prompt.push_str(&format!("\n- {name} ({}): {}", pack.description, render_json(state)));
            }
        }
    }

    let (current, max) = input.step_budget;
    let remaining = max.saturating_sub(current);
    if remaining <= input.step_warning_threshold {
        prompt.push_str(&format!(
            "\n\nWarning: only {remaining} step(s) remain before this turn is forced to end."
        ));
    }

    prompt
}

fn render_json(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}
