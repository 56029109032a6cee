//! Minimal serializable node/transition shapes.
//!
//! These appear in two places: live in the charter as the payload of a
//! `Serial` transition or a `General` transition's call-time node
//! definition (this module), and as the on-disk form produced by the
//! durable serializer in `charter-wire` (which wraps these same shapes
//! with ref-substitution bookkeeping, spec §4.8).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Either a charter-registered reference or an inline serialized form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RefOr<T> {
    /// A name resolved against the charter's registry.
    Ref {
        /// The referenced name.
        #[serde(rename = "ref")]
        name: String,
    },
    /// A fully inline value with no charter registration.
    Inline(Box<T>),
}

/// A serializable transition: used both as the payload of a `Serial`
/// transition declared ahead of time, and as the shape an agent
/// supplies inline when invoking a `General` transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialTransition {
    /// Human-readable description surfaced to the inference backend.
    pub description: String,
    /// The target node, by reference or inline.
    pub node: RefOr<SerialNode>,
    /// Optional JSON Schema for the transition's call-time arguments.
    pub arguments: Option<Value>,
}

/// A serializable node definition: either registered ahead of time and
/// referenced by id, or supplied inline (spec §4.8: "Unregistered
/// items are inlined").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialNode {
    /// Free-text instructions for the node.
    pub instructions: String,
    /// JSON Schema (draft 2020-12) for the node's state.
    pub state_schema: Value,
    /// Transitions available from this node, by reference or inline.
    pub transitions: HashMap<String, RefOr<SerialTransition>>,
    /// Tool names available to this node. Inline tool closures cannot
    /// be serialized (spec §4.8), so only refs are representable here.
    pub tools: Vec<String>,
    /// Initial state assigned to instances of this node absent an
    /// explicit override.
    pub initial_state: Option<Value>,
}
