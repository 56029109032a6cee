//! JSON Schemas for the built-in tools every node implicitly exposes
//! (spec §4.3): `updateState` and `transition`. Collected by
//! `charter-exec` alongside node/ancestor/charter/pack tool
//! definitions when assembling the inference call.

use serde_json::{json, Value};

/// Schema for the `updateState` built-in: an arbitrary object patch,
/// shallow-merged into the current node state.
#[must_use]
pub fn update_state_schema() -> Value {
    json!({
        "type": "object",
        "description": "A partial state patch, shallow-merged into the current state.",
    })
}

/// Schema for the `transition` built-in.
#[must_use]
pub fn transition_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "to": { "type": "string", "description": "Name of the transition to invoke." },
            "reason": { "type": "string", "description": "Why this transition is being taken." },
        },
        "required": ["to"],
    })
}

/// Schema for a `transition_<name>` built-in, given the transition's
/// own declared arguments schema (if any).
#[must_use]
pub fn named_transition_schema(arguments_schema: Option<&Value>) -> Value {
    let mut schema = arguments_schema.cloned().unwrap_or_else(|| json!({ "type": "object" }));
    if let Some(obj) = schema.as_object_mut() {
        let properties = obj.entry("properties").or_insert_with(|| json!({}));
        if let Some(props) = properties.as_object_mut() {
            props.insert(
                "reason".to_string(),
                json!({ "type": "string", "description": "Why this transition is being taken." }),
            );
        }
    }
    schema
}
