//! The shallow-merge, validate-or-revert state update discipline used
//! for both node state and pack state (spec §4.2).

use charter_schema::SchemaValidator;
use serde_json::Value;

/// The outcome of an [`update_state`] call.
#[derive(Debug, Clone)]
pub struct StateUpdateResult {
    /// Whether the patch was applied.
    pub success: bool,
    /// The resulting state: the merged-and-validated state on
    /// success, the unchanged original state on failure.
    pub state: Value,
    /// The validation error message, present only on failure.
    pub error: Option<String>,
}

/// Shallow-merge `patch` into `current`, validate the result, and
/// return it — reverting to `current` unchanged if validation fails.
///
/// "Shallow" means only top-level object keys are merged; nested
/// objects in `patch` replace rather than merge into nested objects in
/// `current`. Non-object `current`/`patch` pairs: `patch` replaces
/// `current` wholesale.
pub fn update_state(
    current: &Value,
    patch: &Value,
    validator: &dyn SchemaValidator,
) -> StateUpdateResult {
    let merged = shallow_merge(current, patch);
    match validator.validate(&merged) {
        Ok(()) => StateUpdateResult {
            success: true,
            state: merged,
            error: None,
        },
        Err(err) => StateUpdateResult {
            success: false,
            state: current.clone(),
            error: Some(err.to_string()),
        },
    }
}

fn shallow_merge(current: &Value, patch: &Value) -> Value {
    match (current, patch) {
        (Value::Object(current_map), Value::Object(patch_map)) => {
            let mut merged = current_map.clone();
            for (key, value) in patch_map {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => patch.clone(),
    }
}
