//! Concrete [`ToolContext`] implementations for each tool-owner shape
//! (spec §4.3: current-node/charter writable, ancestor read-only, pack
//! writable-against-its-own-schema).

use std::sync::{Arc, Mutex};

use charter_schema::SchemaValidator;
use charter_types::{InstanceId, Message, ToolContext, ToolError};
use serde_json::Value;

/// A writable state cell shared between a tool call and the pipeline
/// that drives it, validated on every write.
///
/// A `Mutex` rather than a `RefCell` because [`ToolContext`] requires
/// `Send + Sync` — tool calls may be driven from a multi-threaded
/// executor even though only one call runs at a time per instance.
pub struct WritableState<'a> {
    state: Mutex<Value>,
    validator: &'a dyn SchemaValidator,
}

impl<'a> WritableState<'a> {
    /// Build a writable cell seeded with `initial`.
    pub fn new(initial: Value, validator: &'a dyn SchemaValidator) -> Self {
        Self {
            state: Mutex::new(initial),
            validator,
        }
    }

    /// Snapshot the current value.
    pub fn get(&self) -> Value {
        self.state.lock().expect("state mutex poisoned").clone()
    }

    /// Apply a shallow-merge update, reverting on validation failure.
    pub fn update(&self, patch: Value) -> Result<Value, ToolError> {
        let mut guard = self.state.lock().expect("state mutex poisoned");
        let result = charter_state::update_state(&guard, &patch, self.validator);
        if !result.success {
            return Err(charter_types::ValidationError::new(
                result.error.unwrap_or_else(|| "validation failed".to_string()),
            )
            .into());
        }
        *guard = result.state.clone();
        Ok(result.state)
    }
}

/// Context for a tool owned by the current instance or the charter:
/// writable node state.
pub struct WritableNodeContext<'a> {
    /// The instance this call is running against.
    pub instance_id: InstanceId,
    /// The node state cell.
    pub state: &'a WritableState<'a>,
    /// This instance's slice of history.
    pub history: &'a [Message],
}

impl ToolContext for WritableNodeContext<'_> {
    fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    fn state(&self) -> Value {
        self.state.get()
    }

    fn update_state(&self, patch: Value) -> Result<Value, ToolError> {
        self.state.update(patch)
    }

    fn instance_messages(&self) -> Vec<Message> {
        self.history.to_vec()
    }
}

/// Context for a tool owned by an ancestor: read-only state.
pub struct ReadOnlyAncestorContext<'a> {
    /// The *current* instance the call is running against (not the
    /// ancestor) — per spec, the context is scoped to the calling
    /// instance's view, with the ancestor's state exposed read-only.
    pub instance_id: InstanceId,
    /// A snapshot of the ancestor's state.
    pub state: Value,
    /// This instance's slice of history.
    pub history: &'a [Message],
}

impl ToolContext for ReadOnlyAncestorContext<'_> {
    fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    fn state(&self) -> Value {
        self.state.clone()
    }

    fn update_state(&self, _patch: Value) -> Result<Value, ToolError> {
        Err(ToolError::AncestorReadOnly)
    }

    fn instance_messages(&self) -> Vec<Message> {
        self.history.to_vec()
    }
}

/// Context for a pack tool: writable pack state, validated against
/// the pack's own schema, shared via `Arc` since pack state is a
/// root-instance singleton that multiple calls within a step may
/// touch.
pub struct WritablePackContext<'a> {
    /// The instance this call is running against.
    pub instance_id: InstanceId,
    /// The pack state cell, shared with the pipeline so changes are
    /// visible to subsequent calls in the same step.
    pub state: Arc<WritableState<'a>>,
    /// This instance's slice of history.
    pub history: &'a [Message],
}

impl ToolContext for WritablePackContext<'_> {
    fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    fn state(&self) -> Value {
        self.state.get()
    }

    fn update_state(&self, patch: Value) -> Result<Value, ToolError> {
        self.state.update(patch)
    }

    fn instance_messages(&self) -> Vec<Message> {
        self.history.to_vec()
    }
}
