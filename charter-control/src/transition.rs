//! Applying a [`TransitionResult`] as tree surgery against a running
//! [`Machine`] (spec §4.4). Invoked by `charter-loop` when it drains
//! the per-step instance-message queue.

use charter_schema::{NullValidator, SchemaValidator};
use charter_types::{
    ExecutorConfig, Instance, InstanceId, Machine, TransitionError, TransitionResult, TreeError,
    ValidationError, MAX_TREE_DEPTH,
};
use serde_json::Value;

use crate::hydrate::materialize_node;

/// Apply `result` to the instance named by `instance_id`, mutating
/// `machine` in place.
pub fn apply_transition_result(
    machine: &mut Machine,
    instance_id: InstanceId,
    result: TransitionResult,
) -> Result<(), TransitionError> {
    match result {
        TransitionResult::TransitionTo { node, state, executor_config } => {
            apply_transition_to(machine, instance_id, node, state, executor_config)
        }
        TransitionResult::Spawn { children } => apply_spawn(machine, instance_id, children),
        TransitionResult::Cede { .. } => {
            // Preserve the instance as-is; the loop excises it from its
            // parent once it observes the `cede` yield (spec §4.7 step f).
            Ok(())
        }
        TransitionResult::Suspend { suspend_id, reason, metadata } => {
            let instance = machine
                .instance_mut(instance_id)
                .ok_or_else(|| TransitionError::ExecutionFailed("missing instance".to_string()))?;
            instance.suspended = Some(charter_types::SuspendInfo {
                suspend_id,
                reason,
                suspended_at: chrono::Utc::now(),
                metadata,
                source: charter_types::SuspendSource::Transition,
            });
            Ok(())
        }
    }
}

fn apply_transition_to(
    machine: &mut Machine,
    instance_id: InstanceId,
    target: charter_types::NodeTarget,
    state: Option<Value>,
    executor_config: Option<ExecutorConfig>,
) -> Result<(), TransitionError> {
    let (node_id, node) = materialize_node(machine, &target);

    let new_state = match state {
        Some(state) => state,
        None => node
            .initial_state
            .clone()
            .ok_or(TransitionError::MissingState)?,
    };

    let validator: Box<dyn SchemaValidator> = charter_schema::JsonSchemaValidator::compile(&node.state_schema)
        .map(|v| Box::new(v) as Box<dyn SchemaValidator>)
        .unwrap_or_else(|_| Box::new(NullValidator));
    validator
        .validate(&new_state)
        .map_err(|e| ValidationError::new(e.to_string()))?;

    let default_executor = node.executor_config.clone();
    let instance = machine
        .instance_mut(instance_id)
        .ok_or_else(|| TransitionError::ExecutionFailed("missing instance".to_string()))?;
    instance.node_id = node_id;
    instance.state = new_state;
    instance.children.clear();
    instance.executor_config = executor_config.or(default_executor);
    Ok(())
}

fn apply_spawn(
    machine: &mut Machine,
    instance_id: InstanceId,
    children: Vec<charter_types::SpawnChild>,
) -> Result<(), TransitionError> {
    // Spec §7/§9: tree traversal exceeding the depth cap is a
    // programming bug in the charter, not a runtime condition — it
    // surfaces as a panic at the surgery site rather than a value.
    if let Some(parent_depth) = machine.depth_of(instance_id) {
        if parent_depth + 1 > MAX_TREE_DEPTH {
            panic!("{}", TreeError::DepthExceeded(MAX_TREE_DEPTH));
        }
    }

    let mut new_children = Vec::with_capacity(children.len());
    for child in children {
        let (node_id, node) = materialize_node(machine, &child.node);
        let state = child
            .state
            .or_else(|| node.initial_state.clone())
            .unwrap_or(Value::Null);
        let mut instance = Instance::new(node_id, state);
        instance.executor_config = child.executor_config.or_else(|| node.executor_config.clone());
        if child.worker != node.worker {
            instance.worker_override = Some(child.worker);
        }
        let child_id = instance.id;
        machine.instances.insert(child_id, instance);
        new_children.push(child_id);
    }

    let instance = machine
        .instance_mut(instance_id)
        .ok_or_else(|| TransitionError::ExecutionFailed("missing instance".to_string()))?;
    instance.children.extend(new_children);
    Ok(())
}

/// Remove a ceded instance from its parent's children list (spec
/// §4.7 step f: "excise the leaf from its parent").
pub fn excise_ceded_instance(machine: &mut Machine, parent_id: InstanceId, child_id: InstanceId) {
    if let Some(parent) = machine.instance_mut(parent_id) {
        parent.children.retain(|id| *id != child_id);
    }
    machine.instances.remove(&child_id);
}
