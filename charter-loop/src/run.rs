//! Running one leaf's executor call against a [`Machine`] snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use charter_exec::{run_executor, BackendError, ExecutorInput, ExecutorOutput, InferenceBackend};
use charter_resolve::AncestorLink;
use charter_types::{InstanceId, Machine, Node};
use serde_json::Value;

use crate::leaves::LeafInfo;

/// Everything folding needs back from one leaf's executor call,
/// alongside the tree-navigation context it was run with.
pub struct LeafResult {
    pub instance_id: InstanceId,
    pub parent_id: Option<InstanceId>,
    pub is_worker: bool,
    pub output: ExecutorOutput,
}

/// Run `leaf`'s executor call against the current state of `machine`.
///
/// `step_budget`/`step_warning_threshold` come from the driver's
/// [`crate::RunOptions`]; `user_input` is only ever `Some` for the
/// primary leaf handling a freshly appended user turn, and even then
/// only as an empty placeholder — the fresh message already lives in
/// `machine.history` by the time this runs (spec's `history` is the
/// single source of truth here, so the backend's separate `user` field
/// is left empty rather than duplicating it).
pub async fn run_leaf(
    backend: &dyn InferenceBackend,
    machine: &Machine,
    leaf: &LeafInfo,
    step_index: usize,
    max_steps: usize,
    step_warning_threshold: usize,
) -> Result<LeafResult, BackendError> {
    let instance = machine
        .instance(leaf.instance_id)
        .expect("leaf instance vanished mid-step");
    let node = machine
        .resolve_node(&instance.node_id)
        .expect("leaf's node must resolve");

    let ancestor_nodes: Vec<(InstanceId, Arc<Node>)> = leaf
        .ancestor_ids
        .iter()
        .filter_map(|id| {
            let ancestor = machine.instance(*id)?;
            let node = machine.resolve_node(&ancestor.node_id)?;
            Some((*id, node))
        })
        .collect();
    let ancestor_links: Vec<AncestorLink<'_>> = ancestor_nodes
        .iter()
        .map(|(id, node)| AncestorLink { instance_id: *id, node: node.as_ref() })
        .collect();
    let ancestor_states: Vec<Value> = ancestor_nodes
        .iter()
        .map(|(id, _)| machine.instance(*id).expect("resolved above").state.clone())
        .collect();

    let pack_states: HashMap<String, Value> =
        machine.root().pack_states.clone().unwrap_or_default();

    let output = run_executor(
        backend,
        ExecutorInput {
            charter: machine.charter.as_ref(),
            instance_id: leaf.instance_id,
            node: &node,
            ancestors: &ancestor_links,
            ancestor_states: &ancestor_states,
            node_state: instance.state.clone(),
            pack_states,
            history: &machine.history,
            user_input: None,
            step_budget: (step_index, max_steps),
            step_warning_threshold,
            is_worker: leaf.is_worker,
        },
    )
    .await?;

    Ok(LeafResult {
        instance_id: leaf.instance_id,
        parent_id: leaf.parent_id,
        is_worker: leaf.is_worker,
        output,
    })
}
