//! Collecting and classifying the active leaves of a running
//! [`charter_types::Machine`] (spec §4.7 step 2a).
//!
//! The instance tree is an arena keyed by id with no parent pointers,
//! so both the leaf set and each leaf's ancestor chain are recovered
//! by one depth-first walk from the root.

use charter_types::{InstanceId, Machine};

/// One active (non-suspended) leaf, with enough context to run its
/// executor call.
pub struct LeafInfo {
    /// The leaf instance's id.
    pub instance_id: InstanceId,
    /// Its parent, `None` only for the root.
    pub parent_id: Option<InstanceId>,
    /// Ancestor instance ids, nearest-first, root last.
    pub ancestor_ids: Vec<InstanceId>,
    /// Whether this leaf runs as a worker rather than the primary.
    pub is_worker: bool,
}

/// Walk the tree depth-first from the root and collect every
/// non-suspended leaf.
#[must_use]
pub fn active_leaves(machine: &Machine) -> Vec<LeafInfo> {
    let mut out = Vec::new();
    walk(machine, machine.root_id, None, &mut Vec::new(), &mut out);
    out
}

fn walk(
    machine: &Machine,
    id: InstanceId,
    parent_id: Option<InstanceId>,
    ancestors_nearest_first: &mut Vec<InstanceId>,
    out: &mut Vec<LeafInfo>,
) {
    let Some(instance) = machine.instance(id) else { return };

    if instance.is_leaf() {
        if instance.suspended.is_none() {
            out.push(LeafInfo {
                instance_id: id,
                parent_id,
                ancestor_ids: ancestors_nearest_first.clone(),
                is_worker: effective_worker(machine, id),
            });
        }
        return;
    }

    ancestors_nearest_first.insert(0, id);
    for child_id in instance.children.clone() {
        walk(machine, child_id, Some(id), ancestors_nearest_first, out);
    }
    ancestors_nearest_first.remove(0);
}

/// Whether `id` runs as a worker: its own override if set, else its
/// node's default (spec §3: "spawn may pin a child as primary or
/// worker regardless of its node's default").
#[must_use]
fn effective_worker(machine: &Machine, id: InstanceId) -> bool {
    let Some(instance) = machine.instance(id) else { return true };
    if let Some(override_) = instance.worker_override {
        return override_;
    }
    machine
        .resolve_node(&instance.node_id)
        .map(|node| node.worker)
        .unwrap_or(true)
}

/// The active leaves split into at most one primary and the rest as
/// workers (spec invariant: "at most one non-worker leaf is active at
/// a time").
pub struct Classification {
    /// The primary leaf, if one is active.
    pub primary: Option<LeafInfo>,
    /// Every worker leaf, in traversal order.
    pub workers: Vec<LeafInfo>,
}

/// Partition `leaves` into primary and workers. If more than one
/// non-worker leaf is found — a configuration bug upstream, since
/// spawn/transition should never produce this — the first one wins the
/// primary slot and the rest are treated as workers so the loop can
/// still make progress.
#[must_use]
pub fn classify(leaves: Vec<LeafInfo>) -> Classification {
    let mut primary = None;
    let mut workers = Vec::new();
    for leaf in leaves {
        if !leaf.is_worker && primary.is_none() {
            primary = Some(leaf);
        } else if !leaf.is_worker {
            tracing::warn!(instance_id = %leaf.instance_id, "charter.loop.extra_primary_leaf");
            workers.push(leaf);
        } else {
            workers.push(leaf);
        }
    }
    Classification { primary, workers }
}
