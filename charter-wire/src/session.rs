//! Session/turn persistence shapes (ambient, grounded in
//! `agent-runtime::session`) and the snapshot helpers built on top of
//! [`crate::serializer`] that [`charter_protocol::PersistenceAdapter`]
//! backends operate over.
//!
//! `spec.md` §6 describes the persistence adapter's surface as
//! `sessions`/`turns`/`steps`/`messages` collections; this module fixes
//! the `turns` shape (`{ sessionId, parentId?, instanceId, instance,
//! messages[], createdAt }`) and the time-travel operation built on the
//! parent chain it forms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use charter_protocol::Snapshot;
use charter_types::{Charter, Machine, Message};

use crate::error::WireError;
use crate::serializer::{deserialize_machine, serialize_machine};

/// One turn in a session's history: the instance a turn ran against,
/// serialized at the point the turn ended, plus the messages it
/// produced and a link to the turn it branched from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Unique id within the session.
    pub id: String,
    /// The session this turn belongs to.
    pub session_id: String,
    /// The turn this one continues from, if any. `None` marks the
    /// first turn of a session or a branch point created by resuming
    /// from an earlier turn (spec §6 time-travel).
    pub parent_id: Option<String>,
    /// The instance this turn ran against.
    pub instance_id: charter_types::InstanceId,
    /// The machine's serialized state at the end of this turn (opaque
    /// — produced by [`serialize_machine`]).
    pub instance: Value,
    /// Messages emitted during this turn.
    pub messages: Vec<Message>,
    /// When this turn was created.
    pub created_at: DateTime<Utc>,
}

/// Serialize `machine` into a [`Snapshot`] ready to hand to a
/// [`charter_protocol::PersistenceAdapter`].
pub fn snapshot_machine(machine: &Machine, session_id: &str, now: DateTime<Utc>) -> Result<Snapshot, WireError> {
    let serialized = serialize_machine(machine)?;
    let data = serde_json::to_value(&serialized).map_err(|e| WireError::Malformed(e.to_string()))?;
    Ok(Snapshot {
        session_id: session_id.to_string(),
        charter_name: machine.charter.name.clone(),
        data,
        created_at: now,
        updated_at: now,
    })
}

/// Rebuild a [`Machine`] from a [`Snapshot`] against `charter`.
pub fn restore_machine(charter: Arc<Charter>, snapshot: &Snapshot) -> Result<Machine, WireError> {
    let serialized = serde_json::from_value(snapshot.data.clone()).map_err(|e| WireError::Malformed(e.to_string()))?;
    deserialize_machine(charter, &serialized)
}

/// Flatten the message history visible at `turn_id`: walk the parent
/// chain back to the session's first turn, then concatenate each
/// turn's messages in root-to-`turn_id` order (spec §6's time-travel
/// scenario — resuming from an earlier turn sees exactly the messages
/// that were visible at that point, not later ones).
pub fn history_up_to(turns: &[Turn], turn_id: &str) -> Result<Vec<Message>, WireError> {
    let by_id: HashMap<&str, &Turn> = turns.iter().map(|t| (t.id.as_str(), t)).collect();
    let mut chain = Vec::new();
    let mut current = by_id.get(turn_id).copied().ok_or_else(|| WireError::UnknownTurn(turn_id.to_string()))?;
    loop {
        chain.push(current);
        match &current.parent_id {
            Some(parent_id) => {
                current = by_id
                    .get(parent_id.as_str())
                    .copied()
                    .ok_or_else(|| WireError::UnknownTurn(parent_id.clone()))?;
            }
            None => break,
        }
    }
    chain.reverse();
    Ok(chain.into_iter().flat_map(|t| t.messages.clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use charter_types::{DefaultPromptBuilder, ExecutorConfig, InstanceId, Node};
    use std::collections::HashMap as StdHashMap;

    fn simple_charter() -> Arc<Charter> {
        let mut nodes = StdHashMap::new();
        nodes.insert(
            "root".to_string(),
            Arc::new(Node::new("root", "be helpful", serde_json::json!({ "type": "object" }))),
        );
        Arc::new(Charter {
            name: "session-test".into(),
            executor: ExecutorConfig::default(),
            tools: StdHashMap::new(),
            transitions: StdHashMap::new(),
            nodes,
            packs: StdHashMap::new(),
            instructions: None,
            system_prompt_builder: Arc::new(DefaultPromptBuilder),
            root_node: "root".into(),
        })
    }

    #[test]
    fn snapshot_and_restore_round_trip() {
        let charter = simple_charter();
        let mut machine = Machine::new(charter.clone());
        machine.history.push(Message::user("hello"));
        let now = DateTime::<Utc>::from_timestamp(0, 0).unwrap();

        let snapshot = snapshot_machine(&machine, "sess-1", now).unwrap();
        assert_eq!(snapshot.session_id, "sess-1");

        let restored = restore_machine(charter, &snapshot).unwrap();
        assert_eq!(restored.root_id, machine.root_id);
        assert_eq!(restored.history.len(), 1);
    }

    #[test]
    fn history_up_to_follows_the_parent_chain_only() {
        let now = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
        let instance_id = InstanceId::new();
        let turn_a = Turn {
            id: "a".into(),
            session_id: "s".into(),
            parent_id: None,
            instance_id,
            instance: Value::Null,
            messages: vec![Message::user("first")],
            created_at: now,
        };
        let turn_b = Turn {
            id: "b".into(),
            session_id: "s".into(),
            parent_id: Some("a".into()),
            instance_id,
            instance: Value::Null,
            messages: vec![Message::assistant("second")],
            created_at: now,
        };
        // A branch from `a` that never reaches `b`.
        let turn_c = Turn {
            id: "c".into(),
            session_id: "s".into(),
            parent_id: Some("a".into()),
            instance_id,
            instance: Value::Null,
            messages: vec![Message::assistant("branched")],
            created_at: now,
        };

        let turns = vec![turn_a, turn_b, turn_c];
        let history = history_up_to(&turns, "c").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].text(), "first");
        assert_eq!(history[1].text(), "branched");

        assert!(history_up_to(&turns, "does-not-exist").is_err());
    }
}
