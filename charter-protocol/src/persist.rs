//! Session/turn persistence shapes.
//!
//! Grounded in `agent-runtime::session` (`Session`/`SessionSummary`)
//! and spec.md §6's turn-chain fields. This crate defines only the
//! shape and the trait a backend operates over; the default in-memory
//! backend lives in `charter-store-memory`, and durable wire encoding
//! of a machine's instance tree lives in `charter-wire`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PersistError;

/// An opaque, backend-agnostic snapshot of a machine's durable state:
/// its serialized instance tree (per `charter-wire`'s ref-substitution
/// format) plus history, keyed by session id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Session identifier, stable across save/load cycles.
    pub session_id: String,
    /// Name of the charter this snapshot was produced against. Loading
    /// a snapshot against a differently-named charter is a caller
    /// error, not one this trait detects.
    pub charter_name: String,
    /// The serialized machine payload (opaque to this crate).
    pub data: Value,
    /// When the session was first created.
    pub created_at: DateTime<Utc>,
    /// When the session was last saved.
    pub updated_at: DateTime<Utc>,
}

/// A lightweight summary of a session, without its payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session identifier.
    pub session_id: String,
    /// Name of the charter the session runs against.
    pub charter_name: String,
    /// When the session was first created.
    pub created_at: DateTime<Utc>,
    /// When the session was last saved.
    pub updated_at: DateTime<Utc>,
}

/// Persists and retrieves machine snapshots across turns.
///
/// Implementations own the storage medium (memory, filesystem,
/// database); this crate only fixes the shape. Out of scope per
/// spec.md §1: this is not a schema for arbitrary application tables,
/// just the minimal session/turn boundary the runtime itself needs.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    /// Save a snapshot (create or overwrite).
    async fn save(&self, snapshot: &Snapshot) -> Result<(), PersistError>;

    /// Load a snapshot by session id.
    async fn load(&self, session_id: &str) -> Result<Snapshot, PersistError>;

    /// List summaries of all known sessions.
    async fn list(&self) -> Result<Vec<SessionSummary>, PersistError>;

    /// Delete a session's snapshot. No-op if it doesn't exist.
    async fn delete(&self, session_id: &str) -> Result<(), PersistError>;
}
