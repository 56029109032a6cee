//! Errors from serialization, hydration, and client projection.

use thiserror::Error;

/// Errors from the durable serializer and client projection.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum WireError {
    /// A serialized instance named a node id not present in the
    /// charter and not carried as an inline node in the same payload.
    #[error("unknown node ref: {0}")]
    UnknownNodeRef(String),

    /// A client command request named a command the target instance's
    /// node (or its packs) doesn't declare.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A command's input failed its declared schema.
    #[error("invalid command input: {0}")]
    InvalidInput(String),

    /// The serialized payload itself failed to deserialize.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// A turn id referenced by `history_up_to` is not present in the
    /// supplied turn chain.
    #[error("unknown turn: {0}")]
    UnknownTurn(String),
}
