//! Durable serialization and client projection for the charter
//! runtime (spec §4.8, §4.9; C9/C10).
//!
//! Two independent concerns share this crate because they're both
//! "turn a live [`charter_types::Machine`]/[`charter_types::Instance`]
//! into something that outlives the process": [`serializer`] produces
//! the ref-substitution wire form a [`charter_protocol::PersistenceAdapter`]
//! stores, while [`client`] produces the read-only projection an
//! external client renders and acts on.

pub mod client;
pub mod error;
pub mod serializer;
pub mod session;

pub use client::{create_dry_client_instance, hydrate_client_instance, ClientInstance, CommandRequest, DryClientInstance, DryClientNode, DryCommandDescriptor};
pub use error::WireError;
pub use serializer::{deserialize_machine, node_to_serial, serialize_machine, SerializedInstance, SerializedMachine};
pub use session::{history_up_to, restore_machine, snapshot_machine, Turn};
