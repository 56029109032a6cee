//! Public facade for the charter agent runtime (spec §6: `Machine
//! API`).
//!
//! A charter author drives the runtime through this crate and
//! `charter-types` (for `Node`/`Pack`/`Tool`/`Transition` builders);
//! everything else below (`charter-resolve`, `charter-tool`, ...) is
//! an implementation detail a caller never names directly. The
//! facade's job is assembly, not logic: `create_charter`/`create_node`
//! validate
//! and freeze a static charter, `create_machine`/`run_machine` build
//! and drive a live instance tree, `run_command` dispatches a
//! synchronous out-of-band operation, and the `charter_wire`
//! re-exports round-trip a machine through durable storage or project
//! it to a read-only client view.
//!
//! ```no_run
//! # use std::sync::Arc;
//! use charter::{create_charter, create_machine, CharterConfig, MachineInit};
//! use charter_types::Node;
//!
//! # async fn run(backend: Arc<dyn charter_exec::InferenceBackend>) -> Result<(), charter::CharterError> {
//! let greeter = Node::new("greeter", "say hello", serde_json::json!({ "type": "object" }))
//!     .with_initial_state(serde_json::json!({}));
//! let charter = create_charter(CharterConfig::new("demo", "greeter").with_node(greeter))?;
//! let machine = create_machine(charter, MachineInit::default())?;
//! # let _ = (machine, backend);
//! # Ok(())
//! # }
//! ```

pub mod build;
pub mod error;
pub mod machine;

pub use build::{create_charter, create_node, create_node_with_generated_id, CharterConfig};
pub use error::CharterError;
pub use machine::{active_instances, build_driver, create_machine, default_target_instance, run_machine, MachineInit};

pub use charter_control::run_command;
pub use charter_loop::{MachineDriver, RunOptions};
pub use charter_wire::{
    create_dry_client_instance, deserialize_machine, hydrate_client_instance, history_up_to, restore_machine,
    serialize_machine, snapshot_machine, ClientInstance, CommandRequest, DryClientInstance, DryClientNode,
    DryCommandDescriptor, SerializedMachine, Turn, WireError,
};
