//! Machine construction and driving (spec §6: `createMachine`,
//! `runMachine`, `runCommand`).

use std::sync::Arc;

use charter_exec::InferenceBackend;
use charter_loop::{MachineDriver, MachineError, RunOptions};
use charter_protocol::Hook;
use charter_schema::{JsonSchemaValidator, NullValidator, SchemaValidator};
use charter_types::{
    Charter, Instance, Machine, MachineInput, Message, Step, ValidationError,
};
use futures::Stream;
use serde_json::Value;

/// Optional overrides for [`create_machine`]'s fresh root instance.
#[derive(Default)]
pub struct MachineInit {
    /// Override the charter's default root node.
    pub root_node: Option<String>,
    /// Override the root instance's initial state. Falls back to the
    /// target node's own `initial_state` when absent, exactly like
    /// [`Machine::new`].
    pub root_state: Option<Value>,
    /// History to seed the machine with.
    pub history: Option<Vec<Message>>,
}

/// Build a machine against `charter`, validating the root instance's
/// state against its node's schema (spec §6: "validates every state
/// against its node's schema; initializes `packStates` lazily").
pub fn create_machine(charter: Arc<Charter>, init: MachineInit) -> Result<Machine, ValidationError> {
    let mut machine = Machine::new(charter.clone());

    if let Some(node_id) = &init.root_node {
        let node = charter
            .node(node_id)
            .ok_or_else(|| ValidationError::new(format!("unknown root node: {node_id}")))?;
        let state = init
            .root_state
            .clone()
            .or_else(|| node.initial_state.clone())
            .unwrap_or(Value::Null);
        let root_id = machine.root_id;
        let instance = machine.instance_mut(root_id).expect("root instance always present");
        instance.node_id = node_id.clone();
        instance.state = state;
    } else if let Some(state) = &init.root_state {
        let root_id = machine.root_id;
        machine.instance_mut(root_id).expect("root instance always present").state = state.clone();
    }

    let root = machine.root();
    let node = machine
        .resolve_node(&root.node_id)
        .ok_or_else(|| ValidationError::new(format!("unknown root node: {}", root.node_id)))?;
    validate_state(&node.state_schema, &root.state)?;

    if let Some(history) = init.history {
        machine.history = history;
    }

    Ok(machine)
}

fn validate_state(schema: &Value, state: &Value) -> Result<(), ValidationError> {
    let validator: Box<dyn SchemaValidator> = JsonSchemaValidator::compile(schema)
        .map(|v| Box::new(v) as Box<dyn SchemaValidator>)
        .unwrap_or_else(|_| Box::new(NullValidator));
    validator.validate(state).map_err(|e| ValidationError::new(e.to_string()))
}

/// Build a [`MachineDriver`] around `backend`, `hooks` (firing in the
/// order given), and `options`. Build once per backend configuration
/// and reuse it across every `run_machine` call for that machine (spec
/// §6: `runMachine(machine, input, options?)`).
#[must_use]
pub fn build_driver(backend: Arc<dyn InferenceBackend>, hooks: Vec<Arc<dyn Hook>>, options: RunOptions) -> MachineDriver {
    let mut driver = MachineDriver::new(backend).with_options(options);
    for hook in hooks {
        driver = driver.with_hook(hook);
    }
    driver
}

/// Drive `machine` forward from `input` through `driver`, yielding one
/// [`Step`] per round of the loop (spec §4.7). Thin pass-through over
/// [`MachineDriver::run_machine`], kept here so callers only need this
/// crate's import surface.
pub fn run_machine<'a>(
    driver: &'a MachineDriver,
    machine: &'a mut Machine,
    input: MachineInput,
) -> impl Stream<Item = Result<Step, MachineError>> + 'a {
    driver.run_machine(machine, input)
}

pub use charter_control::run_command;

/// Pick the default command target (first non-suspended leaf,
/// depth-first) when the caller doesn't name one explicitly.
#[must_use]
pub fn default_target_instance(machine: &Machine) -> Option<charter_types::InstanceId> {
    charter_control::default_target_instance(machine)
}

/// Project every active (non-suspended) leaf instance, convenience for
/// callers building a client-facing view of "what's running now".
#[must_use]
pub fn active_instances(machine: &Machine) -> Vec<&Instance> {
    fn visit<'a>(machine: &'a Machine, id: charter_types::InstanceId, out: &mut Vec<&'a Instance>) {
        let Some(instance) = machine.instance(id) else { return };
        if instance.is_leaf() {
            if instance.suspended.is_none() {
                out.push(instance);
            }
            return;
        }
        for child in &instance.children {
            visit(machine, *child, out);
        }
    }
    let mut out = Vec::new();
    visit(machine, machine.root_id, &mut out);
    out
}
