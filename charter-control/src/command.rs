//! The synchronous command executor (spec §4.5): user-callable
//! operations against a live instance that bypass inference entirely.

use std::sync::Mutex;

use charter_schema::{NullValidator, SchemaValidator};
use charter_types::{
    CedeContent, Command, CommandContext, CommandError, CommandResult, ContentBlock, InstanceId, Machine,
    Message, MessageMetadata, MessageSource, Role, TransitionResult,
};
use serde_json::Value;

use crate::transition::{apply_transition_result, excise_ceded_instance};

/// Outcome of [`run_command`].
pub struct CommandOutcome {
    /// The command's own result value (only set for a `Value` result).
    pub result: Option<Value>,
    /// Messages recording the invocation, to append to history.
    pub messages: Vec<Message>,
    /// Content carried forward by a `cede` transition outcome, if
    /// that's what the command produced.
    pub cede_content: Option<CedeContent>,
}

/// Find `child`'s parent by walking the tree from the root (the arena
/// keeps no parent pointers, spec §9).
fn find_parent(machine: &Machine, child: InstanceId) -> Option<InstanceId> {
    fn visit(machine: &Machine, id: InstanceId, child: InstanceId) -> Option<InstanceId> {
        let instance = machine.instance(id)?;
        if instance.children.contains(&child) {
            return Some(id);
        }
        for next in &instance.children {
            if let Some(found) = visit(machine, *next, child) {
                return Some(found);
            }
        }
        None
    }
    visit(machine, machine.root_id, child)
}

struct NodeCommandContext<'a> {
    instance_id: InstanceId,
    state: Mutex<Value>,
    validator: &'a dyn SchemaValidator,
    history: &'a [Message],
}

impl CommandContext for NodeCommandContext<'_> {
    fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    fn state(&self) -> Value {
        self.state.lock().expect("state mutex poisoned").clone()
    }

    fn update_state(&self, patch: Value) -> Result<Value, CommandError> {
        let mut guard = self.state.lock().expect("state mutex poisoned");
        let result = charter_state::update_state(&guard, &patch, self.validator);
        if !result.success {
            return Err(CommandError::InvalidInput(
                result.error.unwrap_or_else(|| "validation failed".to_string()),
            ));
        }
        *guard = result.state.clone();
        Ok(result.state)
    }

    fn instance_messages(&self) -> Vec<Message> {
        self.history.to_vec()
    }
}

/// Pick the default command target when the caller supplies no
/// instance id: the first non-suspended leaf found depth-first.
#[must_use]
pub fn default_target_instance(machine: &Machine) -> Option<InstanceId> {
    fn visit(machine: &Machine, id: InstanceId) -> Option<InstanceId> {
        let instance = machine.instance(id)?;
        if instance.is_leaf() {
            return (instance.suspended.is_none()).then_some(id);
        }
        for child in &instance.children {
            if let Some(found) = visit(machine, *child) {
                return Some(found);
            }
        }
        None
    }
    visit(machine, machine.root_id)
}

/// Locate the command (node-scoped, falling back to pack-scoped) on
/// the given instance's node.
fn lookup_command<'a>(
    machine: &'a Machine,
    node_id: &str,
    name: &str,
) -> Option<&'a Command> {
    if let Some(node) = machine.charter.node(node_id) {
        if let Some(command) = node.commands.get(name) {
            return Some(command);
        }
        for pack_name in &node.packs {
            if let Some(pack) = machine.charter.pack(pack_name) {
                if let Some(command) = pack.commands.get(name) {
                    return Some(command);
                }
            }
        }
    }
    None
}

/// Run a command against `instance_id` (or the default target leaf),
/// returning its value and the messages recording the invocation.
pub async fn run_command(
    machine: &mut Machine,
    name: &str,
    input: Value,
    instance_id: Option<InstanceId>,
) -> Result<CommandOutcome, CommandError> {
    let target = instance_id
        .or_else(|| default_target_instance(machine))
        .ok_or_else(|| CommandError::InstanceNotFound("no active instance".to_string()))?;

    let node_id = machine
        .instance(target)
        .ok_or_else(|| CommandError::InstanceNotFound(target.to_string()))?
        .node_id
        .clone();

    let command = lookup_command(machine, &node_id, name)
        .ok_or_else(|| CommandError::NotFound(name.to_string()))?;

    if let Some(schema) = &command.input_schema {
        let validator = charter_schema::JsonSchemaValidator::compile(schema)
            .map_err(|e| CommandError::InvalidInput(e.to_string()))?;
        validator
            .validate(&input)
            .map_err(|e| CommandError::InvalidInput(e.to_string()))?;
    }

    let node = machine
        .resolve_node(&node_id)
        .ok_or_else(|| CommandError::InstanceNotFound(node_id.clone()))?;
    let validator: Box<dyn SchemaValidator> = charter_schema::JsonSchemaValidator::compile(&node.state_schema)
        .map(|v| Box::new(v) as Box<dyn SchemaValidator>)
        .unwrap_or_else(|_| Box::new(NullValidator));

    let current_state = machine
        .instance(target)
        .expect("checked above")
        .state
        .clone();
    let history: Vec<Message> = machine.history.clone();
    let execute = command.execute.clone();

    let ctx = NodeCommandContext {
        instance_id: target,
        state: Mutex::new(current_state),
        validator: validator.as_ref(),
        history: &history,
    };

    let result = execute.call(input.clone(), &ctx).await?;

    let mut messages = vec![Message {
        role: Role::Command,
        content: vec![ContentBlock::Text(format!("{name}({input})"))],
        metadata: MessageMetadata {
            source: Some(MessageSource { instance_id: Some(target), external: false }),
        },
    }];

    let mut cede_content = None;
    let value = match result {
        CommandResult::Value(value) => {
            if let Some(instance) = machine.instance_mut(target) {
                instance.state = ctx.state.into_inner().expect("mutex poisoned");
            }
            Some(value)
        }
        CommandResult::Resume => {
            if let Some(instance) = machine.instance_mut(target) {
                instance.suspended = None;
            }
            None
        }
        CommandResult::Transition(TransitionResult::Cede { content }) => {
            // Spec §4.5 step 6: tree surgery for a command-driven cede
            // means removing the instance, not just marking it ceded —
            // unlike the model-invoked path, there's no later loop step
            // to excise it.
            cede_content = content;
            if let Some(parent_id) = find_parent(machine, target) {
                excise_ceded_instance(machine, parent_id, target);
            }
            None
        }
        CommandResult::Transition(transition_result) => {
            apply_transition_result(machine, target, transition_result)?;
            None
        }
    };

    if let Some(instance) = machine.instance_mut(target) {
        messages.push(Message::instance_event(charter_types::InstanceEvent::State {
            instance_id: target,
            state: instance.state.clone(),
        }));
    }

    Ok(CommandOutcome { result: value, messages, cede_content })
}
