//! Client projection (spec §4.9, C10): a read-only wire view of an
//! instance plus hydration back into callables the consumer invokes
//! through the command executor.

use std::collections::HashMap;
use std::sync::Arc;

use charter_schema::{JsonSchemaValidator, NullValidator, SchemaValidator};
use charter_types::{Charter, Instance, InstanceId, Machine};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WireError;

/// A single command's descriptor as surfaced to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DryCommandDescriptor {
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the command's input, if any.
    pub input_schema: Option<Value>,
}

/// A read-only projection of a node for client consumption: no tools,
/// no transitions, no closures — just what a command-driven client
/// needs to render and act.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DryClientNode {
    /// Free-text instructions (useful for clients that surface the
    /// agent's current framing to a human operator).
    pub instructions: String,
    /// JSON Schema the node's state validates against.
    pub state_schema: Value,
    /// Commands available on this instance, by name.
    pub commands: HashMap<String, DryCommandDescriptor>,
}

/// A read-only wire view of a live instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DryClientInstance {
    /// The instance's id.
    pub instance_id: InstanceId,
    /// Current state.
    pub state: Value,
    /// Pack states, present only when projecting the root instance.
    pub pack_states: Option<HashMap<String, Value>>,
    /// The read-only node projection.
    pub node: DryClientNode,
}

/// A command request built by [`ClientInstance::build_command`],
/// ready to be sent back through [`charter_control::run_command`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CommandRequest {
    /// Always `"command"`, matching spec §4.9's wire shape.
    #[serde(rename = "type")]
    pub kind: String,
    /// The command name.
    pub name: String,
    /// The command input.
    pub input: Value,
}

/// The hydrated counterpart to a [`DryClientInstance`]: still a
/// read-only snapshot, but one that can validate and build
/// [`CommandRequest`] values for its own commands.
pub struct ClientInstance {
    /// The instance's id.
    pub instance_id: InstanceId,
    /// Current state, captured at hydration time.
    pub state: Value,
    /// Pack states, captured at hydration time.
    pub pack_states: Option<HashMap<String, Value>>,
    commands: HashMap<String, DryCommandDescriptor>,
}

impl ClientInstance {
    /// Validate `input` against the named command's schema (if any)
    /// and build the [`CommandRequest`] a caller sends back through the
    /// command executor.
    pub fn build_command(&self, name: &str, input: Value) -> Result<CommandRequest, WireError> {
        let descriptor = self
            .commands
            .get(name)
            .ok_or_else(|| WireError::UnknownCommand(name.to_string()))?;

        let validator: Box<dyn SchemaValidator> = match &descriptor.input_schema {
            Some(schema) => Box::new(
                JsonSchemaValidator::compile(schema).map_err(|e| WireError::InvalidInput(e.to_string()))?,
            ),
            None => Box::new(NullValidator),
        };
        validator
            .validate(&input)
            .map_err(|e| WireError::InvalidInput(e.to_string()))?;

        Ok(CommandRequest {
            kind: "command".to_string(),
            name: name.to_string(),
            input,
        })
    }

    /// Names of every command available on this instance.
    #[must_use]
    pub fn command_names(&self) -> Vec<&str> {
        self.commands.keys().map(String::as_str).collect()
    }
}

fn collect_commands(charter: &Charter, node_id: &str) -> HashMap<String, DryCommandDescriptor> {
    let mut commands = HashMap::new();
    let Some(node) = charter.node(node_id) else {
        return commands;
    };
    for (name, command) in &node.commands {
        commands.insert(
            name.clone(),
            DryCommandDescriptor {
                description: command.description.clone(),
                input_schema: command.input_schema.clone(),
            },
        );
    }
    for pack_name in &node.packs {
        if let Some(pack) = charter.pack(pack_name) {
            for (name, command) in &pack.commands {
                commands.entry(name.clone()).or_insert_with(|| DryCommandDescriptor {
                    description: command.description.clone(),
                    input_schema: command.input_schema.clone(),
                });
            }
        }
    }
    commands
}

/// Project a live instance into its read-only wire view.
///
/// Returns `None` if `instance`'s node isn't resolvable against either
/// the charter's registry or the machine's inline nodes.
#[must_use]
pub fn create_dry_client_instance(machine: &Machine, instance: &Instance) -> Option<DryClientInstance> {
    let node = machine.resolve_node(&instance.node_id)?;
    let commands = collect_commands(&machine.charter, &instance.node_id);
    Some(DryClientInstance {
        instance_id: instance.id,
        state: instance.state.clone(),
        pack_states: instance.pack_states.clone(),
        node: DryClientNode {
            instructions: node.instructions.clone(),
            state_schema: node.state_schema.clone(),
            commands,
        },
    })
}

/// Hydrate a [`DryClientInstance`] into a [`ClientInstance`] capable of
/// building validated [`CommandRequest`] values.
#[must_use]
pub fn hydrate_client_instance(dry: &DryClientInstance) -> ClientInstance {
    ClientInstance {
        instance_id: dry.instance_id,
        state: dry.state.clone(),
        pack_states: dry.pack_states.clone(),
        commands: dry.node.commands.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use charter_types::{Command, CommandFn, CommandFuture, CommandResult, DefaultPromptBuilder, ExecutorConfig, Node};
    use std::collections::HashMap as StdHashMap;

    struct NoopCommand;
    impl CommandFn for NoopCommand {
        fn call<'a>(&'a self, input: Value, _ctx: &'a dyn charter_types::CommandContext) -> CommandFuture<'a> {
            Box::pin(async move { Ok(CommandResult::Value(input)) })
        }
    }

    fn charter_with_command() -> Arc<Charter> {
        let node = Node::new("root", "be helpful", serde_json::json!({ "type": "object" })).with_command(Command {
            name: "ping".to_string(),
            description: "pings back".to_string(),
            input_schema: Some(serde_json::json!({ "type": "object", "required": ["x"] })),
            execute: Arc::new(NoopCommand),
        });
        let mut nodes = StdHashMap::new();
        nodes.insert("root".to_string(), Arc::new(node));
        Arc::new(Charter {
            name: "client-test".into(),
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
    fn projects_commands_and_builds_a_request() {
        let charter = charter_with_command();
        let machine = Machine::new(charter);
        let dry = create_dry_client_instance(&machine, machine.root()).unwrap();
        assert!(dry.node.commands.contains_key("ping"));

        let hydrated = hydrate_client_instance(&dry);
        let request = hydrated.build_command("ping", serde_json::json!({ "x": 1 })).unwrap();
        assert_eq!(request.kind, "command");
        assert_eq!(request.name, "ping");

        let err = hydrated.build_command("ping", serde_json::json!({})).unwrap_err();
        assert!(matches!(err, WireError::InvalidInput(_)));

        let unknown = hydrated.build_command("nope", serde_json::json!({}));
        assert!(matches!(unknown, Err(WireError::UnknownCommand(_))));
    }
}
