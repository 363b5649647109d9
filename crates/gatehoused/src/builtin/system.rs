//! Declaration introspection.

use std::sync::Arc;

use gatehouse_protocol::{Arguments, CommandDef, ParamType, ParameterDef};
use serde_json::{Value, json};

use crate::dispatch::{CommandHandler, HandlerError, HandlerTable, Origin, Reply, RequestContext};
use crate::registry::{Registry, RegistryError};

/// Name of the introspection module.
pub const SYSTEM_MODULE: &str = "System";

pub(super) fn declarations() -> Vec<CommandDef> {
    vec![
        CommandDef::new(SYSTEM_MODULE, "Describe")
            .param(ParameterDef::required("Module", ParamType::String))
            .param(ParameterDef::optional("Command", ParamType::String)),
    ]
}

pub(super) fn bind(registry: &Arc<Registry>, handlers: &mut HandlerTable) {
    handlers.bind(
        SYSTEM_MODULE,
        "Describe",
        Arc::new(Describe(Arc::clone(registry))),
    );
}

/// Returns the declarations of a module, or of one of its commands.
struct Describe(Arc<Registry>);

impl CommandHandler for Describe {
    fn call(&self, context: &RequestContext, arguments: &Arguments) -> Result<Reply, HandlerError> {
        let requested = arguments.str("Module").unwrap_or_default();
        let (module, commands) = self.0.describe(requested)?;
        if context.origin == Origin::Network && !module.remote {
            return Err(RegistryError::unknown_module(requested).into());
        }

        let Some(command) = arguments.str("Command") else {
            let described = commands
                .iter()
                .map(|def| describe_command(def))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Reply::json(json!({
                "module": module.name,
                "remote": module.remote,
                "commands": described,
            })));
        };
        let def = commands
            .iter()
            .find(|def| {
                def.name.eq_ignore_ascii_case(command)
                    || def
                        .alias
                        .as_deref()
                        .is_some_and(|alias| alias.eq_ignore_ascii_case(command))
            })
            .ok_or_else(|| RegistryError::unknown_command(&module.name, command))?;
        Ok(Reply::json(describe_command(def)?))
    }
}

fn describe_command(def: &CommandDef) -> Result<Value, HandlerError> {
    serde_json::to_value(def)
        .map_err(|error| HandlerError::internal(format!("cannot describe {}: {error}", def.name)))
}
