//! Modules the daemon provides itself.
//!
//! `Security` issues and revokes tickets; `System` lets clients read command
//! declarations. Both are installed during bootstrap and re-installing them
//! over an unchanged store is a no-op.

mod security;
mod system;

use std::sync::Arc;

use gatehouse_protocol::{CommandDef, ModuleDef};
use tracing::debug;

use crate::dispatch::HandlerTable;
use crate::registry::{Registry, RegistryError, REGISTRY_TARGET};
use crate::session::SessionManager;

pub use self::security::{LOGIN_EVENT, SECURITY_MODULE};
pub use self::system::SYSTEM_MODULE;

/// Registers the built-in modules and binds their handlers.
///
/// # Errors
///
/// Returns a [`RegistryError`] if a declaration cannot be stored.
pub fn install(
    registry: &Arc<Registry>,
    sessions: &Arc<SessionManager>,
    handlers: &mut HandlerTable,
) -> Result<(), RegistryError> {
    ensure_module(
        registry,
        &ModuleDef::remote(SECURITY_MODULE),
        security::declarations(),
    )?;
    ensure_module(
        registry,
        &ModuleDef::remote(SYSTEM_MODULE),
        system::declarations(),
    )?;
    security::bind(sessions, handlers);
    system::bind(registry, handlers);
    Ok(())
}

/// Brings `module` in line with `declared`, rewriting it only on drift.
fn ensure_module(
    registry: &Registry,
    module: &ModuleDef,
    mut declared: Vec<CommandDef>,
) -> Result<(), RegistryError> {
    declared.sort_by(|left, right| left.name.cmp(&right.name));
    match registry.describe(&module.name) {
        Ok((stored, commands))
            if stored == *module
                && commands.len() == declared.len()
                && commands.iter().zip(&declared).all(|(have, want)| **have == *want) =>
        {
            debug!(target: REGISTRY_TARGET, module = %module.name, "built-in module up to date");
            return Ok(());
        }
        Ok(_) => registry.unregister(&module.name)?,
        Err(RegistryError::UnknownModule { .. }) => {}
        Err(error) => return Err(error),
    }
    for command in declared {
        registry.register(module, command)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests;
