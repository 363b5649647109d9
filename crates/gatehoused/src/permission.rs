//! Permission gate: decides whether a principal may run a command.
//!
//! A command may be bound to a permission flag. Unbound commands are open to
//! anyone, authenticated or not. Bound commands need a principal whose
//! groups grant the flag. An optional [`AccessControl`] hook can refine the
//! decision for a command using its raw parameters.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use gatehouse_protocol::CommandDef;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::session::Principal;

/// Maps commands to the permission flag they require.
pub trait PermissionLookup: Send + Sync {
    /// Flag bound to `module.command`, if any.
    fn flag_for(&self, module: &str, command: &str) -> Option<String>;
}

/// Per-command hook consulted after the flag check.
pub trait AccessControl: Send + Sync {
    /// Returns `false` to deny the request.
    fn permits(
        &self,
        principal: Option<&Principal>,
        command: &CommandDef,
        parameters: &Map<String, Value>,
    ) -> bool;
}

impl<F> AccessControl for F
where
    F: Fn(Option<&Principal>, &CommandDef, &Map<String, Value>) -> bool + Send + Sync,
{
    fn permits(
        &self,
        principal: Option<&Principal>,
        command: &CommandDef,
        parameters: &Map<String, Value>,
    ) -> bool {
        self(principal, command, parameters)
    }
}

/// In-memory command-to-flag table. Lookups ignore case.
#[derive(Debug, Clone, Default)]
pub struct StaticPermissionMap {
    flags: HashMap<(String, String), String>,
}

impl StaticPermissionMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `module.command` to `flag`.
    #[must_use]
    pub fn require(mut self, module: &str, command: &str, flag: impl Into<String>) -> Self {
        self.flags.insert(key(module, command), flag.into());
        self
    }
}

fn key(module: &str, command: &str) -> (String, String) {
    (
        module.trim().to_ascii_lowercase(),
        command.trim().to_ascii_lowercase(),
    )
}

impl PermissionLookup for StaticPermissionMap {
    fn flag_for(&self, module: &str, command: &str) -> Option<String> {
        self.flags.get(&key(module, command)).cloned()
    }
}

/// Why the gate refused a request.
///
/// Only logged; clients always see a plain `forbidden`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Forbidden {
    /// The command needs a flag and the request is anonymous.
    #[error("anonymous request to a command requiring '{flag}'")]
    Anonymous { flag: String },
    /// The principal's groups do not grant the flag.
    #[error("missing permission '{flag}'")]
    MissingFlag { flag: String },
    /// The access-control hook said no.
    #[error("denied by access control")]
    Denied,
}

/// Evaluates permission flags and access-control hooks.
#[derive(Clone)]
pub struct PermissionGate {
    lookup: Arc<dyn PermissionLookup>,
    access: HashMap<(String, String), Arc<dyn AccessControl>>,
}

impl fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionGate")
            .field("access_hooks", &self.access.len())
            .finish_non_exhaustive()
    }
}

impl Default for PermissionGate {
    fn default() -> Self {
        Self::new(Arc::new(StaticPermissionMap::new()))
    }
}

impl PermissionGate {
    /// Creates a gate over `lookup` with no access-control hooks.
    #[must_use]
    pub fn new(lookup: Arc<dyn PermissionLookup>) -> Self {
        Self {
            lookup,
            access: HashMap::new(),
        }
    }

    /// Installs a hook for `module.command`, replacing any previous one.
    #[must_use]
    pub fn with_access_control(
        mut self,
        module: &str,
        command: &str,
        hook: Arc<dyn AccessControl>,
    ) -> Self {
        self.access.insert(key(module, command), hook);
        self
    }

    /// Decides whether `principal` may run `command`.
    ///
    /// # Errors
    ///
    /// Returns [`Forbidden`] describing the first failed check.
    pub fn authorize(
        &self,
        principal: Option<&Principal>,
        command: &CommandDef,
        parameters: &Map<String, Value>,
    ) -> Result<(), Forbidden> {
        if let Some(flag) = self.lookup.flag_for(&command.module, &command.name) {
            match principal {
                None => return Err(Forbidden::Anonymous { flag }),
                Some(principal) if !principal.has_permission(&flag) => {
                    return Err(Forbidden::MissingFlag { flag });
                }
                Some(_) => {}
            }
        }

        match self.access.get(&key(&command.module, &command.name)) {
            Some(hook) if !hook.permits(principal, command, parameters) => Err(Forbidden::Denied),
            _ => Ok(()),
        }
    }
}
