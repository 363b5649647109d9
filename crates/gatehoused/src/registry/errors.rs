//! Error types for registry lookups and declarations.

use gatehouse_protocol::UnsupportedType;
use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by the command registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No module with that name is registered.
    #[error("unknown module: {module}")]
    UnknownModule { module: String },
    /// The module has no command with that name or alias.
    #[error("unknown command '{command}' in module '{module}'")]
    UnknownCommand { module: String, command: String },
    /// The command name or alias is already taken.
    #[error("command '{command}' is already registered in module '{module}'")]
    DuplicateCommand { module: String, command: String },
    /// A parameter name appears twice in one declaration.
    #[error("parameter '{parameter}' is declared twice on {module}.{command}")]
    DuplicateParameter {
        module: String,
        command: String,
        parameter: String,
    },
    /// A `file` parameter was declared on a command without a payload.
    #[error("parameter '{parameter}' on {module}.{command} is a file but the command is not binary")]
    FileParameterOnNonBinary {
        module: String,
        command: String,
        parameter: String,
    },
    /// The command names a different module than the one it is registered under.
    #[error("command '{command}' declares module '{declared}' but was registered under '{module}'")]
    ModuleMismatch {
        module: String,
        command: String,
        declared: String,
    },
    /// The module is already registered with the opposite reachability.
    #[error("module '{module}' is already registered with remote = {stored}")]
    RemoteConflict { module: String, stored: bool },
    /// A stored parameter carries a type tag this build does not know.
    #[error("invalid declaration of {module}.{command}: {source}")]
    UnsupportedType {
        module: String,
        command: String,
        #[source]
        source: UnsupportedType,
    },
    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A thread panicked while holding the catalogue lock.
    #[error("registry catalogue lock poisoned")]
    Poisoned,
}

impl RegistryError {
    /// Creates an unknown module error.
    pub fn unknown_module(module: impl Into<String>) -> Self {
        Self::UnknownModule {
            module: module.into(),
        }
    }

    /// Creates an unknown command error.
    pub fn unknown_command(module: impl Into<String>, command: impl Into<String>) -> Self {
        Self::UnknownCommand {
            module: module.into(),
            command: command.into(),
        }
    }

    /// Creates a duplicate command error.
    pub fn duplicate_command(module: impl Into<String>, command: impl Into<String>) -> Self {
        Self::DuplicateCommand {
            module: module.into(),
            command: command.into(),
        }
    }
}

impl From<rusqlite::Error> for RegistryError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Store(StoreError::from(error))
    }
}
