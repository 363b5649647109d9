//! Command registry: the persisted catalogue of modules and commands.
//!
//! The store is the source of truth. Readers work from an immutable
//! catalogue snapshot held behind an `RwLock<Arc<_>>`; every mutation
//! commits to the store and then swaps in a freshly loaded snapshot while
//! holding the write lock, so concurrent readers never observe a partially
//! applied registration.

mod catalog;
mod errors;

use std::sync::{Arc, RwLock};

use gatehouse_protocol::{CommandDef, ModuleDef};
use rusqlite::{OptionalExtension, TransactionBehavior, params};
use tracing::info;

use crate::store::Store;

use self::catalog::Catalog;
pub use self::catalog::Resolved;
pub use self::errors::RegistryError;

pub(crate) const REGISTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::registry");

/// Persisted registry of modules, commands and parameters.
#[derive(Debug)]
pub struct Registry {
    store: Store,
    catalog: RwLock<Arc<Catalog>>,
}

impl Registry {
    /// Loads the registry from the store.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnsupportedType`] when a stored parameter has
    /// an unknown type tag, or a store error.
    pub fn load(store: Store) -> Result<Self, RegistryError> {
        let catalog = store.with_connection(|conn| Catalog::load(conn))?;
        Ok(Self {
            store,
            catalog: RwLock::new(Arc::new(catalog)),
        })
    }

    /// Registers `command` under `module`, creating the module on first use.
    ///
    /// An existing module keeps its reachability; only unregistering and
    /// registering again changes it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateParameter`],
    /// [`RegistryError::FileParameterOnNonBinary`] or
    /// [`RegistryError::ModuleMismatch`] for an invalid declaration,
    /// [`RegistryError::RemoteConflict`] when the module exists with the other
    /// reachability, and [`RegistryError::DuplicateCommand`] when the name or
    /// alias is taken.
    pub fn register(
        &self,
        module: &ModuleDef,
        command: CommandDef,
    ) -> Result<Arc<CommandDef>, RegistryError> {
        check_declaration(module, &command)?;

        let mut catalog = self.catalog.write().map_err(|_| RegistryError::Poisoned)?;
        let loaded = self.store.with_connection(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute(
                "INSERT INTO modules (name, remote) VALUES (?1, ?2)
                 ON CONFLICT(name) DO NOTHING",
                params![module.name, module.remote],
            )?;
            let stored: bool = tx.query_row(
                "SELECT remote FROM modules WHERE name = ?1",
                [&module.name],
                |row| row.get(0),
            )?;
            if stored != module.remote {
                return Err(RegistryError::RemoteConflict {
                    module: module.name.clone(),
                    stored,
                });
            }

            let taken: bool = tx.query_row(
                "SELECT EXISTS (
                     SELECT 1 FROM commands
                     WHERE (module = ?1 AND (name = ?2 OR alias = ?2 OR name = ?3))
                        OR alias = ?3
                 )",
                params![module.name, command.name, command.alias],
                |row| row.get(0),
            )?;
            if taken {
                return Err(RegistryError::duplicate_command(&module.name, &command.name));
            }

            tx.execute(
                "INSERT INTO commands (module, name, alias, require_ticket, binary_payload)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    module.name,
                    command.name,
                    command.alias,
                    command.require_ticket,
                    command.binary
                ],
            )?;
            for (position, parameter) in command.parameters.iter().enumerate() {
                tx.execute(
                    "INSERT INTO parameters (module, command, position, name, type, optional, nullable)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        module.name,
                        command.name,
                        i64::try_from(position).unwrap_or(i64::MAX),
                        parameter.name,
                        parameter.param_type.to_string(),
                        parameter.optional,
                        parameter.nullable
                    ],
                )?;
            }
            tx.commit()?;
            Catalog::load(conn)
        })?;

        let resolved = loaded.resolve(&module.name, &command.name)?;
        *catalog = Arc::new(loaded);
        info!(
            target: REGISTRY_TARGET,
            module = %module.name,
            command = %command.name,
            alias = command.alias.as_deref().unwrap_or(""),
            "command registered"
        );
        Ok(resolved.command)
    }

    /// Removes a module together with all its commands and parameters.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownModule`] when the module is absent.
    pub fn unregister(&self, module: &str) -> Result<(), RegistryError> {
        let mut catalog = self.catalog.write().map_err(|_| RegistryError::Poisoned)?;
        let loaded = self.store.with_connection(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let stored: Option<String> = tx
                .query_row(
                    "SELECT name FROM modules WHERE name = ?1",
                    [module],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(stored) = stored else {
                return Err(RegistryError::unknown_module(module));
            };
            tx.execute("DELETE FROM parameters WHERE module = ?1", [&stored])?;
            tx.execute("DELETE FROM commands WHERE module = ?1", [&stored])?;
            tx.execute("DELETE FROM modules WHERE name = ?1", [&stored])?;
            tx.commit()?;
            Catalog::load(conn)
        })?;

        *catalog = Arc::new(loaded);
        info!(target: REGISTRY_TARGET, module, "module unregistered");
        Ok(())
    }

    /// Resolves a command by name or alias.
    ///
    /// Both forms yield the same shared declaration.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownModule`] or
    /// [`RegistryError::UnknownCommand`].
    pub fn resolve(&self, module: &str, command: &str) -> Result<Resolved, RegistryError> {
        self.snapshot()?.resolve(module, command)
    }

    /// Lists registered modules ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Poisoned`] if the catalogue lock is poisoned.
    pub fn modules(&self) -> Result<Vec<ModuleDef>, RegistryError> {
        Ok(self.snapshot()?.modules())
    }

    /// Returns a module and its commands ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownModule`] when the module is absent.
    pub fn describe(
        &self,
        module: &str,
    ) -> Result<(ModuleDef, Vec<Arc<CommandDef>>), RegistryError> {
        self.snapshot()?.describe(module)
    }

    fn snapshot(&self) -> Result<Arc<Catalog>, RegistryError> {
        self.catalog
            .read()
            .map(|catalog| Arc::clone(&catalog))
            .map_err(|_| RegistryError::Poisoned)
    }
}

fn check_declaration(module: &ModuleDef, command: &CommandDef) -> Result<(), RegistryError> {
    if !command.module.eq_ignore_ascii_case(&module.name) {
        return Err(RegistryError::ModuleMismatch {
            module: module.name.clone(),
            command: command.name.clone(),
            declared: command.module.clone(),
        });
    }
    if let Some(parameter) = command.duplicate_parameter() {
        return Err(RegistryError::DuplicateParameter {
            module: module.name.clone(),
            command: command.name.clone(),
            parameter: parameter.to_owned(),
        });
    }
    if let Some(parameter) = command.misplaced_file_parameter() {
        return Err(RegistryError::FileParameterOnNonBinary {
            module: module.name.clone(),
            command: command.name.clone(),
            parameter: parameter.to_owned(),
        });
    }
    if command
        .alias
        .as_deref()
        .is_some_and(|alias| alias.eq_ignore_ascii_case(&command.name))
    {
        return Err(RegistryError::duplicate_command(&module.name, &command.name));
    }
    Ok(())
}
