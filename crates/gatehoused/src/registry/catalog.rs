//! Immutable snapshot of the registered modules and commands.

use std::collections::HashMap;
use std::sync::Arc;

use gatehouse_protocol::{CommandDef, ModuleDef, ParamType, ParameterDef};
use rusqlite::Connection;

use super::RegistryError;

/// A command resolved from the catalogue.
#[derive(Debug, Clone)]
pub struct Resolved {
    /// Whether the owning module accepts network requests.
    pub remote: bool,
    /// The shared declaration.
    pub command: Arc<CommandDef>,
}

#[derive(Debug)]
struct ModuleEntry {
    def: ModuleDef,
    commands: Vec<Arc<CommandDef>>,
    // Lower-cased command names and aliases.
    lookup: HashMap<String, Arc<CommandDef>>,
}

/// Read-only view of the registry, rebuilt wholesale after each mutation.
#[derive(Debug, Default)]
pub(crate) struct Catalog {
    modules: HashMap<String, ModuleEntry>,
}

fn fold(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

impl Catalog {
    pub(crate) fn load(conn: &Connection) -> Result<Self, RegistryError> {
        let mut modules = HashMap::new();

        let mut module_rows = conn.prepare("SELECT name, remote FROM modules ORDER BY name")?;
        let defs = module_rows.query_map([], |row| {
            Ok(ModuleDef {
                name: row.get(0)?,
                remote: row.get(1)?,
            })
        })?;
        for def in defs {
            let def = def?;
            let commands = load_commands(conn, &def.name)?;
            let lookup = commands
                .iter()
                .flat_map(|command| {
                    let by_name = (fold(&command.name), Arc::clone(command));
                    let by_alias = command
                        .alias
                        .as_deref()
                        .map(|alias| (fold(alias), Arc::clone(command)));
                    std::iter::once(by_name).chain(by_alias)
                })
                .collect();
            modules.insert(
                fold(&def.name),
                ModuleEntry {
                    def,
                    commands,
                    lookup,
                },
            );
        }

        Ok(Self { modules })
    }

    pub(crate) fn resolve(&self, module: &str, command: &str) -> Result<Resolved, RegistryError> {
        let entry = self
            .modules
            .get(&fold(module))
            .ok_or_else(|| RegistryError::unknown_module(module))?;
        let found = entry
            .lookup
            .get(&fold(command))
            .ok_or_else(|| RegistryError::unknown_command(&entry.def.name, command))?;
        Ok(Resolved {
            remote: entry.def.remote,
            command: Arc::clone(found),
        })
    }

    pub(crate) fn modules(&self) -> Vec<ModuleDef> {
        let mut defs: Vec<ModuleDef> = self.modules.values().map(|entry| entry.def.clone()).collect();
        defs.sort_by(|left, right| left.name.cmp(&right.name));
        defs
    }

    pub(crate) fn describe(
        &self,
        module: &str,
    ) -> Result<(ModuleDef, Vec<Arc<CommandDef>>), RegistryError> {
        self.modules
            .get(&fold(module))
            .map(|entry| (entry.def.clone(), entry.commands.clone()))
            .ok_or_else(|| RegistryError::unknown_module(module))
    }
}

struct CommandRow {
    name: String,
    alias: Option<String>,
    require_ticket: bool,
    binary: bool,
}

fn load_commands(conn: &Connection, module: &str) -> Result<Vec<Arc<CommandDef>>, RegistryError> {
    let mut statement = conn.prepare(
        "SELECT name, alias, require_ticket, binary_payload FROM commands
         WHERE module = ?1 ORDER BY name",
    )?;
    let rows = statement
        .query_map([module], |row| {
            Ok(CommandRow {
                name: row.get(0)?,
                alias: row.get(1)?,
                require_ticket: row.get(2)?,
                binary: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|row| {
            let parameters = load_parameters(conn, module, &row.name)?;
            Ok(Arc::new(CommandDef {
                module: module.to_owned(),
                name: row.name,
                alias: row.alias,
                require_ticket: row.require_ticket,
                binary: row.binary,
                parameters,
            }))
        })
        .collect()
}

fn load_parameters(
    conn: &Connection,
    module: &str,
    command: &str,
) -> Result<Vec<ParameterDef>, RegistryError> {
    let mut statement = conn.prepare(
        "SELECT name, type, optional, nullable FROM parameters
         WHERE module = ?1 AND command = ?2 ORDER BY position",
    )?;
    let rows = statement
        .query_map([module, command], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, bool>(2)?,
                row.get::<_, bool>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(name, tag, optional, nullable)| {
            let param_type = tag.parse::<ParamType>().map_err(|source| {
                RegistryError::UnsupportedType {
                    module: module.to_owned(),
                    command: command.to_owned(),
                    source,
                }
            })?;
            Ok(ParameterDef {
                name,
                param_type,
                optional,
                nullable,
            })
        })
        .collect()
}
