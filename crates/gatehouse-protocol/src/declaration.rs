//! Declarative shapes of modules, commands and parameters.
//!
//! These are the records the registry persists and the client can fetch via
//! `System.Describe` to mirror validation locally.

use serde::{Deserialize, Serialize};

use crate::types::ParamType;

/// A named, addressable unit of functionality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDef {
    /// Stable identifier.
    pub name: String,
    /// Whether the module is reachable over the network transport.
    pub remote: bool,
}

impl ModuleDef {
    /// Declares a network-reachable module.
    #[must_use]
    pub fn remote(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remote: true,
        }
    }

    /// Declares an in-process-only module.
    #[must_use]
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remote: false,
        }
    }
}

/// A single formal argument of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Name as it appears in the request's parameter map.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub param_type: ParamType,
    /// May be omitted entirely.
    #[serde(default)]
    pub optional: bool,
    /// May be present but explicitly null.
    #[serde(default)]
    pub nullable: bool,
}

impl ParameterDef {
    /// Declares a mandatory, non-nullable parameter.
    #[must_use]
    pub fn required(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            optional: false,
            nullable: false,
        }
    }

    /// Declares an optional, non-nullable parameter.
    #[must_use]
    pub fn optional(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            optional: true,
            ..Self::required(name, param_type)
        }
    }

    /// Allows an explicit null.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// A remote operation exposed by a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDef {
    /// Owning module name.
    pub module: String,
    /// Name, unique within the module.
    pub name: String,
    /// Alternative public name, unique across the registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Whether a valid ticket is mandatory.
    pub require_ticket: bool,
    /// Whether the request carries a raw binary payload.
    #[serde(default)]
    pub binary: bool,
    /// Parameters in declaration order.
    #[serde(default)]
    pub parameters: Vec<ParameterDef>,
}

impl CommandDef {
    /// Declares a ticket-protected command with no parameters.
    #[must_use]
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
            alias: None,
            require_ticket: true,
            binary: false,
            parameters: Vec::new(),
        }
    }

    /// Sets the alias.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Marks the command as callable without a ticket.
    #[must_use]
    pub fn anonymous(mut self) -> Self {
        self.require_ticket = false;
        self
    }

    /// Marks the command as carrying a binary payload.
    #[must_use]
    pub fn binary(mut self) -> Self {
        self.binary = true;
        self
    }

    /// Appends a parameter.
    #[must_use]
    pub fn param(mut self, parameter: ParameterDef) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Looks up a parameter by exact name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ParameterDef> {
        self.parameters.iter().find(|param| param.name == name)
    }

    /// Returns the first parameter name declared more than once.
    #[must_use]
    pub fn duplicate_parameter(&self) -> Option<&str> {
        self.parameters.iter().enumerate().find_map(|(index, param)| {
            self.parameters
                .iter()
                .skip(index + 1)
                .any(|other| other.name == param.name)
                .then_some(param.name.as_str())
        })
    }

    /// Returns the first `file` parameter when the command is not binary.
    #[must_use]
    pub fn misplaced_file_parameter(&self) -> Option<&str> {
        if self.binary {
            return None;
        }
        self.parameters
            .iter()
            .find(|param| param.param_type == ParamType::File)
            .map(|param| param.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_duplicate_parameters() {
        let command = CommandDef::new("Calendar", "CreateEvent")
            .param(ParameterDef::required("Start", ParamType::DateTime))
            .param(ParameterDef::optional("Start", ParamType::Date));
        assert_eq!(command.duplicate_parameter(), Some("Start"));
    }

    #[test]
    fn file_parameters_need_binary_commands() {
        let upload = CommandDef::new("Archive", "Upload")
            .param(ParameterDef::required("Content", ParamType::File));
        assert_eq!(upload.misplaced_file_parameter(), Some("Content"));
        assert_eq!(upload.binary().misplaced_file_parameter(), None);
    }

    #[test]
    fn parameter_declarations_deserialise_from_tags() {
        let json = r#"{"name":"Level","type":"enum(low,high)","optional":true}"#;
        let parameter: ParameterDef = serde_json::from_str(json).expect("parameter");
        assert_eq!(parameter.param_type, ParamType::one_of(["low", "high"]));
        assert!(parameter.optional);
        assert!(!parameter.nullable);
    }
}
