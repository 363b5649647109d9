//! Request envelope.
//!
//! A request is one JSON line. When `payload_length` is set, exactly that many
//! raw bytes follow the newline; the envelope itself never embeds binary data.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ProtocolError;

/// A single command invocation as sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Target module name.
    pub module: String,
    /// Command name or alias.
    pub command: String,
    /// Raw parameter values keyed by parameter name.
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Session ticket, if the caller has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket: Option<String>,
    /// Number of raw payload bytes following the request line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_length: Option<u64>,
}

impl Request {
    /// Creates a request with no parameters, ticket or payload.
    #[must_use]
    pub fn new(module: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            command: command.into(),
            parameters: Map::new(),
            ticket: None,
            payload_length: None,
        }
    }

    /// Adds a raw parameter value.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Attaches a session ticket.
    #[must_use]
    pub fn with_ticket(mut self, ticket: impl Into<String>) -> Self {
        self.ticket = Some(ticket.into());
        self
    }

    /// Announces a binary payload of `len` bytes.
    #[must_use]
    pub const fn with_payload_length(mut self, len: u64) -> Self {
        self.payload_length = Some(len);
        self
    }

    /// Parses one request line.
    ///
    /// Trailing whitespace, including the newline delimiter, is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] when the line is empty, is not
    /// JSON, or does not match the envelope.
    pub fn parse(line: &[u8]) -> Result<Self, ProtocolError> {
        let trimmed = trim_trailing_whitespace(line);
        if trimmed.is_empty() {
            return Err(ProtocolError::malformed("empty request line"));
        }
        serde_json::from_slice(trimmed).map_err(ProtocolError::from_json_error)
    }

    /// Checks that module and command are non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] naming the empty field.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.module().is_empty() {
            return Err(ProtocolError::malformed("module field is empty"));
        }
        if self.command().is_empty() {
            return Err(ProtocolError::malformed("command field is empty"));
        }
        Ok(())
    }

    /// Trimmed module name.
    #[must_use]
    pub fn module(&self) -> &str {
        self.module.trim()
    }

    /// Trimmed command name or alias.
    #[must_use]
    pub fn command(&self) -> &str {
        self.command.trim()
    }

    /// Ticket, treating a blank string as absent.
    #[must_use]
    pub fn ticket(&self) -> Option<&str> {
        self.ticket
            .as_deref()
            .map(str::trim)
            .filter(|ticket| !ticket.is_empty())
    }

    /// Writes the request as a JSON line.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if serialisation or writing fails.
    pub fn write_jsonl<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        serde_json::to_writer(&mut *writer, self)?;
        writer.write_all(b"\n")
    }
}

pub(crate) fn trim_trailing_whitespace(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|byte| !byte.is_ascii_whitespace())
        .map_or(0, |pos| pos + 1);
    &bytes[..end]
}
