//! Response envelope and the error taxonomy visible to clients.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::errors::ProtocolError;
use crate::request::trim_trailing_whitespace;
use crate::validate::Rejection;

/// Outcome of one request.
///
/// `data` carries the handler result on success and an [`ErrorDescriptor`]
/// on failure. When `payload_length` is set, that many raw bytes follow the
/// response line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// `true` when the command ran to completion.
    pub status: bool,
    /// Result or error descriptor.
    #[serde(default)]
    pub data: Value,
    /// Number of raw payload bytes following the response line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_length: Option<u64>,
}

impl Response {
    /// Successful response carrying `data`.
    #[must_use]
    pub const fn success(data: Value) -> Self {
        Self {
            status: true,
            data,
            payload_length: None,
        }
    }

    /// Failed response carrying the serialised descriptor.
    #[must_use]
    pub fn failure(error: &ErrorDescriptor) -> Self {
        Self {
            status: false,
            data: serde_json::to_value(error).unwrap_or(Value::Null),
            payload_length: None,
        }
    }

    /// Announces a raw payload following the line.
    #[must_use]
    pub const fn with_payload_length(mut self, len: u64) -> Self {
        self.payload_length = Some(len);
        self
    }

    /// Decodes the error descriptor of a failed response.
    #[must_use]
    pub fn error(&self) -> Option<ErrorDescriptor> {
        if self.status {
            return None;
        }
        serde_json::from_value(self.data.clone()).ok()
    }

    /// Parses one response line.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] when the line is not a response
    /// envelope.
    pub fn parse(line: &[u8]) -> Result<Self, ProtocolError> {
        let trimmed = trim_trailing_whitespace(line);
        if trimmed.is_empty() {
            return Err(ProtocolError::malformed("empty response line"));
        }
        serde_json::from_slice(trimmed).map_err(ProtocolError::from_json_error)
    }

    /// Writes the response as a JSON line.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if serialisation or writing fails.
    pub fn write_jsonl<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        serde_json::to_writer(&mut *writer, self)?;
        writer.write_all(b"\n")
    }
}

/// One rejected parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Parameter name.
    pub name: String,
    /// Human-readable reason.
    pub reason: String,
}

impl FieldError {
    /// Describes a rejected parameter.
    #[must_use]
    pub fn new(name: &str, rejection: &Rejection) -> Self {
        Self {
            name: name.to_owned(),
            reason: rejection.to_string(),
        }
    }
}

/// Failure kinds a client can observe.
///
/// Serialised with an `error` tag, for example
/// `{"error":"validation_failed","fields":[{"name":"Start","reason":"…"}]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum ErrorDescriptor {
    /// No such module, or the module is not reachable from this origin.
    #[error("unknown module")]
    UnknownModule,
    /// The module has no command by that name or alias.
    #[error("unknown command")]
    UnknownCommand,
    /// The command needs a ticket and none was sent.
    #[error("a session ticket is required")]
    MissingTicket,
    /// The ticket does not belong to any session.
    #[error("the session ticket is not valid")]
    InvalidTicket,
    /// The ticket's session has expired.
    #[error("the session has expired")]
    ExpiredTicket,
    /// Credentials were rejected.
    #[error("authentication failed")]
    AuthenticationFailed,
    /// The caller lacks the required permission.
    #[error("forbidden")]
    Forbidden,
    /// One or more parameters failed validation.
    #[error("validation failed for {} parameter(s)", fields.len())]
    ValidationFailed {
        /// Every failing parameter, in declaration order.
        fields: Vec<FieldError>,
    },
    /// The handler failed unexpectedly; details are only logged.
    #[error("internal error")]
    InternalError,
    /// A business-level failure reported by the handler.
    #[error("{code}: {message}")]
    Domain {
        /// Stable machine-readable code.
        code: String,
        /// Human-readable message.
        message: String,
    },
    /// The request line could not be decoded.
    #[error("malformed request: {message}")]
    MalformedRequest {
        /// Parser detail.
        message: String,
    },
    /// The request line or payload exceeded a transport limit.
    #[error("request exceeds the {limit} byte limit")]
    RequestTooLarge {
        /// The violated limit in bytes.
        limit: u64,
    },
}

impl ErrorDescriptor {
    /// Stable tag, as serialised in the `error` field.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnknownModule => "unknown_module",
            Self::UnknownCommand => "unknown_command",
            Self::MissingTicket => "missing_ticket",
            Self::InvalidTicket => "invalid_ticket",
            Self::ExpiredTicket => "expired_ticket",
            Self::AuthenticationFailed => "authentication_failed",
            Self::Forbidden => "forbidden",
            Self::ValidationFailed { .. } => "validation_failed",
            Self::InternalError => "internal_error",
            Self::Domain { .. } => "domain",
            Self::MalformedRequest { .. } => "malformed_request",
            Self::RequestTooLarge { .. } => "request_too_large",
        }
    }

    /// Creates a domain error.
    #[must_use]
    pub fn domain(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Domain {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<ProtocolError> for ErrorDescriptor {
    fn from(error: ProtocolError) -> Self {
        Self::MalformedRequest {
            message: error.message().to_owned(),
        }
    }
}
