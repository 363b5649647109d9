//! Error types for request dispatch failures.
//!
//! Every pipeline stage reports a [`DispatchError`]. [`DispatchError::descriptor`]
//! is the single place where a failure becomes the wire-level
//! [`ErrorDescriptor`]; anything server-caused collapses into an opaque
//! `internal_error` there.

use std::io;

use gatehouse_protocol::{ErrorDescriptor, FieldError, ProtocolError};
use thiserror::Error;

use super::handlers::HandlerError;
use crate::permission::Forbidden;
use crate::registry::RegistryError;
use crate::session::SessionError;

/// Errors surfaced during request framing and dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request line could not be decoded.
    #[error(transparent)]
    Malformed(#[from] ProtocolError),

    /// The request line or payload exceeds a transport limit.
    #[error("request exceeds the {limit} byte limit")]
    RequestTooLarge { limit: u64 },

    /// Resolution or registry access failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The module exists but is not reachable over the network.
    #[error("module '{module}' is not remote")]
    NotRemote { module: String },

    /// Ticket validation failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The permission gate refused the request.
    #[error(transparent)]
    Forbidden(#[from] Forbidden),

    /// One or more parameters failed validation.
    #[error("validation failed for {} parameter(s)", fields.len())]
    Validation { fields: Vec<FieldError> },

    /// The handler returned an error.
    #[error("handler failed: {0}")]
    Handler(#[from] HandlerError),

    /// The handler panicked.
    #[error("handler panicked: {message}")]
    HandlerPanicked { message: String },

    /// The handler did not finish before the deadline.
    #[error("handler exceeded {timeout_ms} ms")]
    HandlerTimedOut { timeout_ms: u128 },

    /// The command is registered but no handler is bound to it.
    #[error("no handler bound to {module}.{command}")]
    Unbound { module: String, command: String },

    /// IO error during read or write.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl DispatchError {
    /// Creates a malformed request error with a custom message.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(ProtocolError::malformed(message))
    }

    /// Creates a not-remote error.
    pub fn not_remote(module: impl Into<String>) -> Self {
        Self::NotRemote {
            module: module.into(),
        }
    }

    /// Creates an unbound handler error.
    pub fn unbound(module: impl Into<String>, command: impl Into<String>) -> Self {
        Self::Unbound {
            module: module.into(),
            command: command.into(),
        }
    }

    /// Whether the failure is server-caused.
    ///
    /// Server-caused failures are logged with full detail and reported to
    /// the client as `internal_error`.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self.descriptor(), ErrorDescriptor::InternalError)
    }

    /// Converts the failure into what the client is allowed to see.
    #[must_use]
    pub fn descriptor(&self) -> ErrorDescriptor {
        match self {
            Self::Malformed(error) => ErrorDescriptor::MalformedRequest {
                message: error.message().to_owned(),
            },
            Self::RequestTooLarge { limit } => ErrorDescriptor::RequestTooLarge { limit: *limit },
            Self::Registry(RegistryError::UnknownModule { .. }) | Self::NotRemote { .. } => {
                ErrorDescriptor::UnknownModule
            }
            Self::Registry(RegistryError::UnknownCommand { .. }) => ErrorDescriptor::UnknownCommand,
            Self::Session(error) | Self::Handler(HandlerError::Session(error)) => {
                session_descriptor(error)
            }
            Self::Forbidden(_) => ErrorDescriptor::Forbidden,
            Self::Validation { fields } => ErrorDescriptor::ValidationFailed {
                fields: fields.clone(),
            },
            Self::Handler(HandlerError::Domain { code, message }) => {
                ErrorDescriptor::domain(code.clone(), message.clone())
            }
            Self::Handler(HandlerError::Registry(RegistryError::UnknownModule { .. })) => {
                ErrorDescriptor::UnknownModule
            }
            Self::Handler(HandlerError::Registry(RegistryError::UnknownCommand { .. })) => {
                ErrorDescriptor::UnknownCommand
            }
            Self::Registry(_)
            | Self::Handler(HandlerError::Internal { .. } | HandlerError::Registry(_))
            | Self::HandlerPanicked { .. }
            | Self::HandlerTimedOut { .. }
            | Self::Unbound { .. }
            | Self::Io(_) => ErrorDescriptor::InternalError,
        }
    }
}

fn session_descriptor(error: &SessionError) -> ErrorDescriptor {
    match error {
        SessionError::AuthenticationFailed => ErrorDescriptor::AuthenticationFailed,
        SessionError::MissingTicket => ErrorDescriptor::MissingTicket,
        SessionError::InvalidTicket => ErrorDescriptor::InvalidTicket,
        SessionError::ExpiredTicket => ErrorDescriptor::ExpiredTicket,
        SessionError::UnknownUser { .. }
        | SessionError::UnknownGroup { .. }
        | SessionError::Duplicate { .. }
        | SessionError::Store(_) => ErrorDescriptor::InternalError,
    }
}
