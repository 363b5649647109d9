//! Typed handler bindings.
//!
//! Each registered command is bound once at startup to an implementation of
//! [`CommandHandler`]. Lookup is by canonical `(module, command)` name and
//! ignores case.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use gatehouse_protocol::Arguments;
use serde_json::Value;
use thiserror::Error;

use super::context::RequestContext;
use crate::registry::RegistryError;
use crate::session::SessionError;

/// Successful handler result.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// Structured result placed in the response `data` field.
    pub data: Value,
    /// Raw body streamed after the response line.
    pub payload: Option<Vec<u8>>,
    /// Replaces `data` as the published event payload when set.
    pub event_data: Option<Value>,
}

impl Reply {
    /// Structured reply.
    #[must_use]
    pub const fn json(data: Value) -> Self {
        Self {
            data,
            payload: None,
            event_data: None,
        }
    }

    /// Structured reply followed by a raw body.
    #[must_use]
    pub const fn binary(data: Value, payload: Vec<u8>) -> Self {
        Self {
            data,
            payload: Some(payload),
            event_data: None,
        }
    }

    /// Publishes `event_data` instead of the reply data.
    #[must_use]
    pub fn with_event_data(mut self, event_data: Value) -> Self {
        self.event_data = Some(event_data);
        self
    }
}

/// Failure raised by a handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Recognised business failure, passed to the client verbatim.
    #[error("{code}: {message}")]
    Domain { code: String, message: String },
    /// Anything else; the client sees an opaque internal error.
    #[error("{message}")]
    Internal { message: String },
    /// Session failure raised by a security handler.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// Registry failure raised by an introspection handler.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl HandlerError {
    /// Creates a domain error.
    pub fn domain(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Domain {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Implementation of one command.
pub trait CommandHandler: Send + Sync {
    /// Runs the command with validated arguments.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] the dispatcher turns into a failure
    /// response.
    fn call(&self, context: &RequestContext, arguments: &Arguments) -> Result<Reply, HandlerError>;
}

impl<F> CommandHandler for F
where
    F: Fn(&RequestContext, &Arguments) -> Result<Reply, HandlerError> + Send + Sync,
{
    fn call(&self, context: &RequestContext, arguments: &Arguments) -> Result<Reply, HandlerError> {
        self(context, arguments)
    }
}

/// A handler plus the event its successes publish.
#[derive(Clone)]
pub struct Binding {
    pub(crate) handler: Arc<dyn CommandHandler>,
    pub(crate) event: Option<String>,
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

/// `(module, command)` to handler mapping.
#[derive(Debug, Clone, Default)]
pub struct HandlerTable {
    bindings: HashMap<(String, String), Binding>,
}

fn key(module: &str, command: &str) -> (String, String) {
    (
        module.trim().to_ascii_lowercase(),
        command.trim().to_ascii_lowercase(),
    )
}

impl HandlerTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handler` to `module.command`, replacing any previous binding.
    pub fn bind(&mut self, module: &str, command: &str, handler: Arc<dyn CommandHandler>) {
        self.bindings
            .insert(key(module, command), Binding { handler, event: None });
    }

    /// Binds `handler` and publishes `event` after each success.
    pub fn bind_with_event(
        &mut self,
        module: &str,
        command: &str,
        handler: Arc<dyn CommandHandler>,
        event: impl Into<String>,
    ) {
        self.bindings.insert(
            key(module, command),
            Binding {
                handler,
                event: Some(event.into()),
            },
        );
    }

    /// Binding for `module.command`.
    #[must_use]
    pub fn get(&self, module: &str, command: &str) -> Option<&Binding> {
        self.bindings.get(&key(module, command))
    }

    /// Number of bound commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
