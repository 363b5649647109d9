//! Errors raised while decoding wire messages.

use thiserror::Error;

/// A message that does not match the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The line is not a valid envelope.
    #[error("malformed message: {message}")]
    Malformed {
        /// Parser detail.
        message: String,
    },
}

impl ProtocolError {
    /// Creates a malformed-message error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    pub(crate) fn from_json_error(error: serde_json::Error) -> Self {
        Self::malformed(error.to_string())
    }

    /// Parser detail suitable for the client.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Malformed { message } => message,
        }
    }
}
