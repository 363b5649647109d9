//! Error types for authentication and ticket validation.

use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by the session manager and account administration.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Unknown user, wrong password or inactive account.
    #[error("authentication failed")]
    AuthenticationFailed,
    /// The command needs a ticket and none was supplied.
    #[error("session ticket missing")]
    MissingTicket,
    /// No session holds the ticket.
    #[error("session ticket invalid")]
    InvalidTicket,
    /// The session behind the ticket has expired.
    #[error("session ticket expired")]
    ExpiredTicket,
    /// Administrative operation named a user that does not exist.
    #[error("unknown user: {user}")]
    UnknownUser { user: String },
    /// Administrative operation named a group that does not exist.
    #[error("unknown group: {group}")]
    UnknownGroup { group: String },
    /// A user or group with that name already exists.
    #[error("'{name}' already exists")]
    Duplicate { name: String },
    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Creates an unknown user error.
    pub fn unknown_user(user: impl Into<String>) -> Self {
        Self::UnknownUser { user: user.into() }
    }

    /// Creates an unknown group error.
    pub fn unknown_group(group: impl Into<String>) -> Self {
        Self::UnknownGroup {
            group: group.into(),
        }
    }
}

impl From<rusqlite::Error> for SessionError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Store(StoreError::from(error))
    }
}
