//! The authenticated identity attached to a request.

use std::collections::BTreeSet;

use time::OffsetDateTime;

/// Snapshot of a validated session, taken in one store transaction.
///
/// Later pipeline stages read identity and permissions from this value only,
/// so a concurrent logout or group change cannot split a request's view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Store identifier of the user.
    pub user_id: i64,
    /// User name as stored.
    pub user: String,
    /// Ticket that authenticated the request.
    pub ticket: String,
    /// Session expiry after any sliding refresh.
    pub expires_at: OffsetDateTime,
    /// Names of the user's groups.
    pub groups: BTreeSet<String>,
    /// Union of the permission flags granted by the user's groups.
    pub permissions: BTreeSet<String>,
}

impl Principal {
    /// Whether any of the user's groups grants `flag`.
    #[must_use]
    pub fn has_permission(&self, flag: &str) -> bool {
        self.permissions.contains(flag)
    }
}
