//! Session lifetime policy shared by the daemon and its administrators.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How a session's expiration time evolves after login.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SessionPolicy {
    /// Every renewal or authenticated request pushes the expiry forward by the
    /// configured lifetime.
    #[default]
    Sliding,
    /// The expiry is fixed at login and never extended.
    Fixed,
}

impl SessionPolicy {
    /// Returns `true` when activity should extend the session.
    #[must_use]
    pub const fn renews_on_activity(self) -> bool {
        matches!(self, Self::Sliding)
    }
}

/// Session settings resolved from [`crate::Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Length of the session window.
    pub lifetime: Duration,
    /// Renewal policy.
    pub policy: SessionPolicy,
    /// Failed logins tolerated before the account is deactivated.
    pub max_failed_logins: u32,
}

/// Errors encountered while parsing a [`SessionPolicy`] from text.
pub type SessionPolicyParseError = strum::ParseError;
