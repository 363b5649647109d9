//! Shared configuration for the Gatehouse daemon and client.
//!
//! Values are layered by [`ortho_config`]: built-in defaults, then an optional
//! `gatehouse.toml`, then `GATEHOUSE_*` environment variables, and finally
//! command-line flags. Both binaries load the same [`Config`] so they agree on
//! the socket endpoint and on the transport size limits.

mod defaults;
mod logging;
mod session;
mod socket;

use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_HANDLER_TIMEOUT_MS, DEFAULT_LOG_FILTER, DEFAULT_MAX_FAILED_LOGINS,
    DEFAULT_MAX_PAYLOAD_BYTES, DEFAULT_MAX_REQUEST_BYTES, DEFAULT_SESSION_LIFETIME_SECS,
    DEFAULT_SESSION_SWEEP_INTERVAL_SECS, DEFAULT_TCP_PORT, default_database_path,
    default_log_filter, default_log_format, default_session_policy, default_socket_endpoint,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use session::{SessionPolicy, SessionPolicyParseError, SessionSettings};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved configuration for the daemon and the client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "GATEHOUSE")]
pub struct Config {
    /// Socket on which the daemon accepts requests.
    #[ortho_config(default = defaults::default_socket_endpoint())]
    #[serde(default = "defaults::default_socket_endpoint")]
    pub daemon_socket: SocketEndpoint,
    /// SQLite database holding the registry, users and sessions.
    #[ortho_config(default = defaults::default_database_path())]
    #[serde(default = "defaults::default_database_path")]
    pub database_path: Utf8PathBuf,
    /// `tracing` filter expression.
    #[ortho_config(default = defaults::default_log_filter())]
    #[serde(default = "defaults::default_log_filter")]
    pub log_filter: String,
    /// Log output format.
    #[ortho_config(default = defaults::default_log_format())]
    #[serde(default = "defaults::default_log_format")]
    pub log_format: LogFormat,
    /// Failed logins tolerated before the account is deactivated.
    #[ortho_config(default = defaults::DEFAULT_MAX_FAILED_LOGINS)]
    #[serde(default = "defaults::default_max_failed_logins")]
    pub max_failed_logins: u32,
    /// Session window in seconds.
    #[ortho_config(default = defaults::DEFAULT_SESSION_LIFETIME_SECS)]
    #[serde(default = "defaults::default_session_lifetime_secs")]
    pub session_lifetime_secs: u64,
    /// Whether activity extends the session window.
    #[ortho_config(default = defaults::default_session_policy())]
    #[serde(default = "defaults::default_session_policy")]
    pub session_policy: SessionPolicy,
    /// Seconds between sweeps of expired sessions.
    #[ortho_config(default = defaults::DEFAULT_SESSION_SWEEP_INTERVAL_SECS)]
    #[serde(default = "defaults::default_session_sweep_interval_secs")]
    pub session_sweep_interval_secs: u64,
    /// Handler deadline in milliseconds; zero disables it.
    #[ortho_config(default = defaults::DEFAULT_HANDLER_TIMEOUT_MS)]
    #[serde(default = "defaults::default_handler_timeout_ms")]
    pub handler_timeout_ms: u64,
    /// Maximum size of a request line.
    #[ortho_config(default = defaults::DEFAULT_MAX_REQUEST_BYTES)]
    #[serde(default = "defaults::default_max_request_bytes")]
    pub max_request_bytes: u64,
    /// Maximum size of a binary payload.
    #[ortho_config(default = defaults::DEFAULT_MAX_PAYLOAD_BYTES)]
    #[serde(default = "defaults::default_max_payload_bytes")]
    pub max_payload_bytes: u64,
    /// Whether binary payloads are exempt from `max_request_bytes`.
    #[ortho_config(default = true)]
    #[serde(default = "defaults::default_binary_bypass")]
    pub binary_bypasses_request_limit: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon_socket: defaults::default_socket_endpoint(),
            database_path: defaults::default_database_path(),
            log_filter: defaults::default_log_filter(),
            log_format: defaults::default_log_format(),
            max_failed_logins: defaults::default_max_failed_logins(),
            session_lifetime_secs: defaults::default_session_lifetime_secs(),
            session_policy: defaults::default_session_policy(),
            session_sweep_interval_secs: defaults::default_session_sweep_interval_secs(),
            handler_timeout_ms: defaults::default_handler_timeout_ms(),
            max_request_bytes: defaults::default_max_request_bytes(),
            max_payload_bytes: defaults::default_max_payload_bytes(),
            binary_bypasses_request_limit: defaults::default_binary_bypass(),
        }
    }
}

impl Config {
    /// Socket on which the daemon listens.
    #[must_use]
    pub fn daemon_socket(&self) -> &SocketEndpoint {
        &self.daemon_socket
    }

    /// Database location.
    #[must_use]
    pub fn database_path(&self) -> &Utf8PathBuf {
        &self.database_path
    }

    /// `tracing` filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Session settings consumed by the session manager.
    #[must_use]
    pub const fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            lifetime: Duration::from_secs(self.session_lifetime_secs),
            policy: self.session_policy,
            max_failed_logins: self.max_failed_logins,
        }
    }

    /// Interval between expired-session sweeps.
    #[must_use]
    pub const fn session_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session_sweep_interval_secs)
    }

    /// Handler deadline, or `None` when disabled.
    #[must_use]
    pub const fn handler_timeout(&self) -> Option<Duration> {
        match self.handler_timeout_ms {
            0 => None,
            millis => Some(Duration::from_millis(millis)),
        }
    }

    /// Transport limits shared by the daemon and the client.
    #[must_use]
    pub const fn transport_limits(&self) -> TransportLimits {
        TransportLimits {
            max_request_bytes: self.max_request_bytes,
            max_payload_bytes: self.max_payload_bytes,
            binary_bypasses_request_limit: self.binary_bypasses_request_limit,
        }
    }
}

/// Size limits applied by the socket transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportLimits {
    /// Maximum size of a request line.
    pub max_request_bytes: u64,
    /// Maximum size of a binary payload.
    pub max_payload_bytes: u64,
    /// Whether the payload is exempt from `max_request_bytes`.
    pub binary_bypasses_request_limit: bool,
}

impl TransportLimits {
    /// Checks a request line and its announced payload against the limits.
    ///
    /// Returns the violated limit on failure.
    pub const fn check(&self, line_bytes: u64, payload_bytes: u64) -> Result<(), u64> {
        if line_bytes > self.max_request_bytes {
            return Err(self.max_request_bytes);
        }
        if payload_bytes > self.max_payload_bytes {
            return Err(self.max_payload_bytes);
        }
        if !self.binary_bypasses_request_limit
            && line_bytes.saturating_add(payload_bytes) > self.max_request_bytes
        {
            return Err(self.max_request_bytes);
        }
        Ok(())
    }
}

impl Default for TransportLimits {
    fn default() -> Self {
        Config::default().transport_limits()
    }
}
