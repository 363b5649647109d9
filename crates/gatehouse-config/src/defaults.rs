//! Default values shared by the daemon and the client.

use std::env;

use camino::Utf8PathBuf;

#[cfg(unix)]
use dirs::runtime_dir;
#[cfg(unix)]
use libc::geteuid;

use crate::logging::LogFormat;
use crate::session::SessionPolicy;
use crate::socket::SocketEndpoint;

/// TCP port used when Unix domain sockets are not available.
pub const DEFAULT_TCP_PORT: u16 = 9780;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Failed logins tolerated before an account is locked.
pub const DEFAULT_MAX_FAILED_LOGINS: u32 = 10;

/// Session window in seconds.
pub const DEFAULT_SESSION_LIFETIME_SECS: u64 = 30 * 60;

/// Interval between expired-session sweeps in seconds.
pub const DEFAULT_SESSION_SWEEP_INTERVAL_SECS: u64 = 60;

/// Handler deadline in milliseconds. Zero disables the deadline.
pub const DEFAULT_HANDLER_TIMEOUT_MS: u64 = 30_000;

/// Maximum size of the structured request line.
pub const DEFAULT_MAX_REQUEST_BYTES: u64 = 1024 * 1024;

/// Maximum size of a binary payload.
pub const DEFAULT_MAX_PAYLOAD_BYTES: u64 = 64 * 1024 * 1024;

/// Default log filter expression.
#[must_use]
pub fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default session renewal policy.
#[must_use]
pub fn default_session_policy() -> SessionPolicy {
    SessionPolicy::Sliding
}

#[must_use]
pub(crate) const fn default_max_failed_logins() -> u32 {
    DEFAULT_MAX_FAILED_LOGINS
}

#[must_use]
pub(crate) const fn default_session_lifetime_secs() -> u64 {
    DEFAULT_SESSION_LIFETIME_SECS
}

#[must_use]
pub(crate) const fn default_session_sweep_interval_secs() -> u64 {
    DEFAULT_SESSION_SWEEP_INTERVAL_SECS
}

#[must_use]
pub(crate) const fn default_handler_timeout_ms() -> u64 {
    DEFAULT_HANDLER_TIMEOUT_MS
}

#[must_use]
pub(crate) const fn default_max_request_bytes() -> u64 {
    DEFAULT_MAX_REQUEST_BYTES
}

#[must_use]
pub(crate) const fn default_max_payload_bytes() -> u64 {
    DEFAULT_MAX_PAYLOAD_BYTES
}

#[must_use]
pub(crate) const fn default_binary_bypass() -> bool {
    true
}

/// Computes the default socket endpoint for the daemon.
#[must_use]
pub fn default_socket_endpoint() -> SocketEndpoint {
    #[cfg(unix)]
    {
        SocketEndpoint::unix(runtime_base().join("gatehoused.sock"))
    }

    #[cfg(not(unix))]
    {
        SocketEndpoint::tcp("127.0.0.1", DEFAULT_TCP_PORT)
    }
}

/// Computes the default location of the SQLite database.
#[must_use]
pub fn default_database_path() -> Utf8PathBuf {
    runtime_base().join("gatehouse.db")
}

#[cfg(unix)]
fn runtime_base() -> Utf8PathBuf {
    if let Some(dir) = runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok()) {
        return dir.join("gatehouse");
    }
    let uid = unsafe { geteuid() };
    temp_base().join("gatehouse").join(format!("uid-{uid}"))
}

#[cfg(not(unix))]
fn runtime_base() -> Utf8PathBuf {
    temp_base().join("gatehouse")
}

fn temp_base() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}
