//! Errors raised while binding or serving the daemon socket.

use std::io;

use thiserror::Error;

/// Errors surfaced by the socket listener.
///
/// `endpoint` fields hold the display form of the configured
/// [`SocketEndpoint`](gatehouse_config::SocketEndpoint).
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The TCP host could not be resolved, or resolved to nothing.
    #[error("failed to resolve {endpoint}: {source}")]
    Resolve {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    /// The socket could not be bound.
    #[error("failed to bind {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    /// The bound socket could not be switched to non-blocking accepts.
    #[error("failed to configure {endpoint}: {source}")]
    Configure {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    /// A live daemon already answers on the Unix socket.
    #[error("{endpoint} is already being served")]
    InUse { endpoint: String },
    /// The Unix socket path is occupied by something that is not a socket.
    #[error("{endpoint} exists and is not a socket")]
    NotASocket { endpoint: String },
    /// A leftover Unix socket could not be inspected or removed.
    #[error("failed to reclaim stale socket {endpoint}: {source}")]
    StaleSocket {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    /// Unix sockets are not available on this platform.
    #[error("unix sockets are unsupported for endpoint {endpoint}")]
    UnsupportedUnix { endpoint: String },
    /// The accept thread could not be spawned.
    #[error("failed to spawn the accept thread: {source}")]
    Spawn {
        #[source]
        source: io::Error,
    },
    /// The accept thread panicked.
    #[error("the accept thread panicked")]
    ThreadPanic,
}

impl ListenerError {
    pub(crate) fn resolve_empty(endpoint: String) -> Self {
        Self::Resolve {
            endpoint,
            source: io::Error::new(io::ErrorKind::AddrNotAvailable, "no addresses resolved"),
        }
    }
}
