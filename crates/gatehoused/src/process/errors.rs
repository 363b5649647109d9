//! Error surface for launching and supervising the daemon.

use thiserror::Error;

use crate::bootstrap::BootstrapError;
use crate::transport::ListenerError;

use super::shutdown::ShutdownError;

/// Errors surfaced while launching or supervising the daemon process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Bootstrap failed before the daemon could serve.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    /// The socket listener could not be bound, started or joined.
    #[error("socket listener failed: {0}")]
    Listener(#[from] ListenerError),
    /// Waiting for the shutdown signal failed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}
