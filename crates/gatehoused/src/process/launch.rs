//! Serves a bootstrapped daemon until shutdown.

use std::sync::Arc;

use gatehouse_config::SocketEndpoint;
use tracing::{info, warn};

use crate::bootstrap::{ConfigLoader, Daemon, SystemConfigLoader, bootstrap_with};
use crate::dispatch::DispatchConnectionHandler;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::session::SessionSweeper;
use crate::transport::{ListenerHandle, SocketListener};

use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};
use super::{PROCESS_TARGET, SHUTDOWN_GRACE};

/// Runs the daemon with the production collaborators until a termination
/// signal arrives.
///
/// # Errors
///
/// Returns [`LaunchError`] if bootstrap, listening or signal handling fails.
pub fn run_daemon() -> Result<(), LaunchError> {
    let reporter: Arc<dyn HealthReporter> = Arc::new(StructuredHealthReporter::new());
    run_daemon_with(&SystemConfigLoader, reporter, &SystemShutdownSignal)
}

/// Runs the daemon with injected collaborators.
///
/// # Errors
///
/// Returns [`LaunchError`] if bootstrap, listening or signal handling fails.
pub fn run_daemon_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    shutdown: &dyn ShutdownSignal,
) -> Result<(), LaunchError> {
    let daemon = bootstrap_with(loader, reporter)?;
    let running = RunningDaemon::start(daemon)?;
    let waited = shutdown.wait();
    running.reporter.shutdown_requested();
    running.stop()?;
    waited?;
    Ok(())
}

/// A daemon accepting connections.
pub struct RunningDaemon {
    endpoint: SocketEndpoint,
    listener: ListenerHandle,
    sweeper: SessionSweeper,
    reporter: Arc<dyn HealthReporter>,
}

impl RunningDaemon {
    /// Binds the configured socket and starts the listener and the session
    /// sweeper.
    ///
    /// Handlers bound to `daemon` after this call are not seen.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Listener`] if the socket cannot be bound.
    pub fn start(daemon: Daemon) -> Result<Self, LaunchError> {
        let config = daemon.config();
        let listener = SocketListener::bind(config.daemon_socket())?;
        let endpoint = listener.endpoint();
        let handler = Arc::new(DispatchConnectionHandler::new(
            Arc::new(daemon.dispatcher()),
            config.transport_limits(),
        ));
        let listener = listener.start(handler)?;
        let reporter = Arc::clone(daemon.reporter());
        reporter.listener_ready(&endpoint);

        let sweeper = SessionSweeper::start(
            Arc::clone(daemon.sessions()),
            config.session_sweep_interval(),
            Arc::clone(&reporter),
        );
        Ok(Self {
            endpoint,
            listener,
            sweeper,
            reporter,
        })
    }

    /// Endpoint clients should connect to.
    #[must_use]
    pub fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }

    /// Stops accepting, waits for in-flight requests and stops the sweeper.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Listener`] if the accept thread panicked.
    pub fn stop(self) -> Result<(), LaunchError> {
        let Self {
            listener, sweeper, ..
        } = self;
        listener.shutdown();
        info!(
            target: PROCESS_TARGET,
            in_flight = listener.active_connections(),
            "draining connections"
        );
        let abandoned = listener.drain(SHUTDOWN_GRACE)?;
        if abandoned > 0 {
            warn!(
                target: PROCESS_TARGET,
                abandoned,
                "shutdown grace elapsed with requests still running"
            );
        }
        sweeper.stop();
        info!(target: PROCESS_TARGET, "shutdown sequence completed");
        Ok(())
    }
}
