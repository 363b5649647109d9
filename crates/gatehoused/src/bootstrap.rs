//! Daemon bootstrap orchestration.

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;

use gatehouse_config::{Config, SocketPreparationError};

use crate::builtin;
use crate::dispatch::{CommandHandler, Dispatcher, EventSink, HandlerTable, TracingEventSink};
use crate::health::HealthReporter;
use crate::permission::PermissionGate;
use crate::registry::{Registry, RegistryError};
use crate::session::{Accounts, Clock, SessionManager, SystemClock};
use crate::store::{Store, StoreError};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Source of the daemon configuration.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    ///
    /// # Errors
    ///
    /// Returns the loader's error when no configuration can be produced.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that layers defaults, file, environment and flags.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader that hands out a configuration resolved elsewhere.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps an already resolved configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Socket preparation failed.
    #[error("failed to prepare daemon socket: {source}")]
    Socket {
        /// Filesystem error reported while preparing the socket directory.
        #[source]
        source: SocketPreparationError,
    },
    /// The database could not be opened.
    #[error("failed to open database: {source}")]
    Store {
        #[source]
        source: StoreError,
    },
    /// The registry could not be loaded or the built-ins installed.
    #[error("failed to prepare command registry: {source}")]
    Registry {
        #[source]
        source: RegistryError,
    },
}

/// A bootstrapped daemon, ready to have handlers bound and to serve.
pub struct Daemon {
    config: Config,
    telemetry: TelemetryHandle,
    registry: Arc<Registry>,
    sessions: Arc<SessionManager>,
    accounts: Accounts,
    handlers: HandlerTable,
    permissions: PermissionGate,
    events: Arc<dyn EventSink>,
    reporter: Arc<dyn HealthReporter>,
}

impl Daemon {
    /// Resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Telemetry handle, primarily useful for testing.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Command registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Session manager.
    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// User and group administration.
    #[must_use]
    pub const fn accounts(&self) -> &Accounts {
        &self.accounts
    }

    /// Health reporter shared with the serving loop.
    #[must_use]
    pub fn reporter(&self) -> &Arc<dyn HealthReporter> {
        &self.reporter
    }

    /// Binds `handler` to `module.command`.
    pub fn bind(&mut self, module: &str, command: &str, handler: Arc<dyn CommandHandler>) {
        self.handlers.bind(module, command, handler);
    }

    /// Binds `handler` and publishes `event` after each success.
    pub fn bind_with_event(
        &mut self,
        module: &str,
        command: &str,
        handler: Arc<dyn CommandHandler>,
        event: impl Into<String>,
    ) {
        self.handlers.bind_with_event(module, command, handler, event);
    }

    /// Replaces the permission gate.
    pub fn set_permissions(&mut self, permissions: PermissionGate) {
        self.permissions = permissions;
    }

    /// Replaces the domain event sink.
    pub fn set_event_sink(&mut self, events: Arc<dyn EventSink>) {
        self.events = events;
    }

    /// Builds a dispatcher over the current bindings.
    #[must_use]
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.sessions),
            self.handlers.clone(),
        )
        .with_permissions(self.permissions.clone())
        .with_event_sink(Arc::clone(&self.events))
        .with_handler_timeout(self.config.handler_timeout())
    }
}

/// Bootstraps the daemon against the wall clock.
///
/// # Errors
///
/// Returns [`BootstrapError`] for the first stage that fails; the reporter
/// sees the same error.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
) -> Result<Daemon, BootstrapError> {
    bootstrap_with_clock(loader, reporter, Arc::new(SystemClock))
}

/// Bootstraps the daemon with an injected clock.
///
/// # Errors
///
/// Returns [`BootstrapError`] for the first stage that fails.
pub fn bootstrap_with_clock(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    clock: Arc<dyn Clock>,
) -> Result<Daemon, BootstrapError> {
    reporter.bootstrap_starting();
    match assemble(loader, &reporter, clock) {
        Ok(daemon) => {
            reporter.bootstrap_succeeded(&daemon.config);
            Ok(daemon)
        }
        Err(error) => {
            reporter.bootstrap_failed(&error);
            Err(error)
        }
    }
}

fn assemble(
    loader: &dyn ConfigLoader,
    reporter: &Arc<dyn HealthReporter>,
    clock: Arc<dyn Clock>,
) -> Result<Daemon, BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    let telemetry =
        telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;
    config
        .daemon_socket()
        .prepare_filesystem()
        .map_err(|source| BootstrapError::Socket { source })?;

    let store =
        Store::open(config.database_path()).map_err(|source| BootstrapError::Store { source })?;
    let registry = Arc::new(
        Registry::load(store.clone()).map_err(|source| BootstrapError::Registry { source })?,
    );
    let sessions = Arc::new(SessionManager::new(
        store.clone(),
        clock,
        config.session_settings(),
    ));
    let mut handlers = HandlerTable::new();
    builtin::install(&registry, &sessions, &mut handlers)
        .map_err(|source| BootstrapError::Registry { source })?;

    Ok(Daemon {
        telemetry,
        registry,
        sessions,
        accounts: Accounts::new(store),
        handlers,
        permissions: PermissionGate::default(),
        events: Arc::new(TracingEventSink),
        reporter: Arc::clone(reporter),
        config,
    })
}
