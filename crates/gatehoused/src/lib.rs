//! The Gatehouse daemon.
//!
//! Gatehouse accepts JSONL requests naming a module and a command, and runs
//! each through a fixed pipeline before any handler sees it:
//!
//! 1. **Resolve** the command in the persisted [`registry`], by name or alias.
//! 2. **Authenticate** the ticket through the [`session`] manager when the
//!    command requires one.
//! 3. **Authorise** the principal against the command's permission flag in
//!    the [`permission`] gate.
//! 4. **Validate** every declared parameter, reporting all failures at once.
//! 5. **Invoke** the bound handler and translate its outcome into a response.
//!
//! A request that fails any stage never reaches its handler. The daemon
//! bootstraps from [`gatehouse_config`], installs the built-in `Security` and
//! `System` modules and serves until a termination signal arrives.

mod bootstrap;
pub mod builtin;
pub mod dispatch;
mod health;
pub mod permission;
mod process;
pub mod registry;
pub mod session;
pub mod store;
mod telemetry;
mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
    bootstrap_with_clock,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{
    LaunchError, RunningDaemon, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_daemon,
    run_daemon_with,
};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::ListenerError;

#[cfg(test)]
mod tests;
