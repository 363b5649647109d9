//! Shared helpers for unit and behaviour tests.

mod config_loader;
mod harness;
mod reporter;

pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use harness::{Harness, LIFETIME};
pub use reporter::{HealthEvent, RecordingHealthReporter};
