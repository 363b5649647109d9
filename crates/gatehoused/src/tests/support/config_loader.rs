//! Configuration loaders for scenarios covering success and failure paths.

use std::ffi::OsString;
use std::sync::Arc;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;

use gatehouse_config::{Config, SocketEndpoint};

use crate::bootstrap::ConfigLoader;

/// Loader that keeps the database and any Unix socket under a temporary
/// directory.
pub struct TestConfigLoader {
    dir: TempDir,
    socket: Option<SocketEndpoint>,
}

impl TestConfigLoader {
    /// Listens on a Unix socket inside the temporary directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temporary directory"),
            socket: None,
        }
    }

    /// Listens on an ephemeral loopback TCP port instead.
    #[must_use]
    pub fn tcp() -> Self {
        Self {
            socket: Some(SocketEndpoint::tcp("127.0.0.1", 0)),
            ..Self::new()
        }
    }

    fn path(&self, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.dir.path().join(name))
            .expect("temporary path was not valid UTF-8")
    }
}

impl Default for TestConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let socket = self
            .socket
            .clone()
            .unwrap_or_else(|| SocketEndpoint::unix(self.path("gatehoused.sock")));
        Ok(Config {
            daemon_socket: socket,
            database_path: self.path("gatehouse.db"),
            ..Config::default()
        })
    }
}

/// Loader that fails by passing an invalid socket flag.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_iter([
            OsString::from("gatehoused"),
            OsString::from("--daemon-socket"),
            OsString::from("invalid://socket"),
        ])
    }
}
