//! Durable state shared by the registry and the session manager.
//!
//! One SQLite connection is shared behind a mutex, so every operation is
//! serialised. Multi-statement operations open an immediate transaction to
//! hold the write lock from their first read.

use std::fs;
use std::io;
use std::sync::{Arc, Mutex};

use camino::Utf8Path;
use rusqlite::Connection;
use thiserror::Error;

const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS modules (
    name TEXT PRIMARY KEY COLLATE NOCASE,
    remote INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS commands (
    module TEXT NOT NULL COLLATE NOCASE REFERENCES modules(name) ON DELETE CASCADE,
    name TEXT NOT NULL COLLATE NOCASE,
    alias TEXT UNIQUE COLLATE NOCASE,
    require_ticket INTEGER NOT NULL,
    binary_payload INTEGER NOT NULL,
    PRIMARY KEY (module, name)
);

CREATE TABLE IF NOT EXISTS parameters (
    module TEXT NOT NULL COLLATE NOCASE,
    command TEXT NOT NULL COLLATE NOCASE,
    position INTEGER NOT NULL,
    name TEXT NOT NULL,
    type TEXT NOT NULL,
    optional INTEGER NOT NULL,
    nullable INTEGER NOT NULL,
    PRIMARY KEY (module, command, position),
    FOREIGN KEY (module, command) REFERENCES commands(module, name) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
    salt TEXT NOT NULL,
    digest TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    failed_logins INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS access_groups (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE
);

CREATE TABLE IF NOT EXISTS group_permissions (
    group_id INTEGER NOT NULL REFERENCES access_groups(id) ON DELETE CASCADE,
    flag TEXT NOT NULL,
    PRIMARY KEY (group_id, flag)
);

CREATE TABLE IF NOT EXISTS group_members (
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    group_id INTEGER NOT NULL REFERENCES access_groups(id) ON DELETE CASCADE,
    PRIMARY KEY (user_id, group_id)
);

CREATE TABLE IF NOT EXISTS sessions (
    ticket TEXT PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    expires_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS sessions_by_expiry ON sessions(expires_at);
";

/// Errors surfaced by the durable store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database directory could not be created.
    #[error("failed to create database directory {path}: {source}")]
    Directory {
        /// Directory that could not be created.
        path: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// SQLite reported an error.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A thread panicked while holding the connection.
    #[error("database connection lock poisoned")]
    Poisoned,
}

/// Handle to the shared SQLite connection.
#[derive(Debug, Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Opens (or creates) the database at `path` and applies the schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the directory cannot be created or SQLite
    /// fails to open the file.
    pub fn open(path: &Utf8Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Directory {
                path: parent.to_string(),
                source,
            })?;
        }
        Self::initialise(Connection::open(path.as_std_path())?)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the schema cannot be applied.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::initialise(Connection::open_in_memory()?)
    }

    fn initialise(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `operation` with exclusive access to the connection.
    ///
    /// # Errors
    ///
    /// Propagates the operation's error, or [`StoreError::Poisoned`] when a
    /// previous holder panicked.
    pub fn with_connection<T, E>(
        &self,
        operation: impl FnOnce(&mut Connection) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut conn = self.conn.lock().map_err(|_| E::from(StoreError::Poisoned))?;
        operation(&mut conn)
    }
}
