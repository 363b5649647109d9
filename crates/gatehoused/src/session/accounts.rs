//! User and access-group administration.

use rusqlite::{OptionalExtension, TransactionBehavior, params};
use tracing::info;

use super::credentials::PasswordDigest;
use super::{SESSION_TARGET, SessionError};
use crate::store::Store;

/// Provisions users, groups and group permissions.
#[derive(Debug, Clone)]
pub struct Accounts {
    store: Store,
}

impl Accounts {
    /// Creates an administrator over `store`.
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Creates an active user with `password`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Duplicate`] when the name is taken.
    pub fn create_user(&self, name: &str, password: &str) -> Result<i64, SessionError> {
        let record = PasswordDigest::create(password);
        let id = self.store.with_connection(|conn| {
            conn.query_row(
                "INSERT INTO users (name, salt, digest) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO NOTHING
                 RETURNING id",
                params![name, record.salt, record.digest],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(SessionError::from)
        })?;
        let id = id.ok_or_else(|| SessionError::Duplicate {
            name: name.to_owned(),
        })?;
        info!(target: SESSION_TARGET, user = name, "user created");
        Ok(id)
    }

    /// Replaces a user's password and clears their failure counter.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownUser`] when the user does not exist.
    pub fn set_password(&self, name: &str, password: &str) -> Result<(), SessionError> {
        let record = PasswordDigest::create(password);
        let updated = self.store.with_connection(|conn| {
            conn.execute(
                "UPDATE users SET salt = ?2, digest = ?3, failed_logins = 0 WHERE name = ?1",
                params![name, record.salt, record.digest],
            )
            .map_err(SessionError::from)
        })?;
        if updated == 0 {
            return Err(SessionError::unknown_user(name));
        }
        Ok(())
    }

    /// Creates a group granting `flags`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Duplicate`] when the name is taken.
    pub fn create_group(&self, name: &str, flags: &[&str]) -> Result<i64, SessionError> {
        let id = self.store.with_connection(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let id = tx
                .query_row(
                    "INSERT INTO access_groups (name) VALUES (?1)
                     ON CONFLICT(name) DO NOTHING
                     RETURNING id",
                    [name],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?
                .ok_or_else(|| SessionError::Duplicate {
                    name: name.to_owned(),
                })?;
            for flag in flags {
                tx.execute(
                    "INSERT OR IGNORE INTO group_permissions (group_id, flag) VALUES (?1, ?2)",
                    params![id, flag],
                )?;
            }
            tx.commit()?;
            Ok::<_, SessionError>(id)
        })?;
        info!(target: SESSION_TARGET, group = name, flags = flags.len(), "group created");
        Ok(id)
    }

    /// Adds `flag` to an existing group.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownGroup`] when the group does not exist.
    pub fn grant(&self, group: &str, flag: &str) -> Result<(), SessionError> {
        self.store.with_connection(|conn| {
            let group_id = group_id(conn, group)?;
            conn.execute(
                "INSERT OR IGNORE INTO group_permissions (group_id, flag) VALUES (?1, ?2)",
                params![group_id, flag],
            )?;
            Ok(())
        })
    }

    /// Removes `flag` from a group.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownGroup`] when the group does not exist.
    pub fn revoke(&self, group: &str, flag: &str) -> Result<(), SessionError> {
        self.store.with_connection(|conn| {
            let group_id = group_id(conn, group)?;
            conn.execute(
                "DELETE FROM group_permissions WHERE group_id = ?1 AND flag = ?2",
                params![group_id, flag],
            )?;
            Ok(())
        })
    }

    /// Makes `user` a member of `group`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownUser`] or [`SessionError::UnknownGroup`].
    pub fn add_member(&self, user: &str, group: &str) -> Result<(), SessionError> {
        self.store.with_connection(|conn| {
            let user_id = conn
                .query_row("SELECT id FROM users WHERE name = ?1", [user], |row| {
                    row.get::<_, i64>(0)
                })
                .optional()?
                .ok_or_else(|| SessionError::unknown_user(user))?;
            let group_id = group_id(conn, group)?;
            conn.execute(
                "INSERT OR IGNORE INTO group_members (user_id, group_id) VALUES (?1, ?2)",
                params![user_id, group_id],
            )?;
            Ok(())
        })
    }
}

fn group_id(conn: &rusqlite::Connection, group: &str) -> Result<i64, SessionError> {
    conn.query_row("SELECT id FROM access_groups WHERE name = ?1", [group], |row| {
        row.get::<_, i64>(0)
    })
    .optional()?
    .ok_or_else(|| SessionError::unknown_group(group))
}
