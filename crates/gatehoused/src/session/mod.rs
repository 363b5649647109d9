//! Session manager: login, ticket validation and expiry.
//!
//! A session moves through `login → active → (activity)* → logout | expiry`.
//! Every state change is a single store transaction, so two concurrent
//! requests presenting the same ticket see either the old or the new state,
//! never a mixture. Expired sessions are purged lazily when presented and
//! eagerly by [`SessionManager::sweep`].

mod accounts;
mod clock;
mod credentials;
mod errors;
mod principal;
mod sweeper;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use gatehouse_config::SessionSettings;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use time::{OffsetDateTime, PrimitiveDateTime};
use tracing::{debug, info, warn};

use crate::store::Store;

pub use self::accounts::Accounts;
pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::errors::SessionError;
pub use self::principal::Principal;
pub(crate) use self::sweeper::SessionSweeper;

use self::credentials::{PasswordDigest, mint_ticket};

pub(crate) const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");

/// A freshly issued or renewed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Bearer ticket.
    pub ticket: String,
    /// User name as stored.
    pub user: String,
    /// Instant after which the ticket is rejected.
    pub expires_at: OffsetDateTime,
}

/// Issues and validates session tickets.
pub struct SessionManager {
    store: Store,
    clock: Arc<dyn Clock>,
    settings: SessionSettings,
}

struct Account {
    id: i64,
    name: String,
    salt: String,
    digest: String,
    active: bool,
}

struct SessionRow {
    user_id: i64,
    user: String,
    expires_at: i64,
    active: bool,
}

impl SessionManager {
    /// Creates a manager over `store`.
    pub fn new(store: Store, clock: Arc<dyn Clock>, settings: SessionSettings) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    /// Active settings.
    #[must_use]
    pub const fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Authenticates `user` and opens a session.
    ///
    /// A wrong password increments the failure counter and deactivates the
    /// account once the counter reaches the configured maximum. Inactive
    /// accounts are refused with the same error whatever the password.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AuthenticationFailed`] for an unknown user, a
    /// wrong password or an inactive account.
    pub fn login(&self, user: &str, password: &str) -> Result<Session, SessionError> {
        let now = self.clock.now();
        self.store.with_connection(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let account = tx
                .query_row(
                    "SELECT id, name, salt, digest, active FROM users WHERE name = ?1",
                    [user],
                    |row| {
                        Ok(Account {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            salt: row.get(2)?,
                            digest: row.get(3)?,
                            active: row.get(4)?,
                        })
                    },
                )
                .optional()?;

            let Some(account) = account else {
                debug!(target: SESSION_TARGET, user, "login for unknown user");
                return Err(SessionError::AuthenticationFailed);
            };
            if !account.active {
                debug!(target: SESSION_TARGET, user = %account.name, "login for inactive account");
                return Err(SessionError::AuthenticationFailed);
            }

            if !PasswordDigest::matches(&account.salt, &account.digest, password) {
                let (failures, active): (u32, bool) = tx.query_row(
                    "UPDATE users
                     SET failed_logins = failed_logins + 1,
                         active = CASE
                             WHEN ?2 > 0 AND failed_logins + 1 >= ?2 THEN 0
                             ELSE active
                         END
                     WHERE id = ?1
                     RETURNING failed_logins, active",
                    params![account.id, self.settings.max_failed_logins],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                tx.commit()?;
                if active {
                    debug!(target: SESSION_TARGET, user = %account.name, failures, "wrong password");
                } else {
                    warn!(target: SESSION_TARGET, user = %account.name, failures, "account locked");
                }
                return Err(SessionError::AuthenticationFailed);
            }

            let ticket = mint_ticket();
            let expires_at = expiry_after(now, self.settings.lifetime);
            tx.execute("UPDATE users SET failed_logins = 0 WHERE id = ?1", [account.id])?;
            tx.execute(
                "INSERT INTO sessions (ticket, user_id, expires_at) VALUES (?1, ?2, ?3)",
                params![ticket, account.id, expires_at.unix_timestamp()],
            )?;
            tx.commit()?;

            info!(target: SESSION_TARGET, user = %account.name, "session opened");
            Ok(Session {
                ticket,
                user: account.name,
                expires_at,
            })
        })
    }

    /// Re-validates a ticket and returns its session.
    ///
    /// Under the sliding policy the expiry moves to `now + lifetime`; under
    /// the fixed policy it is unchanged.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`SessionManager::validate_ticket`].
    pub fn relogin(&self, ticket: &str) -> Result<Session, SessionError> {
        let principal = self.validate_ticket(Some(ticket))?;
        Ok(Session {
            ticket: principal.ticket,
            user: principal.user,
            expires_at: principal.expires_at,
        })
    }

    /// Ends the session holding `ticket`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidTicket`] when no session holds it.
    pub fn logout(&self, ticket: &str) -> Result<(), SessionError> {
        let removed = self.store.with_connection(|conn| {
            conn.execute("DELETE FROM sessions WHERE ticket = ?1", [ticket])
                .map_err(SessionError::from)
        })?;
        if removed == 0 {
            return Err(SessionError::InvalidTicket);
        }
        info!(target: SESSION_TARGET, "session closed");
        Ok(())
    }

    /// Resolves a ticket into a [`Principal`].
    ///
    /// The session lookup, expiry check, account check, sliding refresh and
    /// group load happen in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MissingTicket`], [`SessionError::InvalidTicket`]
    /// or [`SessionError::ExpiredTicket`].
    pub fn validate_ticket(&self, ticket: Option<&str>) -> Result<Principal, SessionError> {
        let ticket = ticket
            .map(str::trim)
            .filter(|ticket| !ticket.is_empty())
            .ok_or(SessionError::MissingTicket)?;
        let now = self.clock.now();

        self.store.with_connection(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let session = tx
                .query_row(
                    "SELECT s.user_id, u.name, s.expires_at, u.active
                     FROM sessions s JOIN users u ON u.id = s.user_id
                     WHERE s.ticket = ?1",
                    [ticket],
                    |row| {
                        Ok(SessionRow {
                            user_id: row.get(0)?,
                            user: row.get(1)?,
                            expires_at: row.get(2)?,
                            active: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            let Some(session) = session else {
                return Err(SessionError::InvalidTicket);
            };

            if now.unix_timestamp() > session.expires_at {
                tx.execute("DELETE FROM sessions WHERE ticket = ?1", [ticket])?;
                tx.commit()?;
                debug!(target: SESSION_TARGET, user = %session.user, "expired session purged");
                return Err(SessionError::ExpiredTicket);
            }
            if !session.active {
                tx.execute("DELETE FROM sessions WHERE ticket = ?1", [ticket])?;
                tx.commit()?;
                debug!(target: SESSION_TARGET, user = %session.user, "session of inactive account dropped");
                return Err(SessionError::InvalidTicket);
            }

            let expires_at = if self.settings.policy.renews_on_activity() {
                let renewed = expiry_after(now, self.settings.lifetime);
                tx.execute(
                    "UPDATE sessions SET expires_at = ?2 WHERE ticket = ?1",
                    params![ticket, renewed.unix_timestamp()],
                )?;
                renewed
            } else {
                from_stored(session.expires_at)
            };

            let groups = load_names(
                &tx,
                "SELECT g.name FROM group_members m
                 JOIN access_groups g ON g.id = m.group_id
                 WHERE m.user_id = ?1",
                session.user_id,
            )?;
            let permissions = load_names(
                &tx,
                "SELECT DISTINCT p.flag FROM group_members m
                 JOIN group_permissions p ON p.group_id = m.group_id
                 WHERE m.user_id = ?1",
                session.user_id,
            )?;
            tx.commit()?;

            Ok(Principal {
                user_id: session.user_id,
                user: session.user,
                ticket: ticket.to_owned(),
                expires_at,
                groups,
                permissions,
            })
        })
    }

    /// Deletes every expired session and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn sweep(&self) -> Result<usize, SessionError> {
        let now = self.clock.now().unix_timestamp();
        let removed = self.store.with_connection(|conn| {
            conn.execute("DELETE FROM sessions WHERE expires_at < ?1", [now])
                .map_err(SessionError::from)
        })?;
        if removed > 0 {
            debug!(target: SESSION_TARGET, removed, "expired sessions swept");
        }
        Ok(removed)
    }

    /// Re-enables a locked account and clears its failure counter.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownUser`] when the user does not exist.
    pub fn reactivate(&self, user: &str) -> Result<(), SessionError> {
        let updated = self.store.with_connection(|conn| {
            conn.execute(
                "UPDATE users SET active = 1, failed_logins = 0 WHERE name = ?1",
                [user],
            )
            .map_err(SessionError::from)
        })?;
        if updated == 0 {
            return Err(SessionError::unknown_user(user));
        }
        info!(target: SESSION_TARGET, user, "account reactivated");
        Ok(())
    }
}

fn load_names(conn: &Connection, sql: &str, user_id: i64) -> Result<BTreeSet<String>, SessionError> {
    let mut statement = conn.prepare(sql)?;
    let names = statement
        .query_map([user_id], |row| row.get::<_, String>(0))?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(names)
}

fn expiry_after(now: OffsetDateTime, lifetime: Duration) -> OffsetDateTime {
    time::Duration::try_from(lifetime)
        .ok()
        .and_then(|span| now.checked_add(span))
        .unwrap_or_else(|| PrimitiveDateTime::MAX.assume_utc())
}

fn from_stored(seconds: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(seconds).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}
