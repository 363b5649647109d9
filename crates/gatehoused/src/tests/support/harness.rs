//! In-memory daemon core shared by unit and behaviour tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use gatehouse_config::{SessionPolicy, SessionSettings};
use gatehouse_protocol::{Arguments, CommandDef, ModuleDef, Request};
use time::macros::datetime;

use crate::dispatch::{
    CommandHandler, Dispatcher, HandlerTable, Origin, Outcome, Reply, RequestContext,
};
use crate::registry::Registry;
use crate::session::{Accounts, ManualClock, SessionError, SessionManager};
use crate::store::Store;

/// Session lifetime used unless a test asks for another.
pub const LIFETIME: Duration = Duration::from_secs(600);

/// Store, registry and session manager wired to a manual clock.
pub struct Harness {
    pub store: Store,
    pub clock: Arc<ManualClock>,
    pub registry: Arc<Registry>,
    pub sessions: Arc<SessionManager>,
    pub accounts: Accounts,
    pub handlers: HandlerTable,
    calls: Arc<AtomicUsize>,
}

impl Harness {
    pub fn new(policy: SessionPolicy, max_failed_logins: u32) -> Self {
        let store = Store::open_in_memory().expect("in-memory store");
        let clock = Arc::new(ManualClock::new(datetime!(2024-03-01 09:00 UTC)));
        let settings = SessionSettings {
            lifetime: LIFETIME,
            policy,
            max_failed_logins,
        };
        let registry = Arc::new(Registry::load(store.clone()).expect("registry"));
        let sessions = Arc::new(SessionManager::new(store.clone(), clock.clone(), settings));
        Self {
            accounts: Accounts::new(store.clone()),
            store,
            clock,
            registry,
            sessions,
            handlers: HandlerTable::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Registers `command` under `module`.
    pub fn register(&self, module: &ModuleDef, command: CommandDef) {
        self.registry
            .register(module, command)
            .expect("register command");
    }

    /// Binds a handler that counts invocations and echoes its arguments.
    pub fn bind_recording(&mut self, module: &str, command: &str) {
        let calls = Arc::clone(&self.calls);
        self.handlers.bind(
            module,
            command,
            Arc::new(move |_: &RequestContext, arguments: &Arguments| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Reply::json(arguments.to_json()))
            }),
        );
    }

    /// Binds an arbitrary handler.
    pub fn bind(&mut self, module: &str, command: &str, handler: Arc<dyn CommandHandler>) {
        self.handlers.bind(module, command, handler);
    }

    /// How often recording handlers ran.
    pub fn recorded_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Creates `user` and returns a fresh ticket for them.
    pub fn ticket_for(&self, user: &str) -> String {
        let password = format!("{user}-password");
        let _ = self.accounts.create_user(user, &password);
        self.sessions
            .login(user, &password)
            .expect("login")
            .ticket
    }

    /// Dispatcher over the current handler table.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.sessions),
            self.handlers.clone(),
        )
    }

    /// Sends `request` as a network client would.
    pub fn send(&self, request: &Request) -> Outcome {
        self.dispatcher().handle(request, None, Origin::Network)
    }

    /// Overwrites a user's failure counter.
    pub fn set_failed_logins(&self, user: &str, count: u32) {
        self.store
            .with_connection(|conn| {
                conn.execute(
                    "UPDATE users SET failed_logins = ?2 WHERE name = ?1",
                    rusqlite::params![user, count],
                )
                .map_err(SessionError::from)
            })
            .expect("update failure counter");
    }

    /// Current failure counter and active flag of `user`.
    pub fn account_state(&self, user: &str) -> (u32, bool) {
        self.store
            .with_connection(|conn| {
                conn.query_row(
                    "SELECT failed_logins, active FROM users WHERE name = ?1",
                    [user],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .map_err(SessionError::from)
            })
            .expect("account state")
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new(SessionPolicy::Sliding, 10)
    }
}
