//! Ticket issuance.

use std::sync::Arc;

use gatehouse_protocol::{Arguments, CommandDef, ParamType, ParameterDef};
use serde_json::{Value, json};
use time::format_description::well_known::Rfc3339;

use crate::dispatch::{CommandHandler, HandlerError, HandlerTable, Reply, RequestContext};
use crate::session::{Session, SessionError, SessionManager};

/// Name of the security module.
pub const SECURITY_MODULE: &str = "Security";
/// Event published after each successful login.
pub const LOGIN_EVENT: &str = "security.login";

pub(super) fn declarations() -> Vec<CommandDef> {
    vec![
        CommandDef::new(SECURITY_MODULE, "Login")
            .anonymous()
            .param(ParameterDef::required("User", ParamType::String))
            .param(ParameterDef::required("Password", ParamType::String)),
        CommandDef::new(SECURITY_MODULE, "ReLogin"),
        CommandDef::new(SECURITY_MODULE, "Logout"),
    ]
}

pub(super) fn bind(sessions: &Arc<SessionManager>, handlers: &mut HandlerTable) {
    handlers.bind_with_event(
        SECURITY_MODULE,
        "Login",
        Arc::new(Login(Arc::clone(sessions))),
        LOGIN_EVENT,
    );
    handlers.bind(
        SECURITY_MODULE,
        "ReLogin",
        Arc::new(ReLogin(Arc::clone(sessions))),
    );
    handlers.bind(
        SECURITY_MODULE,
        "Logout",
        Arc::new(Logout(Arc::clone(sessions))),
    );
}

struct Login(Arc<SessionManager>);

impl CommandHandler for Login {
    fn call(&self, _: &RequestContext, arguments: &Arguments) -> Result<Reply, HandlerError> {
        let user = arguments.str("User").unwrap_or_default();
        let password = arguments.str("Password").unwrap_or_default();
        let session = self.0.login(user, password)?;
        let event = json!({ "user": session.user });
        Ok(Reply::json(session_data(&session)?).with_event_data(event))
    }
}

struct ReLogin(Arc<SessionManager>);

impl CommandHandler for ReLogin {
    fn call(&self, context: &RequestContext, _: &Arguments) -> Result<Reply, HandlerError> {
        let session = self.0.relogin(presented_ticket(context)?)?;
        Ok(Reply::json(session_data(&session)?))
    }
}

struct Logout(Arc<SessionManager>);

impl CommandHandler for Logout {
    fn call(&self, context: &RequestContext, _: &Arguments) -> Result<Reply, HandlerError> {
        self.0.logout(presented_ticket(context)?)?;
        Ok(Reply::json(json!({})))
    }
}

fn presented_ticket(context: &RequestContext) -> Result<&str, SessionError> {
    context
        .principal
        .as_ref()
        .map(|principal| principal.ticket.as_str())
        .ok_or(SessionError::MissingTicket)
}

fn session_data(session: &Session) -> Result<Value, HandlerError> {
    let expires_at = session
        .expires_at
        .format(&Rfc3339)
        .map_err(|error| HandlerError::internal(format!("cannot format expiry: {error}")))?;
    Ok(json!({
        "ticket": session.ticket,
        "expires_at": expires_at,
    }))
}
