//! The request pipeline.
//!
//! Stages run in a fixed order and the first failure ends the request:
//! decode, resolve, authenticate, authorise, validate, invoke, publish.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use gatehouse_protocol::{Arguments, Request, Response, validate_all};
use tracing::{debug, error, info, warn};

use super::DISPATCH_TARGET;
use super::context::{Origin, RequestContext};
use super::errors::DispatchError;
use super::events::{DomainEvent, EventSink, TracingEventSink};
use super::handlers::{Binding, CommandHandler, HandlerTable, Reply};
use crate::permission::PermissionGate;
use crate::registry::Registry;
use crate::session::{Principal, SessionManager};

/// Response line plus the raw body that follows it, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Envelope written as one JSON line.
    pub response: Response,
    /// Raw bytes written after the line.
    pub payload: Option<Vec<u8>>,
}

impl Outcome {
    pub(crate) fn failure(error: &DispatchError) -> Self {
        Self {
            response: Response::failure(&error.descriptor()),
            payload: None,
        }
    }

    fn success(reply: Reply) -> Self {
        let response = Response::success(reply.data);
        match reply.payload {
            Some(body) => Self {
                response: response.with_payload_length(byte_len(&body)),
                payload: Some(body),
            },
            None => Self {
                response,
                payload: None,
            },
        }
    }
}

/// Wires the registry, session manager, permission gate and handlers into
/// one request-handling pipeline.
pub struct Dispatcher {
    registry: Arc<Registry>,
    sessions: Arc<SessionManager>,
    handlers: HandlerTable,
    gate: PermissionGate,
    events: Arc<dyn EventSink>,
    handler_timeout: Option<Duration>,
}

impl Dispatcher {
    /// Creates a dispatcher with an open permission gate, a logging event
    /// sink and no handler deadline.
    #[must_use]
    pub fn new(
        registry: Arc<Registry>,
        sessions: Arc<SessionManager>,
        handlers: HandlerTable,
    ) -> Self {
        Self {
            registry,
            sessions,
            handlers,
            gate: PermissionGate::default(),
            events: Arc::new(TracingEventSink),
            handler_timeout: None,
        }
    }

    /// Replaces the permission gate.
    #[must_use]
    pub fn with_permissions(mut self, gate: PermissionGate) -> Self {
        self.gate = gate;
        self
    }

    /// Replaces the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Sets the deadline after which a handler is abandoned.
    #[must_use]
    pub fn with_handler_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// Decodes one request line and dispatches it.
    pub fn handle_line(&self, line: &[u8], payload: Option<Vec<u8>>, origin: Origin) -> Outcome {
        match Request::parse(line) {
            Ok(request) => self.handle(&request, payload, origin),
            Err(error) => {
                let error = DispatchError::from(error);
                debug!(target: DISPATCH_TARGET, %error, "malformed request");
                Outcome::failure(&error)
            }
        }
    }

    /// Dispatches a decoded request.
    ///
    /// Never fails: every error becomes a failure response.
    pub fn handle(&self, request: &Request, payload: Option<Vec<u8>>, origin: Origin) -> Outcome {
        match self.run(request, payload, origin) {
            Ok(outcome) => outcome,
            Err(error) => {
                log_failure(request, &error);
                Outcome::failure(&error)
            }
        }
    }

    fn run(
        &self,
        request: &Request,
        payload: Option<Vec<u8>>,
        origin: Origin,
    ) -> Result<Outcome, DispatchError> {
        request.validate()?;

        let resolved = self.registry.resolve(request.module(), request.command())?;
        let command = resolved.command;
        if origin == Origin::Network && !resolved.remote {
            return Err(DispatchError::not_remote(&command.module));
        }

        let mut context = RequestContext::new(&command.module, &command.name, origin);
        debug!(
            target: DISPATCH_TARGET,
            request_id = context.request_id,
            module = %command.module,
            command = %command.name,
            "dispatching request"
        );

        context.principal = if command.require_ticket {
            Some(self.sessions.validate_ticket(request.ticket())?)
        } else {
            self.opportunistic_principal(request)
        };

        if payload.is_some() && !command.binary {
            return Err(DispatchError::malformed(
                "command does not accept a binary payload",
            ));
        }
        let payload_len = payload.as_deref().map(byte_len);

        self.gate
            .authorize(context.principal.as_ref(), &command, &request.parameters)?;

        let arguments = validate_all(&command, &request.parameters, payload_len)
            .map_err(|fields| DispatchError::Validation { fields })?;

        let binding = self
            .handlers
            .get(&command.module, &command.name)
            .ok_or_else(|| DispatchError::unbound(&command.module, &command.name))?;

        context.payload = payload.map(Arc::from);
        let reply = self.invoke(binding, &context, arguments)?;

        if let Some(name) = &binding.event {
            self.publish(name, &context, &reply);
        }
        Ok(Outcome::success(reply))
    }

    fn opportunistic_principal(&self, request: &Request) -> Option<Principal> {
        let ticket = request.ticket()?;
        match self.sessions.validate_ticket(Some(ticket)) {
            Ok(principal) => Some(principal),
            Err(error) => {
                debug!(target: DISPATCH_TARGET, %error, "ignoring unusable ticket on anonymous command");
                None
            }
        }
    }

    fn invoke(
        &self,
        binding: &Binding,
        context: &RequestContext,
        arguments: Arguments,
    ) -> Result<Reply, DispatchError> {
        let Some(timeout) = self.handler_timeout else {
            return call_guarded(binding.handler.as_ref(), context, &arguments);
        };

        let handler = Arc::clone(&binding.handler);
        let worker_context = context.clone();
        let (sender, receiver) = mpsc::channel();
        thread::Builder::new()
            .name(format!("handler-{}", context.request_id))
            .spawn(move || {
                let outcome = call_guarded(handler.as_ref(), &worker_context, &arguments);
                if sender.send(outcome).is_err() {
                    debug!(
                        target: DISPATCH_TARGET,
                        request_id = worker_context.request_id,
                        "handler finished after its deadline; result discarded"
                    );
                }
            })?;

        match receiver.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                context.cancellation.cancel();
                Err(DispatchError::HandlerTimedOut {
                    timeout_ms: timeout.as_millis(),
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(DispatchError::HandlerPanicked {
                message: String::from("handler thread exited without a result"),
            }),
        }
    }

    fn publish(&self, name: &str, context: &RequestContext, reply: &Reply) {
        let event = DomainEvent {
            name: name.to_owned(),
            request_id: context.request_id,
            module: context.module.clone(),
            command: context.command.clone(),
            user: context.user().map(str::to_owned),
            payload: reply.event_data.clone().unwrap_or_else(|| reply.data.clone()),
        };
        if let Err(error) = self.events.publish(event) {
            warn!(
                target: DISPATCH_TARGET,
                request_id = context.request_id,
                event = name,
                %error,
                "event publication failed"
            );
        }
    }
}

fn call_guarded(
    handler: &dyn CommandHandler,
    context: &RequestContext,
    arguments: &Arguments,
) -> Result<Reply, DispatchError> {
    match panic::catch_unwind(AssertUnwindSafe(|| handler.call(context, arguments))) {
        Ok(result) => result.map_err(DispatchError::from),
        Err(payload) => Err(DispatchError::HandlerPanicked {
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("non-string panic payload"))
}

fn byte_len(bytes: &[u8]) -> u64 {
    u64::try_from(bytes.len()).unwrap_or(u64::MAX)
}

fn log_failure(request: &Request, error: &DispatchError) {
    match error {
        error if error.is_internal() => error!(
            target: DISPATCH_TARGET,
            module = request.module(),
            command = request.command(),
            %error,
            "request failed"
        ),
        DispatchError::Forbidden(reason) => info!(
            target: DISPATCH_TARGET,
            module = request.module(),
            command = request.command(),
            %reason,
            "request forbidden"
        ),
        error => debug!(
            target: DISPATCH_TARGET,
            module = request.module(),
            command = request.command(),
            %error,
            "request rejected"
        ),
    }
}

#[cfg(test)]
mod tests;
