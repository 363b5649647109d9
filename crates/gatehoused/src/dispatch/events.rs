//! Fire-and-forget publication of domain events.

use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

const EVENTS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::events");

/// Event published after a successful command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainEvent {
    /// Event name from the handler binding.
    pub name: String,
    /// Request that produced the event.
    pub request_id: u64,
    /// Canonical module name.
    pub module: String,
    /// Canonical command name.
    pub command: String,
    /// Authenticated user, if any.
    pub user: Option<String>,
    /// Handler result or its explicit event data.
    pub payload: Value,
}

/// Reasons a sink refused an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EventError {
    /// The sink has no room right now.
    #[error("event sink is full")]
    Full,
    /// The consumer has gone away.
    #[error("event sink is closed")]
    Closed,
}

/// Destination for domain events.
///
/// Publication must not block; failures are logged by the caller and never
/// retried.
pub trait EventSink: Send + Sync {
    /// Hands `event` to the sink.
    ///
    /// # Errors
    ///
    /// Returns [`EventError`] when the event was dropped.
    fn publish(&self, event: DomainEvent) -> Result<(), EventError>;
}

/// Writes events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, event: DomainEvent) -> Result<(), EventError> {
        info!(
            target: EVENTS_TARGET,
            event = %event.name,
            request_id = event.request_id,
            module = %event.module,
            command = %event.command,
            user = event.user.as_deref(),
            payload = %event.payload,
            "domain event"
        );
        Ok(())
    }
}

/// Bounded queue feeding an external consumer.
#[derive(Debug)]
pub struct ChannelEventSink {
    sender: SyncSender<DomainEvent>,
}

impl ChannelEventSink {
    /// Creates a sink holding at most `capacity` undelivered events.
    #[must_use]
    pub fn bounded(capacity: usize) -> (Self, Receiver<DomainEvent>) {
        let (sender, receiver) = sync_channel(capacity);
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn publish(&self, event: DomainEvent) -> Result<(), EventError> {
        self.sender.try_send(event).map_err(|error| match error {
            TrySendError::Full(_) => EventError::Full,
            TrySendError::Disconnected(_) => EventError::Closed,
        })
    }
}
