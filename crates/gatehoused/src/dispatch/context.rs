//! Per-request context threaded through the pipeline.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::session::Principal;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Where a request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Arrived over the socket; only remote modules are reachable.
    Network,
    /// Issued from inside the daemon; local modules are reachable too.
    InProcess,
}

/// Cooperative cancellation flag shared with a running handler.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token in the running state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the handler to stop.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether the caller has given up on the request.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Everything a handler may know about the request it serves.
///
/// Identity lives here and nowhere else; there is no ambient current user.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Daemon-unique identifier for log correlation.
    pub request_id: u64,
    /// Authenticated caller, if a ticket was validated.
    pub principal: Option<Principal>,
    /// Canonical module name.
    pub module: String,
    /// Canonical command name, even when called by alias.
    pub command: String,
    /// Transport the request arrived on.
    pub origin: Origin,
    /// Tripped when the handler exceeds its deadline.
    pub cancellation: CancellationToken,
    /// Raw request body of binary commands.
    pub payload: Option<Arc<[u8]>>,
}

impl RequestContext {
    pub(crate) fn new(module: &str, command: &str, origin: Origin) -> Self {
        Self {
            request_id: NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed),
            principal: None,
            module: module.to_owned(),
            command: command.to_owned(),
            origin,
            cancellation: CancellationToken::new(),
            payload: None,
        }
    }

    /// Name of the authenticated user, if any.
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.principal.as_ref().map(|principal| principal.user.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_distinct() {
        let first = RequestContext::new("System", "Describe", Origin::Network);
        let second = RequestContext::new("System", "Describe", Origin::Network);
        assert_ne!(first.request_id, second.request_id);
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let observer = token.clone();
        token.cancel();
        assert!(observer.is_cancelled());
    }
}
