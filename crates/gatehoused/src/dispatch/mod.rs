//! Request dispatch for daemon command handling.
//!
//! Clients send one JSONL request line per connection:
//!
//! ```json
//! {"module":"Calendar","command":"CreateEvent","parameters":{"Title":"Standup"},"ticket":"…"}
//! ```
//!
//! and receive one response line:
//!
//! ```json
//! {"status":true,"data":{"id":42}}
//! ```
//!
//! Binary commands add `payload_length` to either line and follow it with
//! exactly that many raw bytes. Failures carry an error descriptor tagged by
//! `error` in `data`.

mod context;
mod errors;
mod events;
mod handler;
mod handlers;
mod pipeline;
mod request;
mod response;

pub use self::context::{CancellationToken, Origin, RequestContext};
pub use self::errors::DispatchError;
pub use self::events::{ChannelEventSink, DomainEvent, EventError, EventSink, TracingEventSink};
pub(crate) use self::handler::DispatchConnectionHandler;
pub use self::handlers::{Binding, CommandHandler, HandlerError, HandlerTable, Reply};
pub use self::pipeline::{Dispatcher, Outcome};
pub use self::response::ResponseWriter;

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
