//! Connection handler that feeds socket frames through the dispatcher.
//!
//! Each connection carries exactly one request: the handler reads a frame,
//! runs it through the [`Dispatcher`], writes the response and closes the
//! write half.

use std::io::{self, BufRead, BufReader, Read};
use std::sync::Arc;
use std::time::Duration;

use gatehouse_config::TransportLimits;
use tracing::{debug, warn};

use crate::transport::{ConnectionHandler, ConnectionStream};

use super::DISPATCH_TARGET;
use super::context::Origin;
use super::pipeline::Dispatcher;
use super::request::read_frame;
use super::response::ResponseWriter;

const DISCARD_TIMEOUT: Duration = Duration::from_millis(200);

/// Bridges the socket listener and the request pipeline.
pub(crate) struct DispatchConnectionHandler {
    dispatcher: Arc<Dispatcher>,
    limits: TransportLimits,
}

impl DispatchConnectionHandler {
    pub(crate) fn new(dispatcher: Arc<Dispatcher>, limits: TransportLimits) -> Self {
        Self { dispatcher, limits }
    }

    fn dispatch(&self, stream: ConnectionStream) {
        let mut reader = BufReader::new(stream);
        let frame = match read_frame(&mut reader, &self.limits) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!(target: DISPATCH_TARGET, "client disconnected without request");
                return;
            }
            Err(error) => {
                warn!(target: DISPATCH_TARGET, %error, "failed to read request");
                let _ = ResponseWriter::new(reader.get_mut()).write_error(&error);
                let _ = reader.get_ref().finish();
                self.discard_unread(&mut reader);
                return;
            }
        };

        let outcome = self
            .dispatcher
            .handle(&frame.request, frame.payload, Origin::Network);
        let mut stream = reader.into_inner();
        if let Err(error) = ResponseWriter::new(&mut stream).write_outcome(&outcome) {
            warn!(target: DISPATCH_TARGET, %error, "failed to write response");
        }
        if let Err(error) = stream.finish() {
            debug!(target: DISPATCH_TARGET, %error, "failed to close response stream");
        }
    }

    /// Consumes what the client already sent so closing does not reset the
    /// connection before the error response is read.
    fn discard_unread(&self, reader: &mut BufReader<ConnectionStream>) {
        if reader.get_ref().set_read_timeout(Some(DISCARD_TIMEOUT)).is_err() {
            return;
        }
        let budget = self
            .limits
            .max_request_bytes
            .saturating_add(self.limits.max_payload_bytes);
        reader.consume(reader.buffer().len());
        let _ = io::copy(&mut reader.get_mut().take(budget), &mut io::sink());
    }
}

impl ConnectionHandler for DispatchConnectionHandler {
    fn handle(&self, stream: ConnectionStream) {
        self.dispatch(stream);
    }
}
