//! Error types for the CLI runtime.

use std::io;
use std::sync::Arc;

use gatehouse_protocol::{ErrorDescriptor, ProtocolError};
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("parameter '{0}' must be written as NAME=VALUE")]
    MalformedParameter(String),
    #[error("failed to resolve daemon address {endpoint}: {source}")]
    Resolve { endpoint: String, source: io::Error },
    #[error("failed to connect to daemon at {endpoint}: {source}")]
    Connect { endpoint: String, source: io::Error },
    #[cfg(not(unix))]
    #[error("platform does not support Unix sockets: {0}")]
    UnsupportedUnixTransport(String),
    #[error("failed to open payload file {path}: {source}")]
    OpenPayload { path: String, source: io::Error },
    #[error("failed to send request to daemon: {0}")]
    SendRequest(io::Error),
    #[error("failed to read response from daemon: {0}")]
    ReadResponse(io::Error),
    #[error("daemon closed the connection without a response")]
    MissingResponse,
    #[error("failed to parse daemon response: {0}")]
    ParseResponse(ProtocolError),
    #[error("failed to write output: {0}")]
    WriteOutput(io::Error),
    #[error("failed to write payload to {path}: {source}")]
    WritePayload { path: String, source: io::Error },
    #[error("daemon sent {received} of {expected} payload bytes")]
    TruncatedPayload { expected: u64, received: u64 },
    /// The daemon answered, but with a failure.
    #[error("{code}: {0}", code = .0.code())]
    Rejected(ErrorDescriptor),
    #[error("the daemon reported a failure it did not describe")]
    UndescribedFailure,
}
