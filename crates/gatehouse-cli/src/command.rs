//! Turns parsed arguments into a wire request.

use gatehouse_protocol::Request;
use serde_json::Value;

use crate::{AppError, Cli};

/// Parses `NAME=VALUE` into a parameter.
///
/// The value is sent as JSON when it parses as JSON and as a string
/// otherwise, so `Count=3` is a number and `User=ada` is a string.
fn parse_parameter(argument: &str) -> Result<(String, Value), AppError> {
    let (name, raw) = argument
        .split_once('=')
        .filter(|(name, _)| !name.trim().is_empty())
        .ok_or_else(|| AppError::MalformedParameter(argument.to_owned()))?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()));
    Ok((name.trim().to_owned(), value))
}

/// Builds the request line for `cli`; the payload length is added by the
/// caller once the file has been opened.
pub(crate) fn build_request(cli: &Cli) -> Result<Request, AppError> {
    let mut request = Request::new(cli.module.trim(), cli.command.trim());
    for argument in &cli.parameters {
        let (name, value) = parse_parameter(argument)?;
        request = request.with_parameter(name, value);
    }
    if let Some(ticket) = &cli.ticket {
        request = request.with_ticket(ticket.clone());
    }
    Ok(request)
}
