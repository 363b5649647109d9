//! Command-line client for the Gatehouse daemon.
//!
//! The client loads the shared configuration to find the daemon socket,
//! sends exactly one request (optionally followed by a file payload), and
//! renders the single response. It exits with status 0 when the daemon
//! reports success and 1 otherwise.

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::process::ExitCode;

use camino::Utf8Path;
use clap::Parser;
use gatehouse_protocol::{ErrorDescriptor, Request, Response};

mod cli;
mod command;
mod config;
mod errors;
mod transport;

use cli::Cli;
use command::build_request;
use config::{ConfigLoader, OrthoConfigLoader, split_arguments};
use errors::AppError;
use transport::connect;

/// Runs the client with the given arguments and output streams.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_loader(args, stdout, stderr, &OrthoConfigLoader)
}

pub(crate) fn run_with_loader<I, W, E, L>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    match execute(args, stdout, stderr, loader) {
        Ok(()) => ExitCode::SUCCESS,
        Err(AppError::CliUsage(error)) if !error.use_stderr() => {
            let _ = write!(stdout, "{error}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            report(stderr, &error);
            ExitCode::FAILURE
        }
    }
}

fn execute<I, W, E, L>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
) -> Result<(), AppError>
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let split = split_arguments(args.into_iter().collect());
    let cli = Cli::try_parse_from(split.command_arguments).map_err(AppError::CliUsage)?;
    let config = loader.load(&split.config_arguments)?;

    let mut request = build_request(&cli)?;
    let payload = cli.payload.as_deref().map(open_payload).transpose()?;
    if let Some((_, len)) = &payload {
        request = request.with_payload_length(*len);
    }

    let mut connection = connect(config.daemon_socket())?;
    send_request(&mut connection, &request, payload.map(|(file, _)| file))?;
    connection.finish_request().map_err(AppError::SendRequest)?;

    let mut reader = BufReader::new(connection);
    let response = read_response(&mut reader)?;
    if !response.status {
        return Err(response
            .error()
            .map_or(AppError::UndescribedFailure, AppError::Rejected));
    }

    serde_json::to_writer_pretty(&mut *stdout, &response.data)
        .map_err(|error| AppError::WriteOutput(error.into()))?;
    writeln!(stdout).map_err(AppError::WriteOutput)?;
    stdout.flush().map_err(AppError::WriteOutput)?;

    if let Some(expected) = response.payload_length {
        receive_payload(&mut reader, expected, cli.output.as_deref(), stderr)?;
    }
    Ok(())
}

fn open_payload(path: &Utf8Path) -> Result<(File, u64), AppError> {
    let open_error = |source| AppError::OpenPayload {
        path: path.to_string(),
        source,
    };
    let file = File::open(path).map_err(open_error)?;
    let len = file.metadata().map_err(open_error)?.len();
    Ok((file, len))
}

fn send_request<W: Write>(
    connection: &mut W,
    request: &Request,
    payload: Option<File>,
) -> Result<(), AppError> {
    request
        .write_jsonl(connection)
        .map_err(AppError::SendRequest)?;
    if let Some(mut file) = payload {
        io::copy(&mut file, connection).map_err(AppError::SendRequest)?;
    }
    connection.flush().map_err(AppError::SendRequest)
}

fn read_response<R: BufRead>(reader: &mut R) -> Result<Response, AppError> {
    let mut line = Vec::new();
    let read = reader
        .read_until(b'\n', &mut line)
        .map_err(AppError::ReadResponse)?;
    if read == 0 {
        return Err(AppError::MissingResponse);
    }
    Response::parse(&line).map_err(AppError::ParseResponse)
}

fn receive_payload<R: Read, E: Write>(
    reader: &mut R,
    expected: u64,
    output: Option<&Utf8Path>,
    stderr: &mut E,
) -> Result<(), AppError> {
    let mut body = reader.take(expected);
    let received = match output {
        Some(path) => {
            let write_error = |source| AppError::WritePayload {
                path: path.to_string(),
                source,
            };
            let mut file = File::create(path).map_err(write_error)?;
            let copied = io::copy(&mut body, &mut file).map_err(write_error)?;
            file.sync_all().map_err(write_error)?;
            copied
        }
        None => {
            let discarded = io::copy(&mut body, &mut io::sink()).map_err(AppError::ReadResponse)?;
            let _ = writeln!(
                stderr,
                "gatehouse: discarded {discarded} payload bytes; pass --output to keep them"
            );
            discarded
        }
    };
    if received < expected {
        return Err(AppError::TruncatedPayload { expected, received });
    }
    Ok(())
}

fn report<E: Write>(stderr: &mut E, error: &AppError) {
    let _ = writeln!(stderr, "gatehouse: {error}");
    if let AppError::Rejected(ErrorDescriptor::ValidationFailed { fields }) = error {
        for field in fields {
            let _ = writeln!(stderr, "  {}: {}", field.name, field.reason);
        }
    }
}
