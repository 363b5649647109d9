//! Behavioural tests for the daemon served over its socket.

use std::cell::RefCell;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use gatehouse_config::SocketEndpoint;
use gatehouse_protocol::{
    Arguments, CommandDef, ModuleDef, ParamType, ParameterDef, Request, Response,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::json;

use crate::bootstrap::{Daemon, bootstrap_with};
use crate::builtin::SECURITY_MODULE;
use crate::dispatch::{HandlerError, Reply, RequestContext};
use crate::process::RunningDaemon;
use crate::tests::support::{RecordingHealthReporter, TestConfigLoader};

type StepResult = Result<(), String>;

struct SocketWorld {
    loader: TestConfigLoader,
    daemon: Option<Daemon>,
    running: Option<RunningDaemon>,
    ticket: Option<String>,
    response: Option<Response>,
    payload: Vec<u8>,
}

impl SocketWorld {
    fn new() -> Self {
        Self {
            loader: TestConfigLoader::tcp(),
            daemon: None,
            running: None,
            ticket: None,
            response: None,
            payload: Vec::new(),
        }
    }

    fn daemon_mut(&mut self) -> Result<&mut Daemon, String> {
        self.daemon
            .as_mut()
            .ok_or_else(|| String::from("daemon has not been bootstrapped"))
    }

    fn connect(&self) -> Result<TcpStream, String> {
        let running = self
            .running
            .as_ref()
            .ok_or_else(|| String::from("daemon is not serving"))?;
        let SocketEndpoint::Tcp { host, port } = running.endpoint() else {
            return Err(format!("expected a TCP endpoint, got {}", running.endpoint()));
        };
        let stream = TcpStream::connect((host.as_str(), *port)).map_err(|error| error.to_string())?;
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .map_err(|error| error.to_string())?;
        Ok(stream)
    }

    /// Sends raw bytes and splits the reply into its line and payload.
    fn exchange(&mut self, request: &[u8]) -> StepResult {
        let mut stream = self.connect()?;
        stream
            .write_all(request)
            .map_err(|error| error.to_string())?;
        stream
            .shutdown(Shutdown::Write)
            .map_err(|error| error.to_string())?;
        let mut reply = Vec::new();
        stream
            .read_to_end(&mut reply)
            .map_err(|error| error.to_string())?;

        let split = reply
            .iter()
            .position(|byte| *byte == b'\n')
            .ok_or_else(|| String::from("reply has no response line"))?;
        let response = Response::parse(&reply[..=split]).map_err(|error| error.to_string())?;
        self.payload = reply[split + 1..].to_vec();
        self.response = Some(response);
        Ok(())
    }

    fn send(&mut self, request: &Request, payload: &[u8]) -> StepResult {
        let mut bytes = Vec::new();
        request
            .write_jsonl(&mut bytes)
            .map_err(|error| error.to_string())?;
        bytes.extend_from_slice(payload);
        self.exchange(&bytes)
    }

    fn response(&self) -> Result<&Response, String> {
        self.response
            .as_ref()
            .ok_or_else(|| String::from("no reply received"))
    }
}

impl Drop for SocketWorld {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.stop();
        }
    }
}

#[fixture]
fn world() -> RefCell<SocketWorld> {
    RefCell::new(SocketWorld::new())
}

#[given("a bootstrapped daemon with user \"{user}\"")]
fn given_daemon(world: &RefCell<SocketWorld>, user: String) -> StepResult {
    let mut world = world.borrow_mut();
    let daemon = bootstrap_with(&world.loader, Arc::new(RecordingHealthReporter::default()))
        .map_err(|error| error.to_string())?;
    daemon
        .accounts()
        .create_user(&user, &format!("{user}-password"))
        .map_err(|error| error.to_string())?;
    world.daemon = Some(daemon);
    Ok(())
}

#[given("an archive module that echoes uploads")]
fn given_archive(world: &RefCell<SocketWorld>) -> StepResult {
    let mut world = world.borrow_mut();
    let daemon = world.daemon_mut()?;
    daemon
        .registry()
        .register(
            &ModuleDef::remote("Archive"),
            CommandDef::new("Archive", "Upload")
                .binary()
                .param(ParameterDef::required("Document", ParamType::File)),
        )
        .map_err(|error| error.to_string())?;
    daemon.bind(
        "Archive",
        "Upload",
        Arc::new(|context: &RequestContext, _: &Arguments| {
            let body = context.payload.as_deref().unwrap_or_default().to_vec();
            Ok::<_, HandlerError>(Reply::binary(json!({ "stored": body.len() }), body))
        }),
    );
    Ok(())
}

#[when("the daemon starts serving")]
fn when_serving(world: &RefCell<SocketWorld>) -> StepResult {
    let mut world = world.borrow_mut();
    let daemon = world
        .daemon
        .take()
        .ok_or_else(|| String::from("daemon has not been bootstrapped"))?;
    world.running = Some(RunningDaemon::start(daemon).map_err(|error| error.to_string())?);
    Ok(())
}

#[when("the client logs in as \"{user}\" with password \"{password}\"")]
fn when_login(world: &RefCell<SocketWorld>, user: String, password: String) -> StepResult {
    let mut world = world.borrow_mut();
    world.send(
        &Request::new(SECURITY_MODULE, "Login")
            .with_parameter("User", user)
            .with_parameter("Password", password),
        &[],
    )?;
    world.ticket = world.response()?.data["ticket"].as_str().map(str::to_owned);
    Ok(())
}

#[when("the client uploads \"{content}\"")]
fn when_upload(world: &RefCell<SocketWorld>, content: String) -> StepResult {
    let mut world = world.borrow_mut();
    let ticket = world
        .ticket
        .clone()
        .ok_or_else(|| String::from("client has no ticket"))?;
    let body = content.into_bytes();
    let request = Request::new("Archive", "Upload")
        .with_ticket(ticket)
        .with_parameter("Document", "notes.txt")
        .with_payload_length(u64::try_from(body.len()).map_err(|error| error.to_string())?);
    world.send(&request, &body)
}

#[when("the client sends a request line of {size} bytes")]
fn when_oversized(world: &RefCell<SocketWorld>, size: usize) -> StepResult {
    let mut line = vec![b'x'; size];
    line.push(b'\n');
    world.borrow_mut().exchange(&line)
}

#[then("the daemon replies with success")]
fn then_success(world: &RefCell<SocketWorld>) -> StepResult {
    let world = world.borrow();
    let response = world.response()?;
    if response.status {
        Ok(())
    } else {
        Err(format!("expected success, got {response:?}"))
    }
}

#[then("the reply carries a ticket")]
fn then_ticket(world: &RefCell<SocketWorld>) -> StepResult {
    match world.borrow().ticket.as_deref() {
        Some(ticket) if ticket.len() == 64 => Ok(()),
        other => Err(format!("expected a 64 character ticket, got {other:?}")),
    }
}

#[then("the reply payload is \"{content}\"")]
fn then_payload(world: &RefCell<SocketWorld>, content: String) -> StepResult {
    let world = world.borrow();
    let declared = world.response()?.payload_length;
    if world.payload == content.as_bytes() && declared.and_then(|len| usize::try_from(len).ok()) == Some(world.payload.len()) {
        Ok(())
    } else {
        Err(format!(
            "expected payload {content:?}, got {:?} (declared {declared:?})",
            String::from_utf8_lossy(&world.payload)
        ))
    }
}

#[then("the daemon replies with the error \"{code}\"")]
fn then_error(world: &RefCell<SocketWorld>, code: String) -> StepResult {
    let world = world.borrow();
    let response = world.response()?;
    if !response.status && response.data["error"] == json!(code) {
        Ok(())
    } else {
        Err(format!("expected '{code}', got {response:?}"))
    }
}

#[scenario(
    path = "tests/features/socket.feature",
    name = "A client logs in over the socket"
)]
fn login_over_the_socket(world: RefCell<SocketWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/socket.feature",
    name = "Binary payloads travel in both directions"
)]
fn binary_payloads_over_the_socket(world: RefCell<SocketWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/socket.feature",
    name = "Oversized request lines are refused"
)]
fn oversized_lines_over_the_socket(world: RefCell<SocketWorld>) {
    drop(world);
}
