//! Tests for the built-in modules.

use std::sync::Arc;

use gatehouse_protocol::{CommandDef, ErrorDescriptor, ModuleDef, Request};
use rstest::{fixture, rstest};
use serde_json::json;

use super::*;
use crate::dispatch::{ChannelEventSink, Origin, Outcome};
use crate::tests::support::{Harness, LIFETIME};

#[fixture]
fn harness() -> Harness {
    let mut harness = Harness::default();
    let registry = Arc::clone(&harness.registry);
    let sessions = Arc::clone(&harness.sessions);
    install(&registry, &sessions, &mut harness.handlers).expect("install built-ins");
    harness
        .accounts
        .create_user("ada", "lovelace")
        .expect("create user");
    harness
}

fn login(harness: &Harness, password: &str) -> Outcome {
    harness.send(
        &Request::new(SECURITY_MODULE, "Login")
            .with_parameter("User", "ada")
            .with_parameter("Password", password),
    )
}

fn ticket_of(outcome: &Outcome) -> String {
    assert!(outcome.response.status, "login failed: {:?}", outcome.response);
    outcome.response.data["ticket"]
        .as_str()
        .expect("ticket")
        .to_owned()
}

#[rstest]
fn installing_twice_keeps_one_copy(harness: Harness) {
    let mut handlers = harness.handlers.clone();
    install(&harness.registry, &harness.sessions, &mut handlers).expect("reinstall");

    let (_, commands) = harness.registry.describe(SECURITY_MODULE).expect("security");
    let names: Vec<&str> = commands.iter().map(|def| def.name.as_str()).collect();
    assert_eq!(names, ["Login", "Logout", "ReLogin"]);
}

#[rstest]
fn drifted_declarations_are_rewritten(harness: Harness) {
    harness
        .registry
        .unregister(SYSTEM_MODULE)
        .expect("drop system");
    harness.register(
        &ModuleDef::remote(SYSTEM_MODULE),
        CommandDef::new(SYSTEM_MODULE, "Reboot"),
    );

    let mut handlers = harness.handlers.clone();
    install(&harness.registry, &harness.sessions, &mut handlers).expect("reinstall");

    let (_, commands) = harness.registry.describe(SYSTEM_MODULE).expect("system");
    let names: Vec<&str> = commands.iter().map(|def| def.name.as_str()).collect();
    assert_eq!(names, ["Describe"]);
}

#[rstest]
fn login_issues_a_ticket_with_its_expiry(harness: Harness) {
    let outcome = login(&harness, "lovelace");
    let ticket = ticket_of(&outcome);

    assert_eq!(ticket.len(), 64);
    assert_eq!(
        outcome.response.data["expires_at"],
        json!("2024-03-01T09:10:00Z")
    );
    assert_eq!(LIFETIME.as_secs(), 600);
}

#[rstest]
fn wrong_passwords_fail_authentication(harness: Harness) {
    let outcome = login(&harness, "babbage");
    assert_eq!(
        outcome.response.error(),
        Some(ErrorDescriptor::AuthenticationFailed)
    );
}

#[rstest]
fn login_publishes_the_user_without_the_ticket(harness: Harness) {
    let (sink, events) = ChannelEventSink::bounded(4);
    let dispatcher = harness.dispatcher().with_event_sink(Arc::new(sink));
    let outcome = dispatcher.handle(
        &Request::new(SECURITY_MODULE, "Login")
            .with_parameter("User", "ada")
            .with_parameter("Password", "lovelace"),
        None,
        Origin::Network,
    );
    ticket_of(&outcome);

    let event = events.try_recv().expect("login event");
    assert_eq!(event.name, LOGIN_EVENT);
    assert_eq!(event.payload, json!({ "user": "ada" }));
}

#[rstest]
fn relogin_reports_the_extended_expiry(harness: Harness) {
    let ticket = ticket_of(&login(&harness, "lovelace"));
    harness.clock.advance(std::time::Duration::from_secs(300));

    let outcome = harness.send(&Request::new(SECURITY_MODULE, "ReLogin").with_ticket(&ticket));

    assert!(outcome.response.status);
    assert_eq!(outcome.response.data["ticket"], json!(ticket));
    assert_eq!(
        outcome.response.data["expires_at"],
        json!("2024-03-01T09:15:00Z")
    );
}

#[rstest]
fn logout_invalidates_the_ticket(harness: Harness) {
    let ticket = ticket_of(&login(&harness, "lovelace"));

    let outcome = harness.send(&Request::new(SECURITY_MODULE, "Logout").with_ticket(&ticket));
    assert!(outcome.response.status);
    assert_eq!(outcome.response.data, json!({}));

    let outcome = harness.send(&Request::new(SECURITY_MODULE, "Logout").with_ticket(&ticket));
    assert_eq!(
        outcome.response.error(),
        Some(ErrorDescriptor::InvalidTicket)
    );
}

#[rstest]
fn describe_lists_a_module(harness: Harness) {
    let ticket = ticket_of(&login(&harness, "lovelace"));
    let outcome = harness.send(
        &Request::new(SYSTEM_MODULE, "Describe")
            .with_ticket(&ticket)
            .with_parameter("Module", "security"),
    );

    assert!(outcome.response.status);
    assert_eq!(outcome.response.data["module"], json!("Security"));
    assert_eq!(outcome.response.data["commands"][0]["name"], json!("Login"));
    assert_eq!(
        outcome.response.data["commands"][0]["require_ticket"],
        json!(false)
    );
}

#[rstest]
fn describe_narrows_to_one_command(harness: Harness) {
    let ticket = ticket_of(&login(&harness, "lovelace"));
    let outcome = harness.send(
        &Request::new(SYSTEM_MODULE, "Describe")
            .with_ticket(&ticket)
            .with_parameter("Module", "System")
            .with_parameter("Command", "describe"),
    );

    assert!(outcome.response.status);
    assert_eq!(outcome.response.data["name"], json!("Describe"));
    assert_eq!(outcome.response.data["parameters"][0]["name"], json!("Module"));
}

#[rstest]
fn describe_hides_local_modules_from_the_network(harness: Harness) {
    harness.register(
        &ModuleDef::local("Maintenance"),
        CommandDef::new("Maintenance", "Vacuum"),
    );
    let ticket = ticket_of(&login(&harness, "lovelace"));
    let request = Request::new(SYSTEM_MODULE, "Describe")
        .with_ticket(&ticket)
        .with_parameter("Module", "Maintenance");

    let outcome = harness.send(&request);
    assert_eq!(
        outcome.response.error(),
        Some(ErrorDescriptor::UnknownModule)
    );

    let outcome = harness.dispatcher().handle(&request, None, Origin::InProcess);
    assert!(outcome.response.status);
}

#[rstest]
fn describe_rejects_unknown_commands(harness: Harness) {
    let ticket = ticket_of(&login(&harness, "lovelace"));
    let outcome = harness.send(
        &Request::new(SYSTEM_MODULE, "Describe")
            .with_ticket(&ticket)
            .with_parameter("Module", "System")
            .with_parameter("Command", "Reboot"),
    );
    assert_eq!(
        outcome.response.error(),
        Some(ErrorDescriptor::UnknownCommand)
    );
}
