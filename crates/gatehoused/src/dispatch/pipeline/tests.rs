//! Unit tests for the dispatch pipeline.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use gatehouse_protocol::{
    Arguments, CommandDef, ErrorDescriptor, FieldError, ModuleDef, ParamType, ParameterDef,
    Request,
};
use rstest::{fixture, rstest};
use serde_json::json;

use super::*;
use crate::dispatch::events::ChannelEventSink;
use crate::dispatch::handlers::HandlerError;
use crate::permission::StaticPermissionMap;
use crate::tests::support::Harness;

fn calendar() -> ModuleDef {
    ModuleDef::remote("Calendar")
}

fn error_of(outcome: &Outcome) -> ErrorDescriptor {
    assert!(!outcome.response.status, "expected failure: {:?}", outcome.response);
    outcome.response.error().expect("error descriptor")
}

#[fixture]
fn harness() -> Harness {
    let mut harness = Harness::default();
    harness.register(
        &calendar(),
        CommandDef::new("Calendar", "CreateEvent")
            .with_alias("NewEvent")
            .param(ParameterDef::required("Start", ParamType::DateTime))
            .param(ParameterDef::optional("Title", ParamType::String).nullable()),
    );
    harness.register(
        &calendar(),
        CommandDef::new("Calendar", "ListEvents").anonymous(),
    );
    harness.register(
        &ModuleDef::local("Maintenance"),
        CommandDef::new("Maintenance", "Vacuum").anonymous(),
    );
    harness.bind_recording("Calendar", "CreateEvent");
    harness.bind_recording("Calendar", "ListEvents");
    harness.bind_recording("Maintenance", "Vacuum");
    harness
}

#[rstest]
fn authenticated_request_reaches_the_handler(harness: Harness) {
    let ticket = harness.ticket_for("alice");
    let outcome = harness.send(
        &Request::new("calendar", "newevent")
            .with_ticket(ticket)
            .with_parameter("Start", "2024-03-01T10:00:00+01:00"),
    );

    assert!(outcome.response.status);
    assert_eq!(
        outcome.response.data,
        json!({ "Start": "2024-03-01T09:00:00Z" })
    );
    assert_eq!(harness.recorded_calls(), 1);
}

#[rstest]
fn unknown_module_and_unknown_command_are_distinct(harness: Harness) {
    let outcome = harness.send(&Request::new("Calendar", "Bogus"));
    assert_eq!(error_of(&outcome), ErrorDescriptor::UnknownCommand);

    let outcome = harness.send(&Request::new("Bogus", "CreateEvent"));
    assert_eq!(error_of(&outcome), ErrorDescriptor::UnknownModule);
}

#[rstest]
fn local_modules_are_hidden_from_the_network(harness: Harness) {
    let request = Request::new("Maintenance", "Vacuum");
    assert_eq!(
        error_of(&harness.send(&request)),
        ErrorDescriptor::UnknownModule
    );

    let outcome = harness
        .dispatcher()
        .handle(&request, None, Origin::InProcess);
    assert!(outcome.response.status);
}

#[rstest]
#[case::absent(None, ErrorDescriptor::MissingTicket)]
#[case::unknown(Some("not-a-ticket"), ErrorDescriptor::InvalidTicket)]
fn protected_commands_never_run_without_a_valid_ticket(
    harness: Harness,
    #[case] ticket: Option<&str>,
    #[case] expected: ErrorDescriptor,
) {
    let mut request =
        Request::new("Calendar", "CreateEvent").with_parameter("Start", "2024-03-01T10:00:00Z");
    request.ticket = ticket.map(str::to_owned);

    assert_eq!(error_of(&harness.send(&request)), expected);
    assert_eq!(harness.recorded_calls(), 0);
}

#[rstest]
fn expired_tickets_never_reach_the_handler(harness: Harness) {
    let ticket = harness.ticket_for("alice");
    harness.clock.advance(crate::tests::support::LIFETIME + Duration::from_secs(1));

    let outcome = harness.send(
        &Request::new("Calendar", "CreateEvent")
            .with_ticket(ticket)
            .with_parameter("Start", "2024-03-01T10:00:00Z"),
    );
    assert_eq!(error_of(&outcome), ErrorDescriptor::ExpiredTicket);
    assert_eq!(harness.recorded_calls(), 0);
}

#[rstest]
fn validation_reports_every_failing_field(harness: Harness) {
    let ticket = harness.ticket_for("alice");
    let outcome = harness.send(
        &Request::new("Calendar", "CreateEvent")
            .with_ticket(ticket)
            .with_parameter("Start", "not-a-date")
            .with_parameter("Title", json!({ "nested": true })),
    );

    let ErrorDescriptor::ValidationFailed { fields } = error_of(&outcome) else {
        panic!("expected validation failure");
    };
    let names: Vec<&str> = fields.iter().map(|field| field.name.as_str()).collect();
    assert_eq!(names, ["Start", "Title"]);
    assert_eq!(harness.recorded_calls(), 0);
}

#[rstest]
fn explicit_null_on_a_nullable_parameter_is_accepted(harness: Harness) {
    let ticket = harness.ticket_for("alice");
    let outcome = harness.send(
        &Request::new("Calendar", "CreateEvent")
            .with_ticket(ticket)
            .with_parameter("Start", 1_709_283_600)
            .with_parameter("Title", json!(null)),
    );
    assert!(outcome.response.status);
    assert_eq!(
        outcome.response.data,
        json!({ "Start": "2024-03-01T09:00:00Z", "Title": null })
    );
}

#[rstest]
fn permission_flags_are_enforced(harness: Harness) {
    let ticket = harness.ticket_for("alice");
    let dispatcher = harness.dispatcher().with_permissions(PermissionGate::new(Arc::new(
        StaticPermissionMap::new().require("Calendar", "CreateEvent", "calendar.write"),
    )));
    let request = Request::new("Calendar", "CreateEvent")
        .with_ticket(ticket.clone())
        .with_parameter("Start", "2024-03-01T10:00:00Z");

    let outcome = dispatcher.handle(&request, None, Origin::Network);
    assert_eq!(error_of(&outcome), ErrorDescriptor::Forbidden);

    harness
        .accounts
        .create_group("planners", &["calendar.write"])
        .expect("group");
    harness.accounts.add_member("alice", "planners").expect("member");
    let outcome = dispatcher.handle(&request, None, Origin::Network);
    assert!(outcome.response.status);
    assert_eq!(harness.recorded_calls(), 1);
}

#[rstest]
fn anonymous_commands_pick_up_a_valid_ticket(mut harness: Harness) {
    let seen = Arc::new(AtomicBool::new(false));
    let observed = Arc::clone(&seen);
    harness.bind(
        "Calendar",
        "ListEvents",
        Arc::new(move |context: &RequestContext, _: &Arguments| {
            observed.store(context.user() == Some("alice"), Ordering::SeqCst);
            Ok(Reply::json(json!([])))
        }),
    );
    let ticket = harness.ticket_for("alice");

    let outcome = harness.send(&Request::new("Calendar", "ListEvents").with_ticket(ticket));
    assert!(outcome.response.status);
    assert!(seen.load(Ordering::SeqCst));

    let outcome = harness.send(&Request::new("Calendar", "ListEvents").with_ticket("stale"));
    assert!(outcome.response.status);
}

#[rstest]
#[case::internal(HandlerError::internal("row 17 missing"), ErrorDescriptor::InternalError)]
#[case::domain(
    HandlerError::domain("slot_taken", "the slot is already booked"),
    ErrorDescriptor::domain("slot_taken", "the slot is already booked")
)]
fn handler_errors_are_translated(
    mut harness: Harness,
    #[case] raised: HandlerError,
    #[case] expected: ErrorDescriptor,
) {
    let raised = std::sync::Mutex::new(Some(raised));
    harness.bind(
        "Calendar",
        "ListEvents",
        Arc::new(move |_: &RequestContext, _: &Arguments| {
            Err(raised
                .lock()
                .expect("lock")
                .take()
                .unwrap_or_else(|| HandlerError::internal("called twice")))
        }),
    );
    let outcome = harness.send(&Request::new("Calendar", "ListEvents"));
    assert_eq!(error_of(&outcome), expected);
}

#[rstest]
fn handler_panics_become_internal_errors(mut harness: Harness) {
    harness.bind(
        "Calendar",
        "ListEvents",
        Arc::new(|_: &RequestContext, _: &Arguments| -> Result<Reply, HandlerError> {
            panic!("handler bug")
        }),
    );
    let outcome = harness.send(&Request::new("Calendar", "ListEvents"));
    assert_eq!(error_of(&outcome), ErrorDescriptor::InternalError);
}

#[rstest]
fn registered_commands_without_a_handler_fail_internally(harness: Harness) {
    harness.register(&calendar(), CommandDef::new("Calendar", "Archive").anonymous());
    let outcome = harness.send(&Request::new("Calendar", "Archive"));
    assert_eq!(error_of(&outcome), ErrorDescriptor::InternalError);
}

#[rstest]
fn slow_handlers_are_cancelled(mut harness: Harness) {
    let cancelled = Arc::new(AtomicBool::new(false));
    let observed = Arc::clone(&cancelled);
    harness.bind(
        "Calendar",
        "ListEvents",
        Arc::new(move |context: &RequestContext, _: &Arguments| {
            while !context.cancellation.is_cancelled() {
                std::thread::sleep(Duration::from_millis(5));
            }
            observed.store(true, Ordering::SeqCst);
            Ok(Reply::json(json!(null)))
        }),
    );
    let dispatcher = harness
        .dispatcher()
        .with_handler_timeout(Some(Duration::from_millis(50)));

    let outcome = dispatcher.handle(&Request::new("Calendar", "ListEvents"), None, Origin::Network);
    assert_eq!(error_of(&outcome), ErrorDescriptor::InternalError);

    for _ in 0..200 {
        if cancelled.load(Ordering::SeqCst) {
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(cancelled.load(Ordering::SeqCst));
}

#[rstest]
fn events_carry_the_result_and_sink_failures_are_ignored(mut harness: Harness) {
    harness.handlers.bind_with_event(
        "Calendar",
        "ListEvents",
        Arc::new(|_: &RequestContext, _: &Arguments| Ok(Reply::json(json!([1, 2])))),
        "calendar.listed",
    );
    let (sink, receiver) = ChannelEventSink::bounded(1);
    let dispatcher = harness.dispatcher().with_event_sink(Arc::new(sink));
    let request = Request::new("Calendar", "ListEvents");

    assert!(dispatcher.handle(&request, None, Origin::Network).response.status);
    assert!(
        dispatcher.handle(&request, None, Origin::Network).response.status,
        "a full sink must not fail the request"
    );

    let event = receiver.try_recv().expect("first event");
    assert_eq!(event.name, "calendar.listed");
    assert_eq!(event.payload, json!([1, 2]));
    assert!(receiver.try_recv().is_err());
}

#[rstest]
fn binary_commands_receive_the_payload(mut harness: Harness) {
    harness.register(
        &ModuleDef::remote("Archive"),
        CommandDef::new("Archive", "Upload")
            .anonymous()
            .binary()
            .param(ParameterDef::required("File", ParamType::File)),
    );
    harness.bind(
        "Archive",
        "Upload",
        Arc::new(|context: &RequestContext, arguments: &Arguments| {
            let body = context.payload.as_deref().unwrap_or_default().to_vec();
            let name = arguments.file("File").and_then(|file| file.name.clone());
            Ok(Reply::binary(json!({ "name": name }), body))
        }),
    );
    let dispatcher = harness.dispatcher();
    let request = Request::new("Archive", "Upload")
        .with_parameter("File", "notes.txt")
        .with_payload_length(5);

    let outcome = dispatcher.handle(&request, Some(b"hello".to_vec()), Origin::Network);
    assert!(outcome.response.status);
    assert_eq!(outcome.response.payload_length, Some(5));
    assert_eq!(outcome.payload.as_deref(), Some(&b"hello"[..]));

    let missing = dispatcher.handle(&Request::new("Archive", "Upload"), None, Origin::Network);
    assert_eq!(
        error_of(&missing),
        ErrorDescriptor::ValidationFailed {
            fields: vec![FieldError {
                name: String::from("File"),
                reason: String::from("binary payload is missing"),
            }]
        }
    );
}

#[rstest]
fn payloads_on_structured_commands_are_malformed(harness: Harness) {
    let outcome = harness.dispatcher().handle(
        &Request::new("Calendar", "ListEvents"),
        Some(vec![1, 2, 3]),
        Origin::Network,
    );
    assert!(matches!(
        error_of(&outcome),
        ErrorDescriptor::MalformedRequest { .. }
    ));
    assert_eq!(harness.recorded_calls(), 0);
}

#[rstest]
#[case::not_json(&b"not json\n"[..])]
#[case::blank_module(&br#"{"module":" ","command":"ListEvents"}"#[..])]
fn undecodable_lines_are_malformed(harness: Harness, #[case] line: &[u8]) {
    let outcome = harness.dispatcher().handle_line(line, None, Origin::Network);
    assert!(matches!(
        error_of(&outcome),
        ErrorDescriptor::MalformedRequest { .. }
    ));
}
