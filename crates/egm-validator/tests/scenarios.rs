//! End-to-end engine scenarios against a scripted mock device.
//!
//! Replies are queued on the mock link before each engine call; the
//! session consumes exactly one frame per exchange, so a queued script
//! plays back deterministically under paused time.

use std::time::Duration;

use tokio::sync::mpsc;

use egm_protocol::VALIDATOR_SCHEMA;
use egm_session::{MockLink, MockLinkHandle, SessionTiming};
use egm_validator::{
    ReturnReason, ValidatorConfig, ValidatorEngine, ValidatorEvent, ValidatorFault, ValidatorState,
};

const ACK: u8 = 0x50;
const STATUS_REQUEST: u8 = 0x11;
const STACK: u8 = 0x41;
const RETURN: u8 = 0x43;
const INHIBIT_SET: u8 = 0xC3;

/// Assignment: escrow code 0x05 -> 20 * 10^2 = 2000 minor units of USD.
const ASSIGNMENT: [u8; 4] = [0x05, 0x01, 20, 2];

fn test_config() -> ValidatorConfig {
    ValidatorConfig {
        timing: SessionTiming {
            communication_timeout: Duration::from_millis(500),
            initialization_timeout: Duration::from_secs(5),
            minimum_response_time: Duration::ZERO,
        },
        ..ValidatorConfig::default()
    }
}

fn harness() -> (
    ValidatorEngine<MockLink>,
    MockLinkHandle,
    mpsc::UnboundedReceiver<ValidatorEvent>,
) {
    let (link, device) = MockLink::new();
    let (tx, rx) = mpsc::unbounded_channel();
    (ValidatorEngine::new(link, test_config(), tx), device, rx)
}

fn reply(device: &MockLinkHandle, code: u8, payload: &[u8]) {
    device.inject(&VALIDATOR_SCHEMA.encode(code, payload).unwrap());
}

/// Queue replies for the identity/table queries `open()` makes.
fn queue_open_replies(device: &MockLinkHandle) {
    reply(device, 0x88, b"V1.02");
    reply(device, 0x89, b"B1.00");
    reply(device, 0x8A, &ASSIGNMENT);
}

/// Queue acks for the five setup commands plus the currency re-query the
/// configuration sequence makes.
fn queue_configuration_replies(device: &MockLinkHandle) {
    for _ in 0..5 {
        reply(device, ACK, &[]);
    }
    reply(device, 0x8A, &ASSIGNMENT);
}

/// Drain and decode every command byte the engine has written.
fn sent_commands(device: &mut MockLinkHandle) -> Vec<u8> {
    let mut commands = Vec::new();
    while let Some(frame) = device.try_next_sent() {
        let (code, _) = VALIDATOR_SCHEMA.decode(&frame).unwrap();
        commands.push(code);
    }
    commands
}

fn drain_events(rx: &mut mpsc::UnboundedReceiver<ValidatorEvent>) -> Vec<ValidatorEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Bring the engine through open + Initializing + configuration.
async fn bring_up(device: &MockLinkHandle, engine: &mut ValidatorEngine<MockLink>) {
    queue_open_replies(device);
    engine.open().await.unwrap();

    reply(device, 0x1B, &[]); // Initializing
    queue_configuration_replies(device);
    engine.poll_tick().await.unwrap();
    assert!(engine.is_configured());
}

#[tokio::test(start_paused = true)]
async fn validator_happy_path_accepts_a_note() {
    let (mut engine, mut device, mut rx) = harness();

    bring_up(&device, &mut engine).await;

    // Host enables acceptance while the device still reports
    // Initializing: the request is latched and replayed after bring-up.
    engine.enable(true).await.unwrap();

    // Idle, then a patron inserts a 20.00 note.
    reply(&device, 0x11, &[]); // Idling
    reply(&device, ACK, &[]); // ack for the replayed enable
    engine.poll_tick().await.unwrap();
    assert_eq!(engine.state(), ValidatorState::EnabledIdle);

    reply(&device, 0x13, &[0x05]); // Escrow, code 0x05
    engine.poll_tick().await.unwrap();
    assert_eq!(engine.state(), ValidatorState::Escrow);

    // Host accepts; device stacks and reports vend-valid, which the
    // engine must acknowledge.
    reply(&device, ACK, &[]);
    engine.accept().await.unwrap();

    reply(&device, 0x15, &[]); // VendValid
    reply(&device, ACK, &[]); // ack of the engine's Ack
    engine.poll_tick().await.unwrap();

    reply(&device, 0x16, &[]); // Stacked
    engine.poll_tick().await.unwrap();
    reply(&device, 0x11, &[]); // Idling again
    engine.poll_tick().await.unwrap();

    assert_eq!(engine.state(), ValidatorState::EnabledIdle);

    let events = drain_events(&mut rx);
    let escrowed = events.iter().find_map(|e| match e {
        ValidatorEvent::NoteEscrowed { escrow_code, value } => Some((*escrow_code, *value)),
        _ => None,
    });
    let (code, value) = escrowed.expect("escrow event");
    assert_eq!(code, 0x05);
    assert_eq!(value.unwrap().denomination.as_minor_units(), 2000);
    assert_eq!(value.unwrap().currency.as_str(), "USD");

    let accepted = events.iter().find_map(|e| match e {
        ValidatorEvent::NoteAccepted { value } => Some(*value),
        _ => None,
    });
    assert_eq!(
        accepted.expect("accepted event").unwrap().denomination.as_minor_units(),
        2000
    );

    // The vend-valid report was acknowledged on the wire.
    let commands = sent_commands(&mut device);
    assert!(commands.contains(&ACK));
    assert!(commands.contains(&STACK));
}

#[tokio::test(start_paused = true)]
async fn escrow_timeout_returns_the_note_exactly_once() {
    let (mut engine, mut device, mut rx) = harness();
    bring_up(&device, &mut engine).await;

    engine.enable(true).await.unwrap(); // latched mid-initialization

    reply(&device, 0x11, &[]); // Idling completes bring-up
    reply(&device, ACK, &[]); // ack for the replayed enable
    engine.poll_tick().await.unwrap();

    reply(&device, 0x13, &[0x05]);
    engine.poll_tick().await.unwrap();
    assert_eq!(engine.state(), ValidatorState::Escrow);
    sent_commands(&mut device); // discard traffic so far

    // No host decision within the window.
    tokio::time::advance(Duration::from_secs(11)).await;

    // The overdue tick issues the return instead of a status read.
    reply(&device, ACK, &[]);
    engine.poll_tick().await.unwrap();
    assert_eq!(sent_commands(&mut device), vec![RETURN]);

    // The following tick is a plain status read, no second return.
    reply(&device, 0x18, &[]); // Returning
    engine.poll_tick().await.unwrap();
    assert_eq!(sent_commands(&mut device), vec![STATUS_REQUEST]);

    let events = drain_events(&mut rx);
    let returns: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ValidatorEvent::NoteReturned { reason } => Some(*reason),
            _ => None,
        })
        .collect();
    assert_eq!(returns, vec![ReturnReason::EscrowTimeout]);
}

#[tokio::test(start_paused = true)]
async fn escrow_while_disabled_is_returned_immediately() {
    let (mut engine, mut device, mut rx) = harness();
    bring_up(&device, &mut engine).await;
    sent_commands(&mut device);

    // Acceptance was never enabled; a note reaches escrow anyway.
    reply(&device, 0x13, &[0x05]);
    reply(&device, ACK, &[]); // ack of the return
    engine.poll_tick().await.unwrap();

    let commands = sent_commands(&mut device);
    assert_eq!(commands, vec![STATUS_REQUEST, RETURN]);

    let events = drain_events(&mut rx);
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, ValidatorEvent::NoteEscrowed { .. })),
        "a disabled insertion must not surface as an escrow offer"
    );
    assert!(events.iter().any(|e| matches!(
        e,
        ValidatorEvent::NoteReturned {
            reason: ReturnReason::AcceptanceDisabled
        }
    )));
}

#[tokio::test(start_paused = true)]
async fn power_up_with_bill_in_stacker_defers_accept_and_replays_enable() {
    let (mut engine, mut device, mut rx) = harness();

    queue_open_replies(&device);
    engine.open().await.unwrap();

    // Link re-establishment: the device held a document across the
    // power interruption.
    reply(&device, 0x42, &[]); // PowerUpBillInStacker
    engine.poll_tick().await.unwrap();
    assert_eq!(engine.state(), ValidatorState::PowerUpBillInStacker);

    // Host request arrives mid power-up handling: latched, not sent.
    engine.enable(true).await.unwrap();
    sent_commands(&mut device);
    drain_events(&mut rx);

    reply(&device, 0x1B, &[]); // Initializing
    queue_configuration_replies(&device);
    engine.poll_tick().await.unwrap();

    // No deferred events yet: bring-up has not completed.
    assert!(
        !drain_events(&mut rx)
            .iter()
            .any(|e| matches!(e, ValidatorEvent::NoteAccepted { .. }))
    );

    reply(&device, 0x11, &[]); // Idling: bring-up complete
    reply(&device, ACK, &[]); // ack for the replayed enable
    engine.poll_tick().await.unwrap();

    let events = drain_events(&mut rx);
    assert!(
        events
            .iter()
            .any(|e| matches!(e, ValidatorEvent::NoteAccepted { value: None })),
        "document recovered from the stacker path counts as accepted"
    );

    let commands = sent_commands(&mut device);
    assert!(
        commands.ends_with(&[INHIBIT_SET]),
        "latched enable must replay once bring-up completes, got {commands:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn repeated_timeouts_escalate_to_communication_fault() {
    let (mut engine, mut device, mut rx) = harness();
    bring_up(&device, &mut engine).await;
    sent_commands(&mut device);
    drain_events(&mut rx);

    // The device goes silent for three polls.
    for _ in 0..3 {
        engine.poll_tick().await.unwrap();
    }
    assert_eq!(
        engine.active_faults(),
        &[ValidatorFault::CommunicationError]
    );

    // It comes back; the next state report is the all-clear.
    reply(&device, 0x11, &[]);
    engine.poll_tick().await.unwrap();
    assert!(engine.active_faults().is_empty());

    let events = drain_events(&mut rx);
    assert!(events.iter().any(
        |e| matches!(e, ValidatorEvent::Fault { report } if !report.is_clear())
    ));
    assert!(events.iter().any(
        |e| matches!(e, ValidatorEvent::Fault { report } if report.is_clear())
    ));
}

#[tokio::test(start_paused = true)]
async fn stacker_full_supersedes_stacker_open_in_reports() {
    let (mut engine, mut device, mut rx) = harness();
    bring_up(&device, &mut engine).await;
    drain_events(&mut rx);

    reply(&device, 0x44, &[]); // StackerOpen
    engine.poll_tick().await.unwrap();
    reply(&device, 0x43, &[]); // StackerFull
    engine.poll_tick().await.unwrap();

    assert_eq!(engine.active_faults(), &[ValidatorFault::StackerFull]);

    let last_report = drain_events(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            ValidatorEvent::Fault { report } => Some(report),
            _ => None,
        })
        .last()
        .expect("fault report");
    assert!(last_report.active.contains(&ValidatorFault::StackerFull));
    assert!(!last_report.active.contains(&ValidatorFault::StackerOpen));
}
