//! Integration tests: POS ↔ terminal envelope exchange.
//!
//! Both sides share one pair of session secrets and talk through wire
//! strings only, the way the transport hands them over. No network, no
//! pairing handshake.
//!
//! Run with:
//!   cargo test --test integration_envelope

use paylink_core::{
    DecodeError, EnvelopeCodec, Event, FixedClock, Message, MessageStamp, Secrets,
    SuccessState, NO_ERROR,
};
use serde_json::{json, Value};
use std::sync::Arc;

// 2024-03-01T12:30:45.123Z
const POS_NOW: i64 = 1_709_296_245_123;

// ============================================================================
// Helpers
// ============================================================================

struct Session {
    pos: EnvelopeCodec,
    terminal: EnvelopeCodec,
    pos_stamp: MessageStamp,
    terminal_stamp: MessageStamp,
}

/// POS clock is `skew` ms behind the terminal's.
fn session(skew: i64) -> Session {
    let secrets = Secrets::generate();
    Session {
        pos: EnvelopeCodec::default().with_clock(Arc::new(FixedClock(POS_NOW))),
        terminal: EnvelopeCodec::default().with_clock(Arc::new(FixedClock(POS_NOW + skew))),
        pos_stamp: MessageStamp::new("POS-01", secrets.clone(), 0),
        terminal_stamp: MessageStamp::new("TERM-77", secrets, 0),
    }
}

fn field(wire: &str, name: &str) -> String {
    let value: Value = serde_json::from_str(wire).expect("wire must be JSON");
    value[name].as_str().expect("field must be a string").to_string()
}

// ============================================================================
// Request / response flow
// ============================================================================

#[test]
fn test_purchase_request_and_response() {
    let s = session(0);

    let mut request = Message::new(
        "prchs1",
        Event::PurchaseRequest,
        json!({ "purchase_amount": 1000 }),
        true,
    );
    let wire = s.pos.encode(&mut request, &s.pos_stamp).unwrap();

    let received = s.terminal.decode(&wire, &s.terminal_stamp.secrets).unwrap();
    assert_eq!(received.event, Event::PurchaseRequest);
    assert_eq!(received.sender_id, "POS-01");
    assert_eq!(received.data["purchase_amount"], 1000);

    let mut response = Message::new(
        received.id.clone(),
        Event::PurchaseResponse,
        json!({ "success": false, "error_reason": "CARD_DECLINED" }),
        true,
    );
    let wire = s.terminal.encode(&mut response, &s.terminal_stamp).unwrap();

    let answer = s.pos.decode(&wire, &s.pos_stamp.secrets).unwrap();
    assert_eq!(answer.id, "prchs1");
    assert_eq!(answer.sender_id, "TERM-77");
    assert_eq!(answer.success_state(), SuccessState::Failed);
    assert_eq!(answer.error().unwrap(), "CARD_DECLINED");
}

#[test]
fn test_plain_pairing_messages() {
    let s = session(0);

    let mut pair = Message::new("pr1", Event::PairRequest, json!({ "padding": true }), false);
    let wire = s.pos.encode(&mut pair, &s.pos_stamp).unwrap();

    let value: Value = serde_json::from_str(&wire).unwrap();
    assert_eq!(value["message"]["senderId"], "POS-01");

    // Plain messages decode without any usable key material
    let received = s
        .terminal
        .decode(&wire, &Secrets::new(Vec::new(), Vec::new()))
        .unwrap();
    assert_eq!(received.event, Event::PairRequest);
    assert_eq!(received.sender_id, "POS-01");
    assert_eq!(received.decrypted_json, wire);
}

#[test]
fn test_key_check_exposes_incoming_hmac() {
    let s = session(0);

    let mut check = Message::new("kc1", Event::KeyCheck, json!({}), true);
    let wire = s.terminal.encode(&mut check, &s.terminal_stamp).unwrap();

    let received = s.pos.decode(&wire, &s.pos_stamp.secrets).unwrap();
    assert_eq!(received.event, Event::KeyCheck);
    assert_eq!(received.incoming_hmac, field(&wire, "hmac"));
}

#[test]
fn test_success_response() {
    let s = session(0);
    let mut settle = Message::new("stl1", Event::SettleResponse, json!({ "success": true }), true);
    let wire = s.terminal.encode(&mut settle, &s.terminal_stamp).unwrap();

    let answer = s.pos.decode(&wire, &s.pos_stamp.secrets).unwrap();
    assert_eq!(answer.success_state(), SuccessState::Success);
    assert_eq!(answer.error().unwrap(), NO_ERROR);
}

// ============================================================================
// Clock skew
// ============================================================================

#[test]
fn test_clock_sync_from_login_response() {
    let mut s = session(4_321);

    let mut login = Message::new("l1", Event::LoginResponse, json!({ "success": true }), true);
    let wire = s.terminal.encode(&mut login, &s.terminal_stamp).unwrap();

    let received = s.pos.decode(&wire, &s.pos_stamp.secrets).unwrap();
    let delta = received.server_time_delta(s.pos.clock());
    assert_eq!(delta, 4_321);

    // Messages stamped after syncing carry the terminal's notion of time
    s.pos_stamp.server_time_delta = delta;
    let mut ping = Message::new("p1", Event::Ping, json!({}), true);
    s.pos.encode(&mut ping, &s.pos_stamp).unwrap();
    assert_eq!(ping.date_time_stamp, login.date_time_stamp);
}

// ============================================================================
// Failure handling
// ============================================================================

#[test]
fn test_foreign_keys_yield_invalid_signature() {
    let s = session(0);
    let mut msg = Message::new("x1", Event::RefundRequest, json!({}), true);
    let wire = s.pos.encode(&mut msg, &s.pos_stamp).unwrap();

    let stranger = Secrets::generate();
    let decoded = s.terminal.decode(&wire, &stranger).unwrap();
    assert_eq!(decoded.event, Event::InvalidHmacSignature);
    assert!(decoded.is_sentinel());
    assert_eq!(decoded.success_state(), SuccessState::Unknown);
}

#[test]
fn test_dispatch_loop_survives_corrupt_input() {
    let s = session(0);
    let mut good = Message::new("g1", Event::Pong, json!({}), true);
    let good_wire = s.pos.encode(&mut good, &s.pos_stamp).unwrap();

    let inbox = [
        "not-json".to_string(),
        r#"{"enc":"00","hmac":"00","senderId":"X"}"#.to_string(),
        "[]".to_string(),
        good_wire,
    ];

    let events: Vec<Event> = inbox
        .iter()
        .map(|wire| s.terminal.decode(wire, &s.terminal_stamp.secrets).unwrap().event)
        .collect();

    assert_eq!(
        events,
        vec![
            Event::Unparseable,
            Event::InvalidHmacSignature,
            Event::Unparseable,
            Event::Pong,
        ]
    );
}

#[test]
fn test_message_field_takes_precedence() {
    let s = session(0);
    let mut msg = Message::new("e1", Event::Error, json!({}), true);
    let encrypted = s.pos.encode(&mut msg, &s.pos_stamp).unwrap();

    let mut both: Value = serde_json::from_str(&encrypted).unwrap();
    both["message"] = json!({ "id": "plain1", "event": "ping", "data": {} });

    let decoded = s
        .terminal
        .decode(&both.to_string(), &s.terminal_stamp.secrets)
        .unwrap();
    assert_eq!(decoded.id, "plain1");
    assert_eq!(decoded.event, Event::Ping);
    assert!(!decoded.needs_encryption());
    assert!(decoded.incoming_hmac.is_empty());
}

#[test]
fn test_open_reports_error_kinds() {
    let s = session(0);
    let secrets = &s.terminal_stamp.secrets;

    assert!(matches!(
        s.terminal.open("not-json", secrets),
        Err(DecodeError::UnparseableOuter { .. })
    ));
    assert_eq!(
        s.terminal.open(r#"{"enc":"AA","hmac":"BB"}"#, secrets),
        Err(DecodeError::InvalidSignature)
    );
}

#[test]
fn test_unknown_event_passes_through() {
    let s = session(0);
    let mut msg = Message::new(
        "u1",
        Event::Other("transaction_update".into()),
        json!({ "stage": "TAP" }),
        true,
    );
    let wire = s.terminal.encode(&mut msg, &s.terminal_stamp).unwrap();

    let decoded = s.pos.decode(&wire, &s.pos_stamp.secrets).unwrap();
    assert_eq!(decoded.event, Event::Other("transaction_update".into()));
    assert!(!decoded.is_sentinel());
}
