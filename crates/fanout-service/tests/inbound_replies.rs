mod common;

use std::sync::Arc;

use common::{rn_shift, Harness};
use fanout_core::{CaregiverId, FanoutStatus, ReplyIntent, ShiftId};
use fanout_service::{Caregiver, InboundReply, ReplyError, ReplyHandler, ReplyStatus, Roster};

fn caregiver(id: &str, role: &str, phone: &str) -> Caregiver {
    Caregiver {
        id: CaregiverId::new(id),
        name: id.to_uppercase(),
        role: role.into(),
        phone: phone.to_string(),
    }
}

async fn setup() -> (Harness, ReplyHandler) {
    let h = Harness::new();
    h.directory.set_role("RN", &["A", "B"]);
    h.engine.submit_and_trigger(rn_shift("S1")).await.unwrap();

    let roster = Roster::new(vec![
        caregiver("A", "RN", "+1001"),
        caregiver("B", "RN", "+1002"),
        caregiver("X", "LPN", "+1003"),
    ])
    .unwrap();
    let handler = ReplyHandler::new(Arc::clone(&h.engine), roster.shared());
    (h, handler)
}

fn reply(phone: &str, body: &str) -> InboundReply {
    InboundReply {
        from_phone: phone.to_string(),
        shift_id: ShiftId::new("S1"),
        body: body.to_string(),
    }
}

#[tokio::test]
async fn test_yes_claims_shift() {
    let (h, handler) = setup().await;

    let outcome = handler.handle(&reply("+1002", "Yes, I'll take it")).unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.intent, ReplyIntent::Accept);
    assert_eq!(outcome.claimed_by, Some(CaregiverId::new("B")));

    let status = h.engine.get_status(&ShiftId::new("S1")).unwrap();
    assert_eq!(status.status, FanoutStatus::Resolved);
    assert_eq!(status.resolved_by, Some(CaregiverId::new("B")));
}

#[tokio::test]
async fn test_late_yes_reports_claimer() {
    let (_h, handler) = setup().await;
    handler.handle(&reply("+1001", "yes")).unwrap();

    let outcome = handler.handle(&reply("+1002", "yes")).unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.status, ReplyStatus::AlreadyClaimed);
    assert_eq!(outcome.claimed_by, Some(CaregiverId::new("A")));
}

#[tokio::test]
async fn test_decline_leaves_shift_open() {
    let (h, handler) = setup().await;

    let outcome = handler.handle(&reply("+1001", "no thanks")).unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.intent, ReplyIntent::Decline);
    assert_eq!(
        h.engine.get_status(&ShiftId::new("S1")).unwrap().status,
        FanoutStatus::InProgress
    );
}

#[tokio::test]
async fn test_typographic_cant_does_not_claim() {
    let (h, handler) = setup().await;

    let outcome = handler.handle(&reply("+1001", "I can\u{2019}t make it")).unwrap();
    assert_eq!(outcome.intent, ReplyIntent::Decline);
    assert_eq!(outcome.status, ReplyStatus::Declined);
    assert!(h
        .engine
        .get_status(&ShiftId::new("S1"))
        .unwrap()
        .resolved_by
        .is_none());
}

#[tokio::test]
async fn test_wrong_role_cannot_claim() {
    let (h, handler) = setup().await;

    let outcome = handler.handle(&reply("+1003", "yes")).unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.status, ReplyStatus::NotEligible);
    assert!(outcome.message.contains("RN"));
    assert_eq!(
        h.engine.get_status(&ShiftId::new("S1")).unwrap().status,
        FanoutStatus::InProgress
    );
}

#[tokio::test]
async fn test_unclear_reply_changes_nothing() {
    let (h, handler) = setup().await;

    let outcome = handler.handle(&reply("+1001", "what time?")).unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.intent, ReplyIntent::Unknown);
    assert!(h
        .engine
        .get_status(&ShiftId::new("S1"))
        .unwrap()
        .resolved_by
        .is_none());
}

#[tokio::test]
async fn test_unknown_sender_and_shift() {
    let (_h, handler) = setup().await;

    assert!(matches!(
        handler.handle(&reply("+1999", "yes")),
        Err(ReplyError::UnknownCaregiver { .. })
    ));

    let mut ghost = reply("+1001", "yes");
    ghost.shift_id = ShiftId::new("ghost");
    match handler.handle(&ghost) {
        Err(ReplyError::Fanout(e)) => assert_eq!(e.code(), "UNKNOWN_SHIFT"),
        other => panic!("Expected unknown shift, got: {other:?}"),
    }
}
