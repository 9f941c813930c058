use crate::db::connection::Database;
use crate::db::{action_log, change_requests};
use crate::domain::{ChangeStatus, ChangeType, NewChangeRequest};
use crate::orchestrator::{
    fail_unstarted, Orchestrator, METHOD_CANCEL_REBOOK, METHOD_LEGACY_CANCEL,
    METHOD_LEGACY_CHANGE_DATE, METHOD_LEGACY_PICKUP, METHOD_STANDARD_CANCEL, METHOD_STANDARD_PATCH,
};
use crate::reservations::models::LegacyAction;
use crate::reservations::{LegacyApi, StandardApi};
use crate::tests::mocks::{snapshot, EditOutcome, MockLegacy, MockStandard};
use crate::tests::utils::init_test_db;
use chrono::{FixedOffset, NaiveDate, NaiveDateTime, Utc};
use rusqlite::params;
use std::time::Duration;

fn orchestrator<'a>(
    db: &'a Database,
    legacy: &'a dyn LegacyApi,
    standard: &'a dyn StandardApi,
) -> Orchestrator<'a> {
    Orchestrator::new(
        db,
        legacy,
        standard,
        FixedOffset::east_opt(0).unwrap(),
        Duration::from_secs(30),
    )
}

fn future_date() -> NaiveDate {
    Utc::now().date_naive() + chrono::Duration::days(30)
}

fn open_cutoff() -> NaiveDateTime {
    Utc::now().naive_utc() - chrono::Duration::minutes(15)
}

fn create_reschedule(db: &Database, new_date: NaiveDate) -> String {
    let new = NewChangeRequest {
        booking_id: 555,
        confirmation_code: "KLB-555".to_string(),
        change_type: ChangeType::Reschedule,
        requested_by: "anna".to_string(),
        new_date: Some(new_date),
        new_pickup_place_id: None,
        pickup_description: None,
        reason: None,
    };
    change_requests::create(db, &new, Utc::now().date_naive(), open_cutoff())
        .expect("create failed")
        .id
}

/// Insert a PENDING row directly, bypassing create()'s validation gate,
/// to exercise the orchestrator's own fail-fast check.
fn insert_raw_reschedule(db: &Database, id: &str, new_date: &str) {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO change_requests
                (id, booking_id, confirmation_code, change_type, parameters,
                 requested_by, status, created_at)
             VALUES (?1, 555, 'KLB-555', 'RESCHEDULE', ?2, 'anna', 'PENDING', ?3)",
            params![id, format!(r#"{{"newDate":"{new_date}"}}"#), Utc::now().naive_utc()],
        )
        .map_err(|e| crate::errors::ServerError::DbError(e.to_string()))?;
        Ok(())
    })
    .unwrap();
}

#[test]
fn standard_patch_is_preferred_and_legacy_never_invoked() {
    let db = init_test_db();
    let legacy = MockLegacy::with_snapshot(snapshot("12345", "KLB-555"));
    let standard = MockStandard::with_open_slot().with_booking();
    let id = create_reschedule(&db, future_date());

    orchestrator(&db, &legacy, &standard).process(&id).unwrap();

    let req = change_requests::get(&db, &id).unwrap().unwrap();
    assert_eq!(req.status, ChangeStatus::Completed);
    assert_eq!(req.method.as_deref(), Some(METHOD_STANDARD_PATCH));
    assert!(req.completed_at.is_some());

    // Strategy ordering: exactly one PATCH, zero legacy date actions.
    assert_eq!(standard.patch_calls.get(), 1);
    assert_eq!(legacy.edit_calls(), 0);

    let attempts = action_log::for_request(&db, &id).unwrap();
    assert_eq!(attempts.len(), 1);
    assert!(attempts[0].success);
    assert_eq!(attempts[0].method, METHOD_STANDARD_PATCH);
}

#[test]
fn past_date_fails_validation_with_zero_upstream_calls() {
    let db = init_test_db();
    let legacy = MockLegacy::with_snapshot(snapshot("12345", "KLB-555"));
    let standard = MockStandard::with_open_slot();
    insert_raw_reschedule(&db, "req-past", "2020-01-01");

    orchestrator(&db, &legacy, &standard)
        .process("req-past")
        .unwrap();

    let req = change_requests::get(&db, "req-past").unwrap().unwrap();
    assert_eq!(req.status, ChangeStatus::Failed);
    assert!(req.error_message.unwrap().contains("past"));

    assert_eq!(legacy.get_calls.get(), 0);
    assert_eq!(legacy.edit_calls(), 0);
    assert_eq!(standard.products_calls.get(), 0);
    assert_eq!(standard.find_calls.get(), 0);
    assert!(action_log::for_request(&db, "req-past").unwrap().is_empty());
}

#[test]
fn ota_booking_with_auth_rejection_gets_portal_guidance() {
    let db = init_test_db();
    let legacy = MockLegacy::with_snapshot(snapshot("GYG-778899", "GYG-778899"));
    legacy.script_edits(&[EditOutcome::Unauthorized]);
    let standard = MockStandard::with_open_slot(); // no standard booking resource
    let id = create_reschedule(&db, future_date());

    orchestrator(&db, &legacy, &standard).process(&id).unwrap();

    let req = change_requests::get(&db, &id).unwrap().unwrap();
    assert_eq!(req.status, ChangeStatus::Failed);
    assert!(req.is_ota_booking);
    assert_eq!(req.ota_name.as_deref(), Some("GetYourGuide"));
    assert!(req.ota_portal_url.as_deref().unwrap_or("").starts_with("https://"));

    // The last attempted strategy is recorded even on failure.
    assert_eq!(req.method.as_deref(), Some(METHOD_LEGACY_CHANGE_DATE));

    // Never a bare 401, always the portal.
    let message = req.error_message.unwrap();
    assert!(message.contains("GetYourGuide"));
    assert!(!message.contains("401"));

    // Destructive fallback must not run for OTA bookings.
    let attempts = action_log::for_request(&db, &id).unwrap();
    assert!(attempts.iter().all(|a| a.method != METHOD_CANCEL_REBOOK));
}

#[test]
fn no_availability_fails_before_any_write_strategy() {
    let db = init_test_db();
    let legacy = MockLegacy::with_snapshot(snapshot("12345", "KLB-555"));
    let standard = MockStandard::sold_out().with_booking();
    let id = create_reschedule(&db, future_date());

    orchestrator(&db, &legacy, &standard).process(&id).unwrap();

    let req = change_requests::get(&db, &id).unwrap().unwrap();
    assert_eq!(req.status, ChangeStatus::Failed);
    assert!(req.error_message.unwrap().contains("No availability"));

    assert_eq!(standard.patch_calls.get(), 0);
    assert_eq!(standard.find_calls.get(), 0);
    assert_eq!(legacy.edit_calls(), 0);
    assert!(action_log::for_request(&db, &id).unwrap().is_empty());
}

#[test]
fn second_invocation_on_terminal_request_is_a_noop() {
    let db = init_test_db();
    let legacy = MockLegacy::with_snapshot(snapshot("12345", "KLB-555"));
    let standard = MockStandard::with_open_slot().with_booking();
    let id = create_reschedule(&db, future_date());

    let orch = orchestrator(&db, &legacy, &standard);
    orch.process(&id).unwrap();

    let patches_after_first = standard.patch_calls.get();
    let attempts_after_first = action_log::for_request(&db, &id).unwrap().len();

    orch.process(&id).unwrap();

    assert_eq!(standard.patch_calls.get(), patches_after_first);
    assert_eq!(
        action_log::for_request(&db, &id).unwrap().len(),
        attempts_after_first
    );
    let req = change_requests::get(&db, &id).unwrap().unwrap();
    assert_eq!(req.status, ChangeStatus::Completed);
}

#[test]
fn viator_resale_end_to_end() {
    let db = init_test_db();
    let legacy = MockLegacy::with_snapshot(snapshot("BR-580254887", "KLB-555"));
    legacy.script_edits(&[EditOutcome::Unauthorized]);
    let standard = MockStandard::with_open_slot();
    let id = create_reschedule(&db, future_date());

    orchestrator(&db, &legacy, &standard).process(&id).unwrap();

    let req = change_requests::get(&db, &id).unwrap().unwrap();
    assert_eq!(req.status, ChangeStatus::Failed);
    assert_eq!(req.ota_name.as_deref(), Some("Viator"));
    assert!(!req.ota_portal_url.unwrap().is_empty());

    let destructive = action_log::for_request(&db, &id)
        .unwrap()
        .into_iter()
        .filter(|a| a.method == METHOD_CANCEL_REBOOK)
        .count();
    assert_eq!(destructive, 0);
}

#[test]
fn legacy_fallback_end_to_end_addresses_line_item() {
    let db = init_test_db();
    let legacy = MockLegacy::with_snapshot(snapshot("12345", "KLB-555"));
    let standard = MockStandard::with_open_slot(); // booking missing from standard API
    let new_date = future_date();
    let id = create_reschedule(&db, new_date);

    orchestrator(&db, &legacy, &standard).process(&id).unwrap();

    let req = change_requests::get(&db, &id).unwrap().unwrap();
    assert_eq!(req.status, ChangeStatus::Completed);
    assert_eq!(req.method.as_deref(), Some(METHOD_LEGACY_CHANGE_DATE));
    assert_eq!(standard.patch_calls.get(), 0);

    let edits = legacy.edits.borrow();
    assert_eq!(edits.len(), 1);
    let (confirmation, actions) = &edits[0];
    assert_eq!(confirmation, "KLB-555");
    match &actions[..] {
        [LegacyAction::ChangeDate {
            activity_booking_id,
            date,
            ..
        }] => {
            // Line-item id, not the parent booking id.
            assert_eq!(*activity_booking_id, 901);
            assert_ne!(*activity_booking_id, 555);
            assert_eq!(*date, new_date);
        }
        other => panic!("unexpected actions: {other:?}"),
    }
    drop(edits);

    let attempts = action_log::for_request(&db, &id).unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].method, METHOD_LEGACY_CHANGE_DATE);
    assert!(attempts[0].success);
}

#[test]
fn cancel_rebook_is_last_resort_and_flagged() {
    let db = init_test_db();
    let legacy = MockLegacy::with_snapshot(snapshot("12345", "KLB-555"));
    // date action fails, cancel succeeds, rebook succeeds
    legacy.script_edits(&[EditOutcome::Fail, EditOutcome::Ok, EditOutcome::Ok]);
    let standard = MockStandard::with_open_slot();
    let id = create_reschedule(&db, future_date());

    orchestrator(&db, &legacy, &standard).process(&id).unwrap();

    let req = change_requests::get(&db, &id).unwrap().unwrap();
    assert_eq!(req.status, ChangeStatus::Completed);
    assert_eq!(req.method.as_deref(), Some(METHOD_CANCEL_REBOOK));

    let attempts = action_log::for_request(&db, &id).unwrap();
    let methods: Vec<&str> = attempts.iter().map(|a| a.method.as_str()).collect();
    assert_eq!(methods, vec![METHOD_LEGACY_CHANGE_DATE, METHOD_CANCEL_REBOOK]);
    assert!(!attempts[0].success);
    assert!(attempts[1].success);
}

#[test]
fn cancel_rebook_partial_failure_escalates_with_before_state() {
    let db = init_test_db();
    let legacy = MockLegacy::with_snapshot(snapshot("12345", "KLB-555"));
    // date action fails, cancel succeeds, rebook fails: the severe case
    legacy.script_edits(&[EditOutcome::Fail, EditOutcome::Ok, EditOutcome::Fail]);
    let standard = MockStandard::with_open_slot();
    let id = create_reschedule(&db, future_date());

    orchestrator(&db, &legacy, &standard).process(&id).unwrap();

    let req = change_requests::get(&db, &id).unwrap().unwrap();
    assert_eq!(req.status, ChangeStatus::Failed);
    assert_eq!(req.method.as_deref(), Some(METHOD_CANCEL_REBOOK));
    let message = req.error_message.unwrap();
    assert!(message.contains("MANUAL ACTION REQUIRED"));
    assert!(message.contains("KLB-555")); // before-state is in the message

    let attempts = action_log::for_request(&db, &id).unwrap();
    let rebook_attempt = attempts
        .iter()
        .find(|a| a.method == METHOD_CANCEL_REBOOK)
        .expect("cancel_rebook attempt logged");
    assert!(!rebook_attempt.success);
    // Enough detail to recreate the booking by hand.
    let before = rebook_attempt.original_data.as_deref().unwrap();
    assert!(before.contains("\"productId\":77"));
    assert!(before.contains("\"date\":\"2026-01-15\""));
}

#[test]
fn cancel_prefers_standard_then_falls_back_to_legacy() {
    let db = init_test_db();
    let legacy = MockLegacy::with_snapshot(snapshot("12345", "KLB-555"));
    let standard = MockStandard::with_open_slot().with_booking();

    let new = NewChangeRequest {
        booking_id: 555,
        confirmation_code: "KLB-555".to_string(),
        change_type: ChangeType::Cancel,
        requested_by: "anna".to_string(),
        new_date: None,
        new_pickup_place_id: None,
        pickup_description: None,
        reason: Some("customer request".to_string()),
    };
    let id = change_requests::create(&db, &new, Utc::now().date_naive(), open_cutoff())
        .unwrap()
        .id;

    orchestrator(&db, &legacy, &standard).process(&id).unwrap();

    let req = change_requests::get(&db, &id).unwrap().unwrap();
    assert_eq!(req.status, ChangeStatus::Completed);
    assert_eq!(req.method.as_deref(), Some(METHOD_STANDARD_CANCEL));
    assert_eq!(standard.cancel_calls.get(), 1);
    assert_eq!(legacy.edit_calls(), 0);
}

#[test]
fn cancel_without_standard_resource_uses_legacy_action() {
    let db = init_test_db();
    let legacy = MockLegacy::with_snapshot(snapshot("12345", "KLB-555"));
    let standard = MockStandard::with_open_slot();

    let new = NewChangeRequest {
        booking_id: 555,
        confirmation_code: "KLB-555".to_string(),
        change_type: ChangeType::Cancel,
        requested_by: "anna".to_string(),
        new_date: None,
        new_pickup_place_id: None,
        pickup_description: None,
        reason: None,
    };
    let id = change_requests::create(&db, &new, Utc::now().date_naive(), open_cutoff())
        .unwrap()
        .id;

    orchestrator(&db, &legacy, &standard).process(&id).unwrap();

    let req = change_requests::get(&db, &id).unwrap().unwrap();
    assert_eq!(req.status, ChangeStatus::Completed);
    assert_eq!(req.method.as_deref(), Some(METHOD_LEGACY_CANCEL));

    let edits = legacy.edits.borrow();
    assert!(matches!(
        edits[0].1[0],
        LegacyAction::Cancel {
            activity_booking_id: 901,
            ..
        }
    ));
}

#[test]
fn pickup_change_is_a_single_legacy_action() {
    let db = init_test_db();
    let legacy = MockLegacy::with_snapshot(snapshot("12345", "KLB-555"));
    let standard = MockStandard::with_open_slot();

    let new = NewChangeRequest {
        booking_id: 555,
        confirmation_code: "KLB-555".to_string(),
        change_type: ChangeType::ChangePickup,
        requested_by: "anna".to_string(),
        new_date: None,
        new_pickup_place_id: Some(64),
        pickup_description: Some("Harbor office".to_string()),
        reason: None,
    };
    let id = change_requests::create(&db, &new, Utc::now().date_naive(), open_cutoff())
        .unwrap()
        .id;

    orchestrator(&db, &legacy, &standard).process(&id).unwrap();

    let req = change_requests::get(&db, &id).unwrap().unwrap();
    assert_eq!(req.status, ChangeStatus::Completed);
    assert_eq!(req.method.as_deref(), Some(METHOD_LEGACY_PICKUP));
    // Pickup change never touches the standard API or availability.
    assert_eq!(standard.products_calls.get(), 0);
    assert_eq!(standard.find_calls.get(), 0);

    let edits = legacy.edits.borrow();
    match &edits[0].1[0] {
        LegacyAction::Pickup {
            activity_booking_id,
            pickup,
            pickup_place_id,
            description,
        } => {
            assert_eq!(*activity_booking_id, 901);
            assert!(*pickup);
            assert_eq!(*pickup_place_id, 64);
            assert_eq!(description, "Harbor office");
        }
        other => panic!("unexpected action: {other:?}"),
    }
}

#[test]
fn booking_missing_upstream_is_terminal_failure() {
    let db = init_test_db();
    let legacy = MockLegacy::not_found();
    let standard = MockStandard::with_open_slot();
    let id = create_reschedule(&db, future_date());

    orchestrator(&db, &legacy, &standard).process(&id).unwrap();

    let req = change_requests::get(&db, &id).unwrap().unwrap();
    assert_eq!(req.status, ChangeStatus::Failed);
    assert!(req.error_message.unwrap().contains("not found"));
    assert!(req.failed_at.is_some());
    // Nothing was attempted, so no strategy is recorded.
    assert!(req.method.is_none());
}

#[test]
fn unmapped_product_is_a_distinct_failure() {
    let db = init_test_db();
    let legacy = MockLegacy::with_snapshot(snapshot("12345", "KLB-555"));
    let mut standard = MockStandard::with_open_slot();
    standard.products[0].internal_code = Some("9999".to_string());
    let id = create_reschedule(&db, future_date());

    orchestrator(&db, &legacy, &standard).process(&id).unwrap();

    let req = change_requests::get(&db, &id).unwrap().unwrap();
    assert_eq!(req.status, ChangeStatus::Failed);
    assert!(req
        .error_message
        .unwrap()
        .contains("not in the standard catalog"));
    assert_eq!(legacy.edit_calls(), 0);
}

#[test]
fn failed_request_records_last_attempted_method() {
    let db = init_test_db();
    let legacy = MockLegacy::with_snapshot(snapshot("12345", "KLB-555"));
    // date action fails, then the cancel half of cancel-rebook fails
    legacy.script_edits(&[EditOutcome::Fail, EditOutcome::Fail]);
    let standard = MockStandard::with_open_slot();
    let id = create_reschedule(&db, future_date());

    orchestrator(&db, &legacy, &standard).process(&id).unwrap();

    let req = change_requests::get(&db, &id).unwrap().unwrap();
    assert_eq!(req.status, ChangeStatus::Failed);
    assert_eq!(req.method.as_deref(), Some(METHOD_CANCEL_REBOOK));
}

#[test]
fn unstartable_worker_fails_the_request_instead_of_leaving_it_pending() {
    let db = init_test_db();
    let id = create_reschedule(&db, future_date());

    fail_unstarted(&db, &id, "legacy client init failed: invalid TLS configuration");

    let req = change_requests::get(&db, &id).unwrap().unwrap();
    assert_eq!(req.status, ChangeStatus::Failed);
    assert!(req.error_message.unwrap().contains("init failed"));
    assert!(req.failed_at.is_some());

    // Terminal rows are left alone on a second call.
    fail_unstarted(&db, &id, "late duplicate");
    let req = change_requests::get(&db, &id).unwrap().unwrap();
    assert!(!req.error_message.unwrap().contains("duplicate"));
}
