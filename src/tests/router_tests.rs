use crate::db::change_requests;
use crate::errors::ServerError;
use crate::router::handle;
use crate::tests::utils::{init_test_db, test_config};
use astra::Body;
use chrono::Utc;
use http::{Method, Request};
use std::io::Read;

fn body_string(resp: astra::Response) -> String {
    let mut body = String::new();
    resp.into_body().reader().read_to_string(&mut body).unwrap();
    body
}

fn post_json(uri: &str, json: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(json.as_bytes().to_vec()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[test]
fn create_change_request_returns_202_with_id() {
    let db = init_test_db();
    let config = test_config();
    let new_date = Utc::now().date_naive() + chrono::Duration::days(14);

    let body = format!(
        r#"{{"bookingId":555,"confirmationCode":"KLB-555","changeType":"RESCHEDULE","newDate":"{new_date}","requestedBy":"anna"}}"#
    );
    let resp = handle(post_json("/change-requests", &body), &db, &config)
        .expect("Failed to handle request");

    assert_eq!(resp.status(), 202);
    let body = body_string(resp);
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    let id = parsed["id"].as_str().unwrap();

    // The ledger row exists; a worker was spawned for it.
    assert!(change_requests::get(&db, id).unwrap().is_some());
}

#[test]
fn create_with_past_date_is_rejected() {
    let db = init_test_db();
    let config = test_config();

    let body = r#"{"bookingId":555,"confirmationCode":"KLB-555","changeType":"RESCHEDULE","newDate":"2020-01-01","requestedBy":"anna"}"#;
    let result = handle(post_json("/change-requests", body), &db, &config);

    assert!(matches!(result, Err(ServerError::BadRequest(_))));
    assert!(change_requests::list_recent(&db, 10).unwrap().is_empty());
}

#[test]
fn create_with_invalid_json_is_rejected() {
    let db = init_test_db();
    let config = test_config();

    let result = handle(post_json("/change-requests", "{not json"), &db, &config);
    assert!(matches!(result, Err(ServerError::BadRequest(_))));
}

#[test]
fn list_change_requests_as_json() {
    let db = init_test_db();
    let config = test_config();

    let body = r#"{"bookingId":777,"confirmationCode":"KLB-777","changeType":"CANCEL","reason":"weather","requestedBy":"anna"}"#;
    handle(post_json("/change-requests", body), &db, &config).unwrap();

    let resp = handle(get("/change-requests"), &db, &config).unwrap();
    assert_eq!(resp.status(), 200);
    let body = body_string(resp);
    assert!(body.contains("\"bookingId\":777"));
    assert!(body.contains("CANCEL"));
}

#[test]
fn dashboard_renders_requests() {
    let db = init_test_db();
    let config = test_config();
    let new_date = Utc::now().date_naive() + chrono::Duration::days(14);

    let body = format!(
        r#"{{"bookingId":888,"confirmationCode":"KLB-888","changeType":"RESCHEDULE","newDate":"{new_date}","requestedBy":"anna"}}"#
    );
    handle(post_json("/change-requests", &body), &db, &config).unwrap();

    let resp = handle(get("/"), &db, &config).unwrap();
    assert_eq!(resp.status(), 200);
    let html = body_string(resp);
    assert!(html.contains("<!DOCTYPE html>"));
    assert!(html.contains("888"));
    assert!(html.contains("KLB-888"));
}

#[test]
fn get_single_request_and_unknown_id() {
    let db = init_test_db();
    let config = test_config();
    let new_date = Utc::now().date_naive() + chrono::Duration::days(14);

    let body = format!(
        r#"{{"bookingId":999,"confirmationCode":"KLB-999","changeType":"RESCHEDULE","newDate":"{new_date}","requestedBy":"anna"}}"#
    );
    let resp = handle(post_json("/change-requests", &body), &db, &config).unwrap();
    let created: serde_json::Value = serde_json::from_str(&body_string(resp)).unwrap();
    let id = created["id"].as_str().unwrap();

    let resp = handle(get(&format!("/change-requests/{id}")), &db, &config).unwrap();
    assert_eq!(resp.status(), 200);
    assert!(body_string(resp).contains("\"bookingId\":999"));

    let missing = handle(get("/change-requests/nope"), &db, &config);
    assert!(matches!(missing, Err(ServerError::NotFound)));
}

#[test]
fn stale_endpoint_returns_empty_when_all_healthy() {
    let db = init_test_db();
    let config = test_config();

    let resp = handle(get("/change-requests/stale"), &db, &config).unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(body_string(resp).trim(), "[]");
}

#[test]
fn action_log_requires_booking_id() {
    let db = init_test_db();
    let config = test_config();

    let result = handle(get("/action-log"), &db, &config);
    assert!(matches!(result, Err(ServerError::BadRequest(_))));

    let resp = handle(get("/action-log?bookingId=555"), &db, &config).unwrap();
    assert_eq!(resp.status(), 200);
}

#[test]
fn unknown_route_is_not_found() {
    let db = init_test_db();
    let config = test_config();

    let result = handle(get("/nope"), &db, &config);
    assert!(matches!(result, Err(ServerError::NotFound)));
}
