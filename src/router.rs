use crate::config::AppConfig;
use crate::db::connection::Database;
use crate::db::{action_log, change_requests};
use crate::domain::NewChangeRequest;
use crate::errors::{ResultResp, ServerError};
use crate::orchestrator;
use crate::responses::{html_response, json_response};
use crate::templates;
use astra::Request;
use chrono::Utc;
use std::io::Read;

pub fn handle(mut req: Request, db: &Database, config: &AppConfig) -> ResultResp {
    let method = req.method().as_str().to_string();
    let path = req.uri().path().to_string();

    match (method.as_str(), path.as_str()) {
        ("GET", "/") => {
            let requests = change_requests::list_recent(db, 100)?;
            html_response(templates::dashboard_page(&requests))
        }

        // The only write surface external callers get. Status is never
        // writable from outside; creation is what triggers processing.
        ("POST", "/change-requests") => {
            let new: NewChangeRequest = read_json(&mut req)?;
            let today = Utc::now().with_timezone(&config.operator_tz).date_naive();

            let created = change_requests::create(db, &new, today, stale_cutoff(config)?)?;
            println!(
                "📥 Change request {} created for booking {} by {}",
                created.id, created.booking_id, created.requested_by
            );
            orchestrator::spawn_worker(db, config, created.id.clone());

            json_response(
                202,
                &serde_json::json!({ "id": created.id, "status": created.status }),
            )
        }

        ("GET", "/change-requests") => {
            let requests = change_requests::list_recent(db, 100)?;
            json_response(200, &requests)
        }

        ("GET", "/change-requests/stale") => {
            let stuck = change_requests::stale_processing(db, stale_cutoff(config)?)?;
            json_response(200, &stuck)
        }

        ("GET", p) if p.starts_with("/change-requests/") => {
            let id = p.trim_start_matches("/change-requests/");
            match change_requests::get(db, id)? {
                Some(request) => json_response(200, &request),
                None => Err(ServerError::NotFound),
            }
        }

        ("GET", "/action-log") => {
            let params = parse_query(&req);
            let booking_id: i64 = params
                .get("bookingId")
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| {
                    ServerError::BadRequest("bookingId query parameter required".to_string())
                })?;
            let entries = action_log::for_booking(db, booking_id)?;
            json_response(200, &entries)
        }

        _ => Err(ServerError::NotFound),
    }
}

/// Rows open for longer than this are considered abandoned. The same
/// cutoff drives the stale view and the duplicate guard at creation.
fn stale_cutoff(config: &AppConfig) -> Result<chrono::NaiveDateTime, ServerError> {
    let stale_after =
        chrono::Duration::from_std(config.stale_after).map_err(|_| ServerError::InternalError)?;
    Ok(Utc::now().naive_utc() - stale_after)
}

fn read_json<T: serde::de::DeserializeOwned>(req: &mut Request) -> Result<T, ServerError> {
    let mut body = String::new();
    req.body_mut()
        .reader()
        .read_to_string(&mut body)
        .map_err(|e| ServerError::BadRequest(format!("unreadable body: {e}")))?;

    serde_json::from_str(&body).map_err(|e| ServerError::BadRequest(format!("invalid JSON: {e}")))
}

fn parse_query(req: &Request) -> std::collections::HashMap<String, String> {
    let mut map = std::collections::HashMap::new();

    if let Some(q) = req.uri().query() {
        for pair in q.split('&') {
            let mut parts = pair.splitn(2, '=');
            if let (Some(k), Some(v)) = (parts.next(), parts.next()) {
                map.insert(k.to_string(), v.to_string());
            }
        }
    }

    map
}
