// src/db/change_requests.rs
//
// The Request Ledger. Rows are inserted once, claimed once, and finished
// once; nothing here ever deletes or reopens a row.

use crate::db::connection::Database;
use crate::domain::ota::OtaClassification;
use crate::domain::{ChangeParameters, ChangeRequest, ChangeStatus, ChangeType, NewChangeRequest};
use crate::errors::ServerError;
use crate::ids::new_request_id;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Row};

const SELECT_COLUMNS: &str = "
    id, booking_id, confirmation_code, change_type, parameters, requested_by,
    status, result_message, error_message, method, customer_name,
    is_ota_booking, ota_name, ota_portal_url,
    created_at, processing_started_at, completed_at, failed_at";

fn bad_column(idx: usize, why: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        why.to_string().into(),
    )
}

fn row_to_request(row: &Row) -> rusqlite::Result<ChangeRequest> {
    let change_type_raw: String = row.get(3)?;
    let change_type = ChangeType::parse(&change_type_raw)
        .ok_or_else(|| bad_column(3, "unknown change_type"))?;

    let parameters_raw: String = row.get(4)?;
    let parameters: ChangeParameters = serde_json::from_str(&parameters_raw)
        .map_err(|e| bad_column(4, &format!("bad parameters JSON: {e}")))?;

    let status_raw: String = row.get(6)?;
    let status =
        ChangeStatus::parse(&status_raw).ok_or_else(|| bad_column(6, "unknown status"))?;

    Ok(ChangeRequest {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        confirmation_code: row.get(2)?,
        change_type,
        parameters,
        requested_by: row.get(5)?,
        status,
        result_message: row.get(7)?,
        error_message: row.get(8)?,
        method: row.get(9)?,
        customer_name: row.get(10)?,
        is_ota_booking: row.get(11)?,
        ota_name: row.get(12)?,
        ota_portal_url: row.get(13)?,
        created_at: row.get(14)?,
        processing_started_at: row.get(15)?,
        completed_at: row.get(16)?,
        failed_at: row.get(17)?,
    })
}

/// Create a ledger entry. This is the synchronous validation gate: bad
/// requests are rejected here, before any upstream work starts.
///
/// `today` is "today" in the operator's timezone, supplied by the caller.
/// `stale_cutoff` is the instant before which an open row counts as
/// abandoned; abandoned rows stop blocking new requests for the booking.
pub fn create(
    db: &Database,
    new: &NewChangeRequest,
    today: NaiveDate,
    stale_cutoff: NaiveDateTime,
) -> Result<ChangeRequest, ServerError> {
    let parameters = new
        .parameters()
        .map_err(ServerError::BadRequest)?;

    if let ChangeParameters::Reschedule { new_date } = &parameters {
        if *new_date < today {
            return Err(ServerError::BadRequest(format!(
                "newDate {new_date} is in the past (operator-local today is {today})"
            )));
        }
    }

    let id = new_request_id();
    let now = Utc::now().naive_utc();
    let parameters_json = serde_json::to_string(&parameters)
        .map_err(|e| ServerError::DbError(e.to_string()))?;

    db.with_conn(|conn| {
        let tx = conn
            .transaction()
            .map_err(|e| ServerError::DbError(e.to_string()))?;

        // Same-booking serialization happens here, at the creation
        // boundary, not inside the orchestrator. Rows stuck past the
        // stale threshold (their worker died) stop counting as open,
        // otherwise one crash would lock the booking out forever.
        let open: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM change_requests
                 WHERE booking_id = ?1
                   AND ((status = 'PENDING' AND created_at >= ?2)
                        OR (status = 'PROCESSING' AND processing_started_at >= ?2))",
                params![new.booking_id, stale_cutoff],
                |r| r.get(0),
            )
            .map_err(|e| ServerError::DbError(e.to_string()))?;
        if open > 0 {
            return Err(ServerError::Conflict(format!(
                "booking {} already has an open change request",
                new.booking_id
            )));
        }

        tx.execute(
            "INSERT INTO change_requests
                (id, booking_id, confirmation_code, change_type, parameters,
                 requested_by, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'PENDING', ?7)",
            params![
                id,
                new.booking_id,
                new.confirmation_code,
                new.change_type.as_str(),
                parameters_json,
                new.requested_by,
                now
            ],
        )
        .map_err(|e| ServerError::DbError(e.to_string()))?;

        tx.commit().map_err(|e| ServerError::DbError(e.to_string()))?;
        Ok(())
    })?;

    Ok(ChangeRequest {
        id,
        booking_id: new.booking_id,
        confirmation_code: new.confirmation_code.clone(),
        change_type: new.change_type,
        parameters,
        requested_by: new.requested_by.clone(),
        status: ChangeStatus::Pending,
        result_message: None,
        error_message: None,
        method: None,
        customer_name: None,
        is_ota_booking: false,
        ota_name: None,
        ota_portal_url: None,
        created_at: now,
        processing_started_at: None,
        completed_at: None,
        failed_at: None,
    })
}

pub fn get(db: &Database, id: &str) -> Result<Option<ChangeRequest>, ServerError> {
    db.with_conn(|conn| {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM change_requests WHERE id = ?1");
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| ServerError::DbError(e.to_string()))?;
        let mut rows = stmt
            .query_map(params![id], row_to_request)
            .map_err(|e| ServerError::DbError(e.to_string()))?;
        match rows.next() {
            Some(r) => Ok(Some(r.map_err(|e| ServerError::DbError(e.to_string()))?)),
            None => Ok(None),
        }
    })
}

/// Atomically claim a PENDING request for processing. Returns false when
/// the row was already claimed or is terminal, and the caller must then do
/// nothing (this is the exactly-once guard).
pub fn claim(db: &Database, id: &str, now: NaiveDateTime) -> Result<bool, ServerError> {
    db.with_conn(|conn| {
        let changed = conn
            .execute(
                "UPDATE change_requests
                 SET status = 'PROCESSING', processing_started_at = ?2
                 WHERE id = ?1 AND status = 'PENDING'",
                params![id, now],
            )
            .map_err(|e| ServerError::DbError(e.to_string()))?;
        Ok(changed > 0)
    })
}

/// Record what the freshly fetched snapshot and classifier said about the
/// booking. Informational columns only; status is untouched.
pub fn record_booking_context(
    db: &Database,
    id: &str,
    customer_name: Option<&str>,
    classification: &OtaClassification,
) -> Result<(), ServerError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE change_requests
             SET customer_name = ?2, is_ota_booking = ?3, ota_name = ?4, ota_portal_url = ?5
             WHERE id = ?1",
            params![
                id,
                customer_name,
                classification.is_ota,
                classification.ota_name,
                classification.portal_url
            ],
        )
        .map_err(|e| ServerError::DbError(e.to_string()))?;
        Ok(())
    })
}

pub fn complete(
    db: &Database,
    id: &str,
    method: &str,
    result_message: &str,
    now: NaiveDateTime,
) -> Result<(), ServerError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE change_requests
             SET status = 'COMPLETED', method = ?2, result_message = ?3, completed_at = ?4
             WHERE id = ?1 AND status = 'PROCESSING'",
            params![id, method, result_message, now],
        )
        .map_err(|e| ServerError::DbError(e.to_string()))?;
        Ok(())
    })
}

pub fn fail(
    db: &Database,
    id: &str,
    error_message: &str,
    method: Option<&str>,
    now: NaiveDateTime,
) -> Result<(), ServerError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE change_requests
             SET status = 'FAILED', method = ?2, error_message = ?3, failed_at = ?4
             WHERE id = ?1 AND status = 'PROCESSING'",
            params![id, method, error_message, now],
        )
        .map_err(|e| ServerError::DbError(e.to_string()))?;
        Ok(())
    })
}

pub fn list_recent(db: &Database, limit: i64) -> Result<Vec<ChangeRequest>, ServerError> {
    db.with_conn(|conn| {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM change_requests ORDER BY created_at DESC LIMIT ?1"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| ServerError::DbError(e.to_string()))?;
        let rows = stmt
            .query_map(params![limit], row_to_request)
            .map_err(|e| ServerError::DbError(e.to_string()))?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r.map_err(|e| ServerError::DbError(e.to_string()))?);
        }
        Ok(out)
    })
}

/// PROCESSING rows whose worker presumably died. Surfaced for manual
/// re-creation; never auto-expired (an expiry would race a slow worker).
pub fn stale_processing(
    db: &Database,
    cutoff: NaiveDateTime,
) -> Result<Vec<ChangeRequest>, ServerError> {
    db.with_conn(|conn| {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM change_requests
             WHERE status = 'PROCESSING' AND processing_started_at < ?1
             ORDER BY processing_started_at ASC"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| ServerError::DbError(e.to_string()))?;
        let rows = stmt
            .query_map(params![cutoff], row_to_request)
            .map_err(|e| ServerError::DbError(e.to_string()))?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r.map_err(|e| ServerError::DbError(e.to_string()))?);
        }
        Ok(out)
    })
}
