// src/db/action_log.rs
//
// Append-only audit trail. One row per orchestrator strategy attempt,
// failures included; rows are never updated.

use crate::db::connection::Database;
use crate::errors::ServerError;
use chrono::{NaiveDateTime, Utc};
use rusqlite::params;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionLogEntry {
    pub id: i64,
    pub booking_id: i64,
    pub request_id: String,
    pub action: String,
    pub method: String,
    pub performed_by: String,
    pub performed_at: NaiveDateTime,
    pub original_data: Option<String>,
    pub new_data: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
}

pub struct NewActionLogEntry<'a> {
    pub booking_id: i64,
    pub request_id: &'a str,
    pub action: &'a str,
    pub method: &'a str,
    pub performed_by: &'a str,
    pub original_data: Option<&'a serde_json::Value>,
    pub new_data: Option<&'a serde_json::Value>,
    pub success: bool,
    pub error_message: Option<&'a str>,
}

pub fn append(db: &Database, entry: &NewActionLogEntry) -> Result<(), ServerError> {
    let now = Utc::now().naive_utc();
    let original = entry.original_data.map(|v| v.to_string());
    let new = entry.new_data.map(|v| v.to_string());

    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO action_log
                (booking_id, request_id, action, method, performed_by, performed_at,
                 original_data, new_data, success, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                entry.booking_id,
                entry.request_id,
                entry.action,
                entry.method,
                entry.performed_by,
                now,
                original,
                new,
                entry.success,
                entry.error_message
            ],
        )
        .map_err(|e| ServerError::DbError(e.to_string()))?;
        Ok(())
    })
}

pub fn for_booking(db: &Database, booking_id: i64) -> Result<Vec<ActionLogEntry>, ServerError> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare(
                "SELECT id, booking_id, request_id, action, method, performed_by,
                        performed_at, original_data, new_data, success, error_message
                 FROM action_log
                 WHERE booking_id = ?1
                 ORDER BY performed_at ASC, id ASC",
            )
            .map_err(|e| ServerError::DbError(e.to_string()))?;

        let rows = stmt
            .query_map(params![booking_id], |row| {
                Ok(ActionLogEntry {
                    id: row.get(0)?,
                    booking_id: row.get(1)?,
                    request_id: row.get(2)?,
                    action: row.get(3)?,
                    method: row.get(4)?,
                    performed_by: row.get(5)?,
                    performed_at: row.get(6)?,
                    original_data: row.get(7)?,
                    new_data: row.get(8)?,
                    success: row.get(9)?,
                    error_message: row.get(10)?,
                })
            })
            .map_err(|e| ServerError::DbError(e.to_string()))?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r.map_err(|e| ServerError::DbError(e.to_string()))?);
        }
        Ok(out)
    })
}

/// Attempts recorded for one ledger entry, oldest first.
pub fn for_request(db: &Database, request_id: &str) -> Result<Vec<ActionLogEntry>, ServerError> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare(
                "SELECT id, booking_id, request_id, action, method, performed_by,
                        performed_at, original_data, new_data, success, error_message
                 FROM action_log
                 WHERE request_id = ?1
                 ORDER BY id ASC",
            )
            .map_err(|e| ServerError::DbError(e.to_string()))?;

        let rows = stmt
            .query_map(params![request_id], |row| {
                Ok(ActionLogEntry {
                    id: row.get(0)?,
                    booking_id: row.get(1)?,
                    request_id: row.get(2)?,
                    action: row.get(3)?,
                    method: row.get(4)?,
                    performed_by: row.get(5)?,
                    performed_at: row.get(6)?,
                    original_data: row.get(7)?,
                    new_data: row.get(8)?,
                    success: row.get(9)?,
                    error_message: row.get(10)?,
                })
            })
            .map_err(|e| ServerError::DbError(e.to_string()))?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r.map_err(|e| ServerError::DbError(e.to_string()))?);
        }
        Ok(out)
    })
}
