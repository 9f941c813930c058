// src/reservations/legacy.rs

use crate::config::LegacyCredentials;
use crate::domain::BookingSnapshot;
use crate::reservations::models::{LegacyAction, LegacySearchResponse};
use crate::reservations::signing;
use crate::reservations::{LegacyApi, ReservationError};
use reqwest::blocking::Client;
use serde_json::json;
use std::time::Duration;

/// Client for the operator's original booking API. Every request carries
/// an HMAC signature over timestamp + access key + method + path.
pub struct LegacyClient {
    client: Client,
    base_url: String,
    credentials: LegacyCredentials,
}

impl LegacyClient {
    pub fn new(
        base_url: impl Into<String>,
        credentials: LegacyCredentials,
        timeout: Duration,
    ) -> Result<Self, ReservationError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReservationError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            credentials,
        })
    }

    fn post(&self, path: &str, body: &serde_json::Value) -> Result<String, ReservationError> {
        let timestamp = signing::timestamp_now();
        let signature = signing::sign(
            &self.credentials.secret_key,
            &timestamp,
            &self.credentials.access_key,
            "POST",
            path,
        );

        let resp = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("X-Access-Key", &self.credentials.access_key)
            .header("X-Timestamp", &timestamp)
            .header("X-Signature", &signature)
            .json(body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    ReservationError::Network(format!("legacy API timed out: {e}"))
                } else {
                    ReservationError::Network(e.to_string())
                }
            })?;

        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| ReservationError::Network(e.to_string()))?;

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ReservationError::Unauthorized(format!(
                "legacy API {status}: {text}"
            )));
        }
        if status.as_u16() == 404 {
            return Err(ReservationError::NotFound(format!(
                "legacy API {status}: {text}"
            )));
        }
        if !status.is_success() {
            return Err(ReservationError::Upstream(format!(
                "legacy API {status}: {text}"
            )));
        }

        Ok(text)
    }
}

impl LegacyApi for LegacyClient {
    fn get_booking(&self, booking_id: i64) -> Result<BookingSnapshot, ReservationError> {
        let body = json!({ "bookingId": booking_id });
        let text = self.post("/booking.json/search", &body)?;

        let parsed: LegacySearchResponse =
            serde_json::from_str(&text).map_err(|e| ReservationError::Decode(e.to_string()))?;

        let booking = parsed
            .results
            .into_iter()
            .find(|b| b.booking_id == booking_id)
            .ok_or_else(|| {
                ReservationError::NotFound(format!("booking {booking_id} not found upstream"))
            })?;

        booking.into_snapshot().ok_or_else(|| {
            ReservationError::Decode(format!("booking {booking_id} has no product bookings"))
        })
    }

    fn edit_booking(
        &self,
        confirmation_code: &str,
        actions: &[LegacyAction],
    ) -> Result<(), ReservationError> {
        // The edit endpoint takes a JSON array of action descriptors.
        let body = serde_json::to_value(actions)
            .map_err(|e| ReservationError::Decode(e.to_string()))?;
        self.post(&format!("/booking.json/{confirmation_code}/edit"), &body)?;
        Ok(())
    }
}
