// src/reservations/standard.rs

use crate::config::StandardCredentials;
use crate::reservations::models::{AvailabilitySlot, StandardBooking, StandardProduct};
use crate::reservations::{ReservationError, StandardApi};
use chrono::NaiveDate;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde_json::json;
use std::time::Duration;

/// Client for the normalized, bearer-token booking API.
pub struct StandardClient {
    client: Client,
    base_url: String,
    credentials: StandardCredentials,
}

impl StandardClient {
    pub fn new(
        base_url: impl Into<String>,
        credentials: StandardCredentials,
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

    fn send(&self, req: RequestBuilder) -> Result<Response, ReservationError> {
        req.bearer_auth(&self.credentials.api_token)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    ReservationError::Network(format!("standard API timed out: {e}"))
                } else {
                    ReservationError::Network(e.to_string())
                }
            })
    }

    fn check(resp: Response) -> Result<String, ReservationError> {
        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| ReservationError::Network(e.to_string()))?;

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ReservationError::Unauthorized(format!(
                "standard API {status}: {text}"
            )));
        }
        if status.as_u16() == 404 {
            return Err(ReservationError::NotFound(format!(
                "standard API {status}: {text}"
            )));
        }
        if !status.is_success() {
            return Err(ReservationError::Upstream(format!(
                "standard API {status}: {text}"
            )));
        }
        Ok(text)
    }

    fn decode<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, ReservationError> {
        serde_json::from_str(text).map_err(|e| ReservationError::Decode(e.to_string()))
    }
}

impl StandardApi for StandardClient {
    fn products(&self) -> Result<Vec<StandardProduct>, ReservationError> {
        let resp = self.send(self.client.get(format!("{}/products", self.base_url)))?;
        Self::decode(&Self::check(resp)?)
    }

    fn availability(
        &self,
        product_id: &str,
        option_id: &str,
        local_date: NaiveDate,
    ) -> Result<Vec<AvailabilitySlot>, ReservationError> {
        let body = json!({
            "productId": product_id,
            "optionId": option_id,
            "localDate": local_date,
        });
        let resp = self.send(
            self.client
                .post(format!("{}/availability", self.base_url))
                .json(&body),
        )?;
        Self::decode(&Self::check(resp)?)
    }

    fn find_booking(
        &self,
        supplier_reference: &str,
    ) -> Result<Option<StandardBooking>, ReservationError> {
        let resp = self.send(
            self.client
                .get(format!("{}/bookings", self.base_url))
                .query(&[("supplierReference", supplier_reference)]),
        )?;
        let bookings: Vec<StandardBooking> = Self::decode(&Self::check(resp)?)?;
        Ok(bookings.into_iter().next())
    }

    fn patch_booking_availability(
        &self,
        uuid: &str,
        availability_id: &str,
    ) -> Result<(), ReservationError> {
        let body = json!({ "availabilityId": availability_id });
        let resp = self.send(
            self.client
                .patch(format!("{}/bookings/{uuid}", self.base_url))
                .json(&body),
        )?;
        Self::check(resp)?;
        Ok(())
    }

    fn cancel_booking(&self, uuid: &str) -> Result<(), ReservationError> {
        let resp = self.send(
            self.client
                .delete(format!("{}/bookings/{uuid}", self.base_url)),
        )?;
        Self::check(resp)?;
        Ok(())
    }
}
