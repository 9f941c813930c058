// src/domain/booking.rs

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;

/// Read-through view of one upstream booking line item, fetched fresh at
/// the start of every orchestration run. Never persisted or cached;
/// stale dates/pickups would make the before/after comparisons wrong.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingSnapshot {
    /// Parent booking id in the legacy system.
    pub booking_id: i64,
    pub external_booking_reference: String,
    pub confirmation_code: String,
    /// Legacy product id of the tour.
    pub product_id: i64,
    /// Line-item id ("product booking"). Per-item actions must address
    /// this id, not the parent booking id.
    pub product_booking_id: i64,
    pub current_date: NaiveDate,
    pub current_pickup_place_id: Option<i64>,
    pub current_pickup_place_name: Option<String>,
    pub customer_name: Option<String>,
}

impl BookingSnapshot {
    /// Before-state recorded in the Action Log. Carries enough to
    /// manually recreate the booking after a destructive failure.
    pub fn before_state(&self) -> serde_json::Value {
        json!({
            "bookingId": self.booking_id,
            "externalBookingReference": self.external_booking_reference,
            "confirmationCode": self.confirmation_code,
            "productId": self.product_id,
            "productBookingId": self.product_booking_id,
            "date": self.current_date,
            "pickupPlaceId": self.current_pickup_place_id,
            "pickupPlaceName": self.current_pickup_place_name,
            "customerName": self.customer_name,
        })
    }
}
