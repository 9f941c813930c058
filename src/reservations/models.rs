// src/reservations/models.rs
//
// Wire models for both upstream APIs. These stay at the client boundary;
// the orchestrator only ever sees BookingSnapshot and AvailabilitySlot.

use crate::domain::BookingSnapshot;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------- Legacy API ----------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacySearchResponse {
    #[serde(default)]
    pub results: Vec<LegacyBooking>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyBooking {
    pub booking_id: i64,
    #[serde(default)]
    pub external_booking_reference: Option<String>,
    pub confirmation_code: String,
    #[serde(default)]
    pub customer: Option<LegacyCustomer>,
    #[serde(default)]
    pub product_bookings: Vec<LegacyProductBooking>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyCustomer {
    #[serde(default)]
    pub full_name: Option<String>,
}

/// One line item ("product booking"). Its id is what per-item actions
/// must address, not the parent booking id.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyProductBooking {
    pub id: i64,
    pub product: LegacyProduct,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub pickup_place: Option<LegacyPickupPlace>,
}

#[derive(Debug, Deserialize)]
pub struct LegacyProduct {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct LegacyPickupPlace {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
}

impl LegacyBooking {
    /// Flatten to the orchestrator's view. Multi-item bookings are acted
    /// on one line item at a time; the change request targets the first.
    pub fn into_snapshot(self) -> Option<BookingSnapshot> {
        let line_item = self.product_bookings.into_iter().next()?;
        Some(BookingSnapshot {
            booking_id: self.booking_id,
            external_booking_reference: self.external_booking_reference.unwrap_or_default(),
            confirmation_code: self.confirmation_code,
            product_id: line_item.product.id,
            product_booking_id: line_item.id,
            current_date: line_item.start_date,
            current_pickup_place_id: line_item.pickup_place.as_ref().map(|p| p.id),
            current_pickup_place_name: line_item.pickup_place.and_then(|p| p.title),
            customer_name: self.customer.and_then(|c| c.full_name),
        })
    }
}

/// Action descriptors for the legacy edit endpoint. Serialized as elements
/// of a JSON *array*: the endpoint takes a list of actions, not an object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum LegacyAction {
    #[serde(rename = "DateAction", rename_all = "camelCase")]
    ChangeDate {
        activity_booking_id: i64,
        date: NaiveDate,
        #[serde(skip_serializing_if = "Option::is_none")]
        start_time_id: Option<i64>,
    },
    #[serde(rename = "PickupAction", rename_all = "camelCase")]
    Pickup {
        activity_booking_id: i64,
        pickup: bool,
        pickup_place_id: i64,
        description: String,
    },
    #[serde(rename = "CancelAction", rename_all = "camelCase")]
    Cancel {
        activity_booking_id: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    #[serde(rename = "RebookAction", rename_all = "camelCase")]
    Rebook {
        product_id: i64,
        date: NaiveDate,
        #[serde(skip_serializing_if = "Option::is_none")]
        pickup_place_id: Option<i64>,
    },
}

// ---------- Standard API ----------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardProduct {
    pub id: String,
    /// The supplier's own code for the product; this is where the legacy
    /// product id shows up. The two numbering schemes are otherwise
    /// unrelated.
    #[serde(default)]
    pub internal_code: Option<String>,
    #[serde(default)]
    pub options: Vec<StandardOption>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardOption {
    pub id: String,
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilitySlot {
    pub id: String,
    #[serde(default)]
    pub local_date_time_start: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub vacancies: Option<i64>,
}

impl AvailabilitySlot {
    pub fn is_open(&self) -> bool {
        match self.status.as_deref() {
            Some("AVAILABLE") | Some("FREESALE") => true,
            Some(_) => false,
            None => self.vacancies.unwrap_or(0) > 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardBooking {
    pub uuid: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub supplier_reference: Option<String>,
}
