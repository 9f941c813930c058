// src/domain/change_request.rs

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// The three supported change types. Anything else goes through a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    #[serde(rename = "RESCHEDULE")]
    Reschedule,
    #[serde(rename = "CANCEL")]
    Cancel,
    #[serde(rename = "CHANGE_PICKUP")]
    ChangePickup,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Reschedule => "RESCHEDULE",
            ChangeType::Cancel => "CANCEL",
            ChangeType::ChangePickup => "CHANGE_PICKUP",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RESCHEDULE" => Some(ChangeType::Reschedule),
            "CANCEL" => Some(ChangeType::Cancel),
            "CHANGE_PICKUP" => Some(ChangeType::ChangePickup),
            _ => None,
        }
    }

    /// Action name used in the audit log.
    pub fn action_name(&self) -> &'static str {
        match self {
            ChangeType::Reschedule => "reschedule",
            ChangeType::Cancel => "cancel",
            ChangeType::ChangePickup => "change_pickup",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "PROCESSING")]
    Processing,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
}

impl ChangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeStatus::Pending => "PENDING",
            ChangeStatus::Processing => "PROCESSING",
            ChangeStatus::Completed => "COMPLETED",
            ChangeStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ChangeStatus::Pending),
            "PROCESSING" => Some(ChangeStatus::Processing),
            "COMPLETED" => Some(ChangeStatus::Completed),
            "FAILED" => Some(ChangeStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ChangeStatus::Completed | ChangeStatus::Failed)
    }
}

/// Change-type-specific payload. Immutable once the ledger row exists;
/// stored as JSON in the `parameters` column.
///
/// Untagged: the stored JSON carries only the type-specific fields, and
/// the pairing with `change_type` is validated at creation. `Cancel` must
/// stay last: its fields are all optional and it would otherwise swallow
/// the other shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChangeParameters {
    Reschedule {
        #[serde(rename = "newDate")]
        new_date: NaiveDate,
    },
    ChangePickup {
        #[serde(rename = "newPickupPlaceId")]
        new_pickup_place_id: i64,
        #[serde(rename = "pickupDescription")]
        pickup_description: Option<String>,
    },
    Cancel {
        reason: Option<String>,
    },
}

impl ChangeParameters {
    pub fn matches(&self, change_type: ChangeType) -> bool {
        matches!(
            (self, change_type),
            (ChangeParameters::Reschedule { .. }, ChangeType::Reschedule)
                | (ChangeParameters::ChangePickup { .. }, ChangeType::ChangePickup)
                | (ChangeParameters::Cancel { .. }, ChangeType::Cancel)
        )
    }
}

/// Inbound creation payload (the only write surface external callers use).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChangeRequest {
    pub booking_id: i64,
    pub confirmation_code: String,
    pub change_type: ChangeType,
    pub requested_by: String,
    #[serde(default)]
    pub new_date: Option<NaiveDate>,
    #[serde(default)]
    pub new_pickup_place_id: Option<i64>,
    #[serde(default)]
    pub pickup_description: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl NewChangeRequest {
    /// Pull the type-specific parameters out of the flat inbound shape,
    /// rejecting requests that are missing their required field.
    pub fn parameters(&self) -> Result<ChangeParameters, String> {
        match self.change_type {
            ChangeType::Reschedule => match self.new_date {
                Some(new_date) => Ok(ChangeParameters::Reschedule { new_date }),
                None => Err("newDate is required for RESCHEDULE".to_string()),
            },
            ChangeType::ChangePickup => match self.new_pickup_place_id {
                Some(new_pickup_place_id) => Ok(ChangeParameters::ChangePickup {
                    new_pickup_place_id,
                    pickup_description: self.pickup_description.clone(),
                }),
                None => Err("newPickupPlaceId is required for CHANGE_PICKUP".to_string()),
            },
            ChangeType::Cancel => Ok(ChangeParameters::Cancel {
                reason: self.reason.clone(),
            }),
        }
    }
}

/// One Request Ledger row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRequest {
    pub id: String,
    pub booking_id: i64,
    pub confirmation_code: String,
    pub change_type: ChangeType,
    pub parameters: ChangeParameters,
    pub requested_by: String,
    pub status: ChangeStatus,
    pub result_message: Option<String>,
    pub error_message: Option<String>,
    pub method: Option<String>,
    pub customer_name: Option<String>,
    pub is_ota_booking: bool,
    pub ota_name: Option<String>,
    pub ota_portal_url: Option<String>,
    pub created_at: NaiveDateTime,
    pub processing_started_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub failed_at: Option<NaiveDateTime>,
}
