// src/orchestrator/orchestrator.rs
//
// The per-request state machine: PENDING -> PROCESSING -> COMPLETED | FAILED.
// One run per ChangeRequest, no in-run retries; retrying is a new request.

use crate::db::connection::Database;
use crate::db::{action_log, change_requests};
use crate::domain::ota::{self, OtaClassification};
use crate::domain::{BookingSnapshot, ChangeParameters, ChangeRequest, ChangeType};
use crate::errors::ServerError;
use crate::orchestrator::availability::AvailabilityResolver;
use crate::orchestrator::OrchestrationError;
use crate::reservations::models::{LegacyAction, StandardBooking};
use crate::reservations::{LegacyApi, ReservationError, StandardApi};
use chrono::{FixedOffset, Utc};
use serde_json::json;
use std::time::{Duration, Instant};

pub const METHOD_STANDARD_PATCH: &str = "standard_patch";
pub const METHOD_LEGACY_CHANGE_DATE: &str = "legacy_change_date_action";
pub const METHOD_CANCEL_REBOOK: &str = "cancel_rebook";
pub const METHOD_STANDARD_CANCEL: &str = "standard_cancel";
pub const METHOD_LEGACY_CANCEL: &str = "legacy_cancel_action";
pub const METHOD_LEGACY_PICKUP: &str = "legacy_pickup_action";

struct Success {
    method: &'static str,
    message: String,
}

/// A run failure, carrying the last strategy actually attempted so the
/// ledger's `method` column stays meaningful on FAILED rows too.
struct RunFailure {
    method: Option<&'static str>,
    error: OrchestrationError,
}

// Failures before any strategy ran (validation, lookup, resolution)
// have no method to report.
impl From<OrchestrationError> for RunFailure {
    fn from(error: OrchestrationError) -> Self {
        Self {
            method: None,
            error,
        }
    }
}

pub struct Orchestrator<'a> {
    db: &'a Database,
    legacy: &'a dyn LegacyApi,
    standard: &'a dyn StandardApi,
    operator_tz: FixedOffset,
    run_budget: Duration,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        db: &'a Database,
        legacy: &'a dyn LegacyApi,
        standard: &'a dyn StandardApi,
        operator_tz: FixedOffset,
        run_budget: Duration,
    ) -> Self {
        Self {
            db,
            legacy,
            standard,
            operator_tz,
            run_budget,
        }
    }

    /// Run one ChangeRequest to a terminal state. Safe to call on an
    /// already-claimed or terminal request: the claim step makes that a
    /// no-op with no upstream calls and no new audit rows.
    pub fn process(&self, request_id: &str) -> Result<(), ServerError> {
        let now = Utc::now().naive_utc();
        if !change_requests::claim(self.db, request_id, now)? {
            eprintln!("⏭️ Request {request_id} already claimed or terminal, skipping");
            return Ok(());
        }

        let request = change_requests::get(self.db, request_id)?
            .ok_or_else(|| ServerError::DbError(format!("claimed request {request_id} vanished")))?;

        eprintln!(
            "🧵 Processing {} for booking {} ({})",
            request.change_type.as_str(),
            request.booking_id,
            request.id
        );

        let started = Instant::now();
        let result = match request.change_type {
            ChangeType::Reschedule => self.run_reschedule(&request, started),
            ChangeType::Cancel => self.run_cancel(&request, started),
            ChangeType::ChangePickup => self.run_change_pickup(&request, started),
        };

        let finished = Utc::now().naive_utc();
        match result {
            Ok(success) => {
                eprintln!("✅ Request {} completed via {}", request.id, success.method);
                change_requests::complete(
                    self.db,
                    &request.id,
                    success.method,
                    &success.message,
                    finished,
                )
            }
            Err(failure) => {
                eprintln!("❌ Request {} failed: {}", request.id, failure.error);
                change_requests::fail(
                    self.db,
                    &request.id,
                    &failure.error.to_string(),
                    failure.method,
                    finished,
                )
            }
        }
    }

    // ---------- change-type runs ----------

    fn run_reschedule(
        &self,
        request: &ChangeRequest,
        started: Instant,
    ) -> Result<Success, RunFailure> {
        let new_date = match &request.parameters {
            ChangeParameters::Reschedule { new_date } => *new_date,
            _ => {
                return Err(OrchestrationError::Validation(
                    "reschedule request without a newDate".to_string(),
                )
                .into())
            }
        };

        // Fail fast before any upstream call.
        let today = Utc::now().with_timezone(&self.operator_tz).date_naive();
        if new_date < today {
            return Err(OrchestrationError::Validation(format!(
                "newDate {new_date} is in the past (operator-local today is {today})"
            ))
            .into());
        }

        let (snapshot, classification) = self.fetch_and_classify(request)?;

        let resolver = AvailabilityResolver::new(self.standard);
        let resolved = resolver.find_availability(snapshot.product_id, new_date)?;

        let new_state = json!({
            "date": new_date,
            "availabilityId": resolved.slot.id,
            "standardProductId": resolved.product_id,
            "standardOptionId": resolved.option_id,
        });
        let mut last_method = None;

        // Strategy a: patch the standard booking's availability reference.
        // The only atomic, fully supported path.
        self.check_budget(started, last_method)?;
        match self.attempt_on_standard_booking(
            request,
            METHOD_STANDARD_PATCH,
            &snapshot,
            &new_state,
            format!("Rescheduled to {new_date} via availability patch"),
            |booking| {
                self.standard
                    .patch_booking_availability(&booking.uuid, &resolved.slot.id)
            },
        ) {
            Ok(Some(success)) => return Ok(success),
            Ok(None) => {}
            Err(_) => last_method = Some(METHOD_STANDARD_PATCH),
        }

        // Strategy b: legacy change-date action, addressed by the
        // line-item id (not the parent booking id).
        self.check_budget(started, last_method)?;
        let action = LegacyAction::ChangeDate {
            activity_booking_id: snapshot.product_booking_id,
            date: new_date,
            start_time_id: None,
        };
        match self.attempt(
            request,
            METHOD_LEGACY_CHANGE_DATE,
            &snapshot,
            &new_state,
            format!("Rescheduled to {new_date} via legacy change-date action"),
            || self.legacy.edit_booking(&request.confirmation_code, &[action]),
        ) {
            Ok(success) => return Ok(success),
            Err(e) => {
                last_method = Some(METHOD_LEGACY_CHANGE_DATE);
                if e.is_unauthorized() && classification.is_ota {
                    // Staff must see the portal, not a 401.
                    return Err(RunFailure {
                        method: last_method,
                        error: ota_error(&classification),
                    });
                }
            }
        }

        // Strategy c: OTA bookings never get the destructive fallback.
        if classification.is_ota {
            return Err(RunFailure {
                method: last_method,
                error: ota_error(&classification),
            });
        }

        // Strategy d: cancel-then-rebook, last resort. Once the cancel
        // half lands this cannot be rolled back.
        self.check_budget(started, last_method)?;
        self.cancel_rebook(request, &snapshot, new_date, &new_state)
            .map_err(|error| RunFailure {
                method: Some(METHOD_CANCEL_REBOOK),
                error,
            })
    }

    fn run_cancel(
        &self,
        request: &ChangeRequest,
        started: Instant,
    ) -> Result<Success, RunFailure> {
        let reason = match &request.parameters {
            ChangeParameters::Cancel { reason } => reason.clone(),
            _ => {
                return Err(OrchestrationError::Validation(
                    "cancel request with wrong parameters".to_string(),
                )
                .into())
            }
        };

        let (snapshot, classification) = self.fetch_and_classify(request)?;
        let new_state = json!({ "cancelled": true, "reason": reason });
        let mut last_method = None;

        // Standard cancel, when the booking exists there.
        self.check_budget(started, last_method)?;
        match self.attempt_on_standard_booking(
            request,
            METHOD_STANDARD_CANCEL,
            &snapshot,
            &new_state,
            "Booking cancelled via the standard API".to_string(),
            |booking| self.standard.cancel_booking(&booking.uuid),
        ) {
            Ok(Some(success)) => return Ok(success),
            Ok(None) => {}
            Err(_) => last_method = Some(METHOD_STANDARD_CANCEL),
        }

        // Legacy cancel action on the line item.
        self.check_budget(started, last_method)?;
        let action = LegacyAction::Cancel {
            activity_booking_id: snapshot.product_booking_id,
            reason: reason.clone(),
        };
        match self.attempt(
            request,
            METHOD_LEGACY_CANCEL,
            &snapshot,
            &new_state,
            "Booking cancelled via legacy cancel action".to_string(),
            || self.legacy.edit_booking(&request.confirmation_code, &[action]),
        ) {
            Ok(success) => Ok(success),
            Err(e) => {
                if classification.is_ota {
                    return Err(RunFailure {
                        method: Some(METHOD_LEGACY_CANCEL),
                        error: ota_error(&classification),
                    });
                }
                Err(RunFailure {
                    method: Some(METHOD_LEGACY_CANCEL),
                    error: OrchestrationError::Upstream(e.to_string()),
                })
            }
        }
    }

    fn run_change_pickup(
        &self,
        request: &ChangeRequest,
        started: Instant,
    ) -> Result<Success, RunFailure> {
        let (new_pickup_place_id, description) = match &request.parameters {
            ChangeParameters::ChangePickup {
                new_pickup_place_id,
                pickup_description,
            } => (*new_pickup_place_id, pickup_description.clone()),
            _ => {
                return Err(OrchestrationError::Validation(
                    "pickup request without a newPickupPlaceId".to_string(),
                )
                .into())
            }
        };

        let (snapshot, classification) = self.fetch_and_classify(request)?;
        let description = description.unwrap_or_else(|| "Updated by operations".to_string());
        let new_state = json!({
            "pickupPlaceId": new_pickup_place_id,
            "description": description,
        });

        self.check_budget(started, None)?;
        let action = LegacyAction::Pickup {
            activity_booking_id: snapshot.product_booking_id,
            pickup: true,
            pickup_place_id: new_pickup_place_id,
            description,
        };
        match self.attempt(
            request,
            METHOD_LEGACY_PICKUP,
            &snapshot,
            &new_state,
            format!("Pickup changed to place {new_pickup_place_id}"),
            || self.legacy.edit_booking(&request.confirmation_code, &[action]),
        ) {
            Ok(success) => Ok(success),
            Err(e) => {
                if classification.is_ota {
                    return Err(RunFailure {
                        method: Some(METHOD_LEGACY_PICKUP),
                        error: ota_error(&classification),
                    });
                }
                Err(RunFailure {
                    method: Some(METHOD_LEGACY_PICKUP),
                    error: OrchestrationError::Upstream(e.to_string()),
                })
            }
        }
    }

    // ---------- shared steps ----------

    /// Snapshot is fetched fresh every run and never cached; the ledger
    /// row picks up the customer name and classifier verdict right away
    /// so even a failed run shows staff what they are looking at.
    fn fetch_and_classify(
        &self,
        request: &ChangeRequest,
    ) -> Result<(BookingSnapshot, OtaClassification), OrchestrationError> {
        let snapshot = self
            .legacy
            .get_booking(request.booking_id)
            .map_err(|e| match e {
                ReservationError::NotFound(msg) => OrchestrationError::BookingNotFound(msg),
                other => OrchestrationError::Upstream(other.to_string()),
            })?;

        let classification = ota::classify(&snapshot);
        if classification.is_ota {
            eprintln!(
                "🏷️ Booking {} resold via {}",
                request.booking_id,
                classification.ota_name.as_deref().unwrap_or("?")
            );
        }

        if let Err(e) = change_requests::record_booking_context(
            self.db,
            &request.id,
            snapshot.customer_name.as_deref(),
            &classification,
        ) {
            eprintln!("⚠️ Failed to record booking context for {}: {e}", request.id);
        }

        Ok((snapshot, classification))
    }

    /// Run one strategy call and log the attempt, success or failure.
    /// The error is handed back so the walk can decide whether the next
    /// strategy runs.
    fn attempt(
        &self,
        request: &ChangeRequest,
        method: &'static str,
        snapshot: &BookingSnapshot,
        new_state: &serde_json::Value,
        message: String,
        call: impl FnOnce() -> Result<(), ReservationError>,
    ) -> Result<Success, ReservationError> {
        match call() {
            Ok(()) => {
                self.log_attempt(request, method, snapshot, new_state, true, None);
                Ok(Success { method, message })
            }
            Err(e) => {
                self.log_attempt(request, method, snapshot, new_state, false, Some(&e.to_string()));
                Err(e)
            }
        }
    }

    /// Like `attempt`, but for strategies acting on the standard booking
    /// resource: when the booking never existed in the standard system
    /// the strategy skips silently (`Ok(None)`, no audit row).
    fn attempt_on_standard_booking(
        &self,
        request: &ChangeRequest,
        method: &'static str,
        snapshot: &BookingSnapshot,
        new_state: &serde_json::Value,
        message: String,
        act: impl FnOnce(&StandardBooking) -> Result<(), ReservationError>,
    ) -> Result<Option<Success>, ReservationError> {
        let booking = match self.standard.find_booking(&request.confirmation_code) {
            Ok(Some(booking)) => booking,
            // Not a failure: plenty of legacy bookings never existed in
            // the standard system. Fall through to the legacy action.
            Ok(None) => return Ok(None),
            Err(e) => {
                self.log_attempt(request, method, snapshot, new_state, false, Some(&e.to_string()));
                return Err(e);
            }
        };
        self.attempt(request, method, snapshot, new_state, message, || {
            act(&booking)
        })
        .map(Some)
    }

    /// Cancel the legacy line item, then rebook the product on the new
    /// date. A rebook failure after a successful cancel is the one case
    /// where logging alone is not enough.
    fn cancel_rebook(
        &self,
        request: &ChangeRequest,
        snapshot: &BookingSnapshot,
        new_date: chrono::NaiveDate,
        new_state: &serde_json::Value,
    ) -> Result<Success, OrchestrationError> {
        let cancel = LegacyAction::Cancel {
            activity_booking_id: snapshot.product_booking_id,
            reason: Some(format!("Rebooking onto {new_date}")),
        };
        if let Err(e) = self
            .legacy
            .edit_booking(&request.confirmation_code, &[cancel])
        {
            self.log_attempt(
                request,
                METHOD_CANCEL_REBOOK,
                snapshot,
                new_state,
                false,
                Some(&format!("cancel half failed: {e}")),
            );
            return Err(OrchestrationError::Upstream(e.to_string()));
        }

        let rebook = LegacyAction::Rebook {
            product_id: snapshot.product_id,
            date: new_date,
            pickup_place_id: snapshot.current_pickup_place_id,
        };
        match self
            .legacy
            .edit_booking(&request.confirmation_code, &[rebook])
        {
            Ok(()) => {
                self.log_attempt(request, METHOD_CANCEL_REBOOK, snapshot, new_state, true, None);
                Ok(Success {
                    method: METHOD_CANCEL_REBOOK,
                    message: format!("Rescheduled to {new_date} via cancel + rebook"),
                })
            }
            Err(e) => {
                let before = snapshot.before_state();
                self.log_attempt(
                    request,
                    METHOD_CANCEL_REBOOK,
                    snapshot,
                    new_state,
                    false,
                    Some(&format!("rebook half failed after cancel succeeded: {e}")),
                );
                eprintln!(
                    "🚨 ESCALATION: booking {} cancelled but rebook failed, recreate manually from {}",
                    snapshot.booking_id, before
                );
                Err(OrchestrationError::PartialFailure(format!(
                    "booking {} was cancelled but the rebook onto {new_date} failed ({e}). Recreate it manually; original state: {before}",
                    snapshot.booking_id
                )))
            }
        }
    }

    fn check_budget(
        &self,
        started: Instant,
        last_method: Option<&'static str>,
    ) -> Result<(), RunFailure> {
        if started.elapsed() > self.run_budget {
            return Err(RunFailure {
                method: last_method,
                error: OrchestrationError::BudgetExceeded(format!(
                    "{:?} elapsed, budget is {:?}",
                    started.elapsed(),
                    self.run_budget
                )),
            });
        }
        Ok(())
    }

    fn log_attempt(
        &self,
        request: &ChangeRequest,
        method: &str,
        snapshot: &BookingSnapshot,
        new_state: &serde_json::Value,
        success: bool,
        error: Option<&str>,
    ) {
        let before = snapshot.before_state();
        let entry = action_log::NewActionLogEntry {
            booking_id: request.booking_id,
            request_id: &request.id,
            action: request.change_type.action_name(),
            method,
            performed_by: &request.requested_by,
            original_data: Some(&before),
            new_data: Some(new_state),
            success,
            error_message: error,
        };
        // Audit writes must not mask the strategy outcome.
        if let Err(e) = action_log::append(self.db, &entry) {
            eprintln!("⚠️ Action log write failed for {}: {e}", request.id);
        }
    }
}

fn ota_error(classification: &OtaClassification) -> OrchestrationError {
    OrchestrationError::OtaRestricted {
        ota_name: classification
            .ota_name
            .clone()
            .unwrap_or_else(|| "an online travel agent".to_string()),
        portal_url: classification.portal_url.clone().unwrap_or_default(),
        instructions: classification.instructions.clone(),
    }
}
