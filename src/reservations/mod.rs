mod error;
pub mod legacy;
pub mod models;
pub mod signing;
pub mod standard;

pub use error::ReservationError;
pub use legacy::LegacyClient;
pub use standard::StandardClient;

use crate::domain::BookingSnapshot;
use chrono::NaiveDate;
use models::{AvailabilitySlot, LegacyAction, StandardBooking, StandardProduct};

/// Narrow contract over the legacy signed API. The orchestrator and its
/// tests depend on this, not on reqwest.
pub trait LegacyApi {
    /// Search by numeric booking id and flatten to a fresh snapshot.
    fn get_booking(&self, booking_id: i64) -> Result<BookingSnapshot, ReservationError>;

    /// Apply an array of action descriptors to a booking.
    fn edit_booking(
        &self,
        confirmation_code: &str,
        actions: &[LegacyAction],
    ) -> Result<(), ReservationError>;
}

/// Narrow contract over the standard token-authenticated API.
pub trait StandardApi {
    fn products(&self) -> Result<Vec<StandardProduct>, ReservationError>;

    fn availability(
        &self,
        product_id: &str,
        option_id: &str,
        local_date: NaiveDate,
    ) -> Result<Vec<AvailabilitySlot>, ReservationError>;

    /// Locate the booking resource matching a legacy confirmation code.
    /// Not every legacy booking exists here; `None` is a normal answer.
    fn find_booking(&self, supplier_reference: &str)
        -> Result<Option<StandardBooking>, ReservationError>;

    /// The standard API has no reschedule verb; a reschedule is a patch
    /// of the booking's availability reference.
    fn patch_booking_availability(
        &self,
        uuid: &str,
        availability_id: &str,
    ) -> Result<(), ReservationError>;

    fn cancel_booking(&self, uuid: &str) -> Result<(), ReservationError>;
}
