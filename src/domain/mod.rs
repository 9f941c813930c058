pub mod booking;
pub mod change_request;
pub mod ota;

pub use booking::BookingSnapshot;
pub use change_request::{ChangeParameters, ChangeRequest, ChangeStatus, ChangeType, NewChangeRequest};
