use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum ReservationError {
    Network(String),
    Unauthorized(String),
    NotFound(String),
    Upstream(String),
    Decode(String),
}

impl ReservationError {
    /// The legacy API answers 401/403 for bookings it is not allowed to
    /// touch (notably OTA resales). The orchestrator pairs this with the
    /// classifier to produce portal guidance instead of "error 401".
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ReservationError::Unauthorized(_))
    }
}

impl fmt::Display for ReservationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReservationError::Network(msg) => write!(f, "Network error: {msg}"),
            ReservationError::Unauthorized(msg) => write!(f, "Authorization rejected: {msg}"),
            ReservationError::NotFound(msg) => write!(f, "Not found upstream: {msg}"),
            ReservationError::Upstream(msg) => write!(f, "Upstream error: {msg}"),
            ReservationError::Decode(msg) => write!(f, "Response decode error: {msg}"),
        }
    }
}

impl Error for ReservationError {}
