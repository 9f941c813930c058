use std::error::Error;
use std::fmt;

/// Failure taxonomy for one orchestration run.
///
/// Display output is what staff read in the ledger, so the messages must
/// be actionable: OTA guidance beats an upstream message beats a generic
/// failure. `NoAvailability` is an expected, recoverable outcome ("pick
/// another date"), not a system fault.
#[derive(Debug)]
pub enum OrchestrationError {
    Validation(String),
    BookingNotFound(String),
    NoAvailability(String),
    ProductNotMapped(String),
    OtaRestricted {
        ota_name: String,
        portal_url: String,
        instructions: Option<String>,
    },
    Upstream(String),
    BudgetExceeded(String),
    /// Cancel succeeded, rebook failed. The one case where logging alone
    /// is not enough; the message carries the full before-state.
    PartialFailure(String),
}

impl fmt::Display for OrchestrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestrationError::Validation(msg) => write!(f, "Validation failed: {msg}"),
            OrchestrationError::BookingNotFound(msg) => write!(f, "Booking not found: {msg}"),
            OrchestrationError::NoAvailability(msg) => {
                write!(f, "No availability: {msg}. Pick another date and create a new request.")
            }
            OrchestrationError::ProductNotMapped(msg) => {
                write!(f, "Product not in the standard catalog: {msg}")
            }
            OrchestrationError::OtaRestricted {
                ota_name,
                portal_url,
                instructions,
            } => {
                write!(
                    f,
                    "This booking was resold via {ota_name} and cannot be changed here. Use the partner portal: {portal_url}"
                )?;
                if let Some(extra) = instructions {
                    write!(f, " ({extra})")?;
                }
                Ok(())
            }
            OrchestrationError::Upstream(msg) => write!(f, "Upstream failure: {msg}"),
            OrchestrationError::BudgetExceeded(msg) => {
                write!(f, "Run exceeded its time budget: {msg}")
            }
            OrchestrationError::PartialFailure(msg) => {
                write!(f, "MANUAL ACTION REQUIRED: {msg}")
            }
        }
    }
}

impl Error for OrchestrationError {}
