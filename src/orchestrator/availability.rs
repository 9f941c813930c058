// src/orchestrator/availability.rs

use crate::orchestrator::OrchestrationError;
use crate::reservations::models::AvailabilitySlot;
use crate::reservations::StandardApi;
use chrono::NaiveDate;

/// A slot resolved in the standard API's identifier space.
#[derive(Debug, Clone)]
pub struct ResolvedAvailability {
    pub product_id: String,
    pub option_id: String,
    pub slot: AvailabilitySlot,
}

/// Maps the legacy product id into the standard API's product/option ids
/// and picks a candidate slot. Stateless; availability is
/// time-sensitive and must be re-queried every run.
pub struct AvailabilityResolver<'a> {
    standard: &'a dyn StandardApi,
}

impl<'a> AvailabilityResolver<'a> {
    pub fn new(standard: &'a dyn StandardApi) -> Self {
        Self { standard }
    }

    /// Cross-reference the legacy product id against the standard catalog
    /// (the two numbering schemes are unrelated; the join key is the
    /// product's `internalCode`), then return the first open slot for the
    /// target date.
    pub fn find_availability(
        &self,
        legacy_product_id: i64,
        date: NaiveDate,
    ) -> Result<ResolvedAvailability, OrchestrationError> {
        let products = self
            .standard
            .products()
            .map_err(|e| OrchestrationError::Upstream(e.to_string()))?;

        let wanted = legacy_product_id.to_string();
        let product = products
            .into_iter()
            .find(|p| p.internal_code.as_deref() == Some(wanted.as_str()))
            .ok_or_else(|| {
                OrchestrationError::ProductNotMapped(format!(
                    "legacy product {legacy_product_id} has no internalCode match"
                ))
            })?;

        let option = product
            .options
            .iter()
            .find(|o| o.default)
            .or_else(|| product.options.first())
            .ok_or_else(|| {
                OrchestrationError::ProductNotMapped(format!(
                    "standard product {} has no options",
                    product.id
                ))
            })?;

        let slots = self
            .standard
            .availability(&product.id, &option.id, date)
            .map_err(|e| OrchestrationError::Upstream(e.to_string()))?;

        let slot = slots.into_iter().find(|s| s.is_open()).ok_or_else(|| {
            OrchestrationError::NoAvailability(format!(
                "no open slots on {date} for product {}",
                product.id
            ))
        })?;

        Ok(ResolvedAvailability {
            product_id: product.id,
            option_id: option.id.clone(),
            slot,
        })
    }
}
