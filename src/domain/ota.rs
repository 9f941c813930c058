// src/domain/ota.rs

use crate::domain::BookingSnapshot;

/// Outcome of OTA classification. Informational only: it tells staff
/// which manual portal to use when the APIs refuse the change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtaClassification {
    pub is_ota: bool,
    pub ota_name: Option<String>,
    pub portal_url: Option<String>,
    pub instructions: Option<String>,
}

impl OtaClassification {
    fn direct() -> Self {
        Self {
            is_ota: false,
            ota_name: None,
            portal_url: None,
            instructions: None,
        }
    }
}

struct OtaChannel {
    name: &'static str,
    /// Prefixes seen on the external booking reference.
    reference_prefixes: &'static [&'static str],
    /// Prefixes seen on the confirmation code.
    confirmation_prefixes: &'static [&'static str],
    portal_url: &'static str,
    instructions: &'static str,
}

/// Known resale channels. Neither reservation API accepts programmatic
/// changes for these; staff must use the channel's own supplier portal.
const OTA_CHANNELS: &[OtaChannel] = &[
    OtaChannel {
        name: "Viator",
        reference_prefixes: &["BR-"],
        confirmation_prefixes: &["VTR-"],
        portal_url: "https://supplier.viator.com/bookings",
        instructions: "Amend the booking in the Viator supplier portal, then reply to the customer.",
    },
    OtaChannel {
        name: "GetYourGuide",
        reference_prefixes: &["GYG"],
        confirmation_prefixes: &["GYG-"],
        portal_url: "https://supplier.getyourguide.com/bookings",
        instructions: "Use the GetYourGuide supplier portal; changes made there sync back overnight.",
    },
    OtaChannel {
        name: "Expedia",
        reference_prefixes: &["EXP-"],
        confirmation_prefixes: &["EXP-"],
        portal_url: "https://apps.expediapartnercentral.com",
        instructions: "Amend via Expedia Partner Central and confirm the traveler was notified.",
    },
];

/// Pure classification over the snapshot's reference/confirmation prefixes.
/// No side effects, no network; safe to call any number of times per run.
/// Unknown patterns classify as not-OTA (direct booking).
pub fn classify(snapshot: &BookingSnapshot) -> OtaClassification {
    for channel in OTA_CHANNELS {
        let matches_reference = channel
            .reference_prefixes
            .iter()
            .any(|p| snapshot.external_booking_reference.starts_with(p));
        let matches_confirmation = channel
            .confirmation_prefixes
            .iter()
            .any(|p| snapshot.confirmation_code.starts_with(p));

        if matches_reference || matches_confirmation {
            return OtaClassification {
                is_ota: true,
                ota_name: Some(channel.name.to_string()),
                portal_url: Some(channel.portal_url.to_string()),
                instructions: Some(channel.instructions.to_string()),
            };
        }
    }
    OtaClassification::direct()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn snapshot(reference: &str, confirmation: &str) -> BookingSnapshot {
        BookingSnapshot {
            booking_id: 555,
            external_booking_reference: reference.to_string(),
            confirmation_code: confirmation.to_string(),
            product_id: 77,
            product_booking_id: 901,
            current_date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            current_pickup_place_id: None,
            current_pickup_place_name: None,
            customer_name: Some("Jo Traveler".to_string()),
        }
    }

    #[test]
    fn viator_reference_prefix_classifies_as_ota() {
        let c = classify(&snapshot("BR-580254887", "KLB-123"));
        assert!(c.is_ota);
        assert_eq!(c.ota_name.as_deref(), Some("Viator"));
        assert!(c.portal_url.as_deref().unwrap_or("").contains("viator"));
    }

    #[test]
    fn confirmation_prefix_alone_is_enough() {
        let c = classify(&snapshot("12345", "GYG-98765"));
        assert!(c.is_ota);
        assert_eq!(c.ota_name.as_deref(), Some("GetYourGuide"));
    }

    #[test]
    fn unknown_patterns_are_direct() {
        let c = classify(&snapshot("12345", "KLB-123"));
        assert!(!c.is_ota);
        assert!(c.ota_name.is_none());
        assert!(c.portal_url.is_none());
    }

    #[test]
    fn classify_is_repeatable() {
        let s = snapshot("BR-1", "KLB-1");
        assert_eq!(classify(&s), classify(&s));
    }
}
