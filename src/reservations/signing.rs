// src/reservations/signing.rs
//
// Legacy API request signing: base64(HMAC-SHA256(secret, ts + key + method + path)).
// No replay protection beyond timestamp freshness, so the signing clock
// must stay in sync with the upstream.

use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Timestamp format the legacy API expects, always UTC.
pub fn timestamp_now() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Canonical string: timestamp, access key, HTTP method, path, in that
/// order, no separators.
pub fn canonical_string(timestamp: &str, access_key: &str, method: &str, path: &str) -> String {
    format!("{timestamp}{access_key}{method}{path}")
}

pub fn sign(
    secret_key: &str,
    timestamp: &str,
    access_key: &str,
    method: &str,
    path: &str,
) -> String {
    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(canonical_string(timestamp, access_key, method, path).as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}
