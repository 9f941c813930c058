// src/ids.rs
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

pub const DEFAULT_ID_BYTES: usize = 16;

/// Generate an opaque ledger id using the OS RNG.
pub fn new_request_id() -> String {
    let mut rng = OsRng;
    generate_id(&mut rng, DEFAULT_ID_BYTES)
}

/// Generate a URL-safe id from random bytes.
/// - Uses Base64 URL-safe, no padding.
/// - 16 bytes -> ~22 char id.
pub fn generate_id<R: RngCore>(rng: &mut R, nbytes: usize) -> String {
    let mut buf = vec![0u8; nbytes];
    rng.fill_bytes(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}
