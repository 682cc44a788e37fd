//! Inbound delivery signatures.
//!
//! Shopify signs each delivery with HMAC-SHA256 over the raw request body,
//! keyed by the app's shared secret, and sends the base64 digest in
//! `X-Shopify-Hmac-Sha256`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Computes the base64 HMAC-SHA256 digest of `body`.
///
/// Returns `None` only if the key is rejected, which HMAC-SHA256 never does.
#[must_use]
pub fn compute_signature(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Verifies a delivery's `X-Shopify-Hmac-Sha256` header.
///
/// The digest comparison is constant-time. A header that is not valid
/// base64 fails verification.
#[must_use]
pub fn verify_signature(secret: &str, body: &[u8], header: &str) -> bool {
    let Ok(provided) = STANDARD.decode(header.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&provided).is_ok()
}
