use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha384;
use std::sync::atomic::{AtomicU64, Ordering};

// Create a type alias for the HMAC-SHA384 implementation.
type HmacSha384 = Hmac<Sha384>;

/// Builds the payload the server expects to be signed for a websocket login.
pub fn auth_payload(nonce: u64) -> String {
    format!("AUTH{}", nonce)
}

static LAST_NONCE: AtomicU64 = AtomicU64::new(0);

/// Nonce for auth requests: epoch microseconds, strictly increasing per process.
///
/// Calls landing in the same microsecond get the last issued value plus one.
pub fn auth_nonce() -> u64 {
    let now = Utc::now().timestamp_micros().max(0) as u64;
    let mut last = LAST_NONCE.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_NONCE.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

/// Creates an HMAC-SHA384 signature for an authentication payload.
///
/// # Arguments
///
/// * `secret` - The user's API secret key.
/// * `payload` - The exact `authPayload` string sent alongside the signature.
///
/// # Returns
///
/// A lowercase hexadecimal string representation of the signature.
pub fn sign_payload(secret: &str, payload: &str) -> String {
    // Create a new HMAC-SHA384 instance with the secret key.
    let mut mac = HmacSha384::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");

    mac.update(payload.as_bytes());

    // Convert the raw bytes into a hexadecimal string, which is what the API expects.
    hex::encode(mac.finalize().into_bytes())
}
