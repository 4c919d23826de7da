//! Cryptographic utilities for shared-secret checks and webhook signatures.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Prefix carried by every payment webhook signature header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Error type for signature operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Signing secret is empty")]
    EmptySecret,

    #[error("Signature header is malformed")]
    Malformed,

    #[error("Signature does not match payload")]
    Mismatch,
}

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compares two secrets without leaking the position of the first mismatch.
///
/// Both sides are hashed first so the comparison length does not depend on
/// the caller-supplied value.
pub fn secrets_match(expected: &str, provided: &str) -> bool {
    let a = Sha256::digest(expected.as_bytes());
    let b = Sha256::digest(provided.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Signs a payload with HMAC-SHA256 and returns `sha256=<hex>`.
pub fn sign_payload(payload: &[u8], secret: &str) -> Result<String, SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::EmptySecret);
    }

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::EmptySecret)?;
    mac.update(payload);

    Ok(format!(
        "{}{}",
        SIGNATURE_PREFIX,
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Verifies a `sha256=<hex>` signature header against the raw payload.
pub fn verify_signature(payload: &[u8], header: &str, secret: &str) -> Result<(), SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::EmptySecret);
    }

    let hex_sig = header
        .trim()
        .strip_prefix(SIGNATURE_PREFIX)
        .ok_or(SignatureError::Malformed)?;
    let provided = hex::decode(hex_sig).map_err(|_| SignatureError::Malformed)?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::EmptySecret)?;
    mac.update(payload);
    mac.verify_slice(&provided)
        .map_err(|_| SignatureError::Mismatch)
}
