//! Payload and chain hash functions shared by the log and the verifier.

use agora_core::{sha256_canonical, CanonicalBytes, CanonicalizationError, Sha256Digest};
use serde_json::Value;

/// SHA-256 of the RFC 8785 canonical form of `payload`.
pub fn payload_hash(payload: &Value) -> Result<Sha256Digest, CanonicalizationError> {
    Ok(sha256_canonical(&CanonicalBytes::new(payload)?))
}

/// The hash the next event stores as its `previous_event_hash`.
///
/// Both inputs are fixed-width, so plain concatenation is unambiguous.
pub fn chain_hash(payload_hash: &Sha256Digest, previous: Option<&Sha256Digest>) -> Sha256Digest {
    match previous {
        Some(prev) => Sha256Digest::of_parts(&[prev.as_bytes(), payload_hash.as_bytes()]),
        None => Sha256Digest::of_parts(&[payload_hash.as_bytes()]),
    }
}
