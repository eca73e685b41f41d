//! # Nullifier Derivation
//!
//! `nullifier = SHA-256(frame(tag) ‖ frame(poll_id) ‖ frame(secret))` where
//! `frame(x) = len(x) as u64 big-endian ‖ x` and the tag is
//! [`NULLIFIER_DOMAIN`].
//!
//! The same voter always maps to the same nullifier within a poll, so a
//! second cast supersedes the first. Across polls the nullifiers are
//! unlinkable without the secret.

use std::fmt;

use agora_core::{LengthPrefixedHasher, PollId, Sha256Digest, ValidationError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use subtle::ConstantTimeEq;

use crate::secret::UserSecret;

/// Domain-separation tag for nullifier derivation.
pub const NULLIFIER_DOMAIN: &str = "agora/nullifier/v1";

/// A 256-bit anonymous pseudonym for a (poll, voter) pair.
///
/// Serializes as 64 lowercase hex characters. `Debug` shows only a prefix.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Nullifier(Sha256Digest);

impl Nullifier {
    /// Wrap raw nullifier bytes, e.g. when loaded from storage.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(Sha256Digest::from_bytes(bytes))
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// Lowercase hex.
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }

    /// Parse 64 hex characters.
    pub fn from_hex(s: &str) -> Result<Self, ValidationError> {
        Sha256Digest::from_hex(s).map(Self)
    }
}

impl fmt::Debug for Nullifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nullifier({}...)", &self.to_hex()[..8])
    }
}

impl fmt::Display for Nullifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Nullifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Nullifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Sha256Digest::deserialize(deserializer).map(Self)
    }
}

/// Derive the nullifier for `secret` in `poll_id`.
pub fn derive_nullifier(poll_id: &PollId, secret: &UserSecret) -> Nullifier {
    let digest = LengthPrefixedHasher::new(NULLIFIER_DOMAIN)
        .field(poll_id.as_str().as_bytes())
        .field(secret.expose())
        .finish();
    Nullifier(digest)
}

/// Recompute the nullifier and compare it with `candidate` in constant time.
pub fn verify_nullifier(poll_id: &PollId, secret: &UserSecret, candidate: &Nullifier) -> bool {
    let expected = derive_nullifier(poll_id, secret);
    expected.as_bytes().ct_eq(candidate.as_bytes()).into()
}
