//! # SHA-256 Digests
//!
//! [`Sha256Digest`] is the 32-byte digest type used for audit payload hashes,
//! chain hashes and nullifiers.
//!
//! Two construction paths exist, and each closes off a class of ambiguity:
//!
//! - [`sha256_canonical()`] accepts only [`CanonicalBytes`], so a structured
//!   document is always hashed in its RFC 8785 form.
//! - [`LengthPrefixedHasher`] frames every component of a multi-part input
//!   with its big-endian `u64` length, so `("ab", "c")` and `("a", "bc")`
//!   never collide.
//!
//! Fixed-width inputs (two 32-byte digests) may be concatenated directly with
//! [`Sha256Digest::of_parts()`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;
use crate::error::ValidationError;

/// A raw SHA-256 digest. Serializes as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sha256Digest([u8; 32]);

impl Sha256Digest {
    /// Wrap raw digest bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// SHA-256 over the concatenation of fixed-width parts.
    ///
    /// Only use this when every part has a fixed length; variable-length
    /// components belong in a [`LengthPrefixedHasher`].
    pub fn of_parts(parts: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        Self(hasher.finalize().into())
    }

    /// The raw 32 bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Parse a 64-character hex string. Upper- and lowercase are accepted.
    pub fn from_hex(s: &str) -> Result<Self, ValidationError> {
        let bytes = decode_hex(s)?;
        let arr: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            ValidationError::InvalidFormat {
                field: "digest".into(),
                reason: format!("expected 32 bytes, got {}", v.len()),
            }
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha256Digest({})", self.to_hex())
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Sha256Digest {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Sha256Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Sha256Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Compute the SHA-256 digest of canonical bytes.
///
/// Accepts only `&CanonicalBytes`, never raw `&[u8]`, so no code path can
/// hash a structured document in a non-canonical form.
pub fn sha256_canonical(data: &CanonicalBytes) -> Sha256Digest {
    Sha256Digest(Sha256::digest(data.as_bytes()).into())
}

/// SHA-256 over a domain tag followed by length-prefixed fields.
///
/// Each field, and the tag itself, is written as `len (u64, big-endian) ‖ bytes`.
///
/// ```
/// use agora_core::LengthPrefixedHasher;
///
/// let a = LengthPrefixedHasher::new("demo/v1").field(b"ab").field(b"c").finish();
/// let b = LengthPrefixedHasher::new("demo/v1").field(b"a").field(b"bc").finish();
/// assert_ne!(a, b);
/// ```
#[derive(Clone)]
pub struct LengthPrefixedHasher {
    inner: Sha256,
}

impl LengthPrefixedHasher {
    /// Start a hash under the given domain-separation tag.
    pub fn new(domain_tag: &str) -> Self {
        let hasher = Self {
            inner: Sha256::new(),
        };
        hasher.field(domain_tag.as_bytes())
    }

    /// Append one length-prefixed field.
    pub fn field(mut self, bytes: &[u8]) -> Self {
        self.inner.update((bytes.len() as u64).to_be_bytes());
        self.inner.update(bytes);
        self
    }

    /// Finalize the digest.
    pub fn finish(self) -> Sha256Digest {
        Sha256Digest(self.inner.finalize().into())
    }
}

fn decode_hex(s: &str) -> Result<Vec<u8>, ValidationError> {
    if s.len() % 2 != 0 {
        return Err(ValidationError::InvalidFormat {
            field: "hex".into(),
            reason: "odd number of characters".into(),
        });
    }
    s.as_bytes()
        .chunks(2)
        .map(|pair| {
            let hi = hex_value(pair[0]);
            let lo = hex_value(pair[1]);
            match (hi, lo) {
                (Some(hi), Some(lo)) => Ok((hi << 4) | lo),
                _ => Err(ValidationError::InvalidFormat {
                    field: "hex".into(),
                    reason: "non-hex character".into(),
                }),
            }
        })
        .collect()
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Decode an arbitrary-length hex string into bytes.
pub fn hex_to_bytes(s: &str) -> Result<Vec<u8>, ValidationError> {
    decode_hex(s)
}
