//! # User Secrets
//!
//! A `UserSecret` is the private input to nullifier derivation. It is owned
//! by the user-record collaborator, which stores it encrypted; Agora only
//! holds it transiently while deriving a nullifier.
//!
//! ## Security Invariant
//!
//! - Does not implement `Serialize`. A secret cannot be written into a
//!   response, an audit payload, or a log line by accident.
//! - `Debug` prints `UserSecret(<redacted>)`.
//! - The buffer is zeroized when the value is dropped.
//! - Equality is constant time.

use rand_core::{OsRng, RngCore};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use agora_core::digest::hex_to_bytes;

use crate::error::CryptoError;

/// Minimum secret length in bytes (256 bits).
pub const MIN_SECRET_LEN: usize = 32;

/// A long-lived, high-entropy, private per-user value.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct UserSecret(Vec<u8>);

impl UserSecret {
    /// Generate a fresh 256-bit secret from the operating system RNG.
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; MIN_SECRET_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Wrap secret bytes supplied by a collaborator.
    ///
    /// # Errors
    ///
    /// [`CryptoError::SecretTooShort`] if fewer than [`MIN_SECRET_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < MIN_SECRET_LEN {
            return Err(CryptoError::SecretTooShort {
                min: MIN_SECRET_LEN,
                actual: bytes.len(),
            });
        }
        Ok(Self(bytes.to_vec()))
    }

    /// Decode a hex-encoded secret, as it would arrive from a decrypting
    /// collaborator.
    pub fn from_hex(hex: &str) -> Result<Self, CryptoError> {
        let mut bytes =
            hex_to_bytes(hex.trim()).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
        let result = Self::from_slice(&bytes);
        bytes.zeroize();
        result
    }

    /// Borrow the raw secret bytes. Only nullifier derivation should call this.
    pub fn expose(&self) -> &[u8] {
        &self.0
    }

    /// Secret length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a constructed secret.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for UserSecret {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for UserSecret {}

impl std::fmt::Debug for UserSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("UserSecret(<redacted>)")
    }
}
