//! Errors raised while handling secrets and nullifiers.

use agora_core::ErrorKind;
use thiserror::Error;

/// Error in cryptographic input handling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// A supplied secret was shorter than the required minimum.
    #[error("secret must be at least {min} bytes, got {actual}")]
    SecretTooShort {
        /// Minimum length in bytes.
        min: usize,
        /// Supplied length in bytes.
        actual: usize,
    },

    /// Hex input did not decode.
    #[error("invalid hex encoding: {0}")]
    InvalidHex(String),
}

impl CryptoError {
    /// Always [`ErrorKind::Validation`].
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}
