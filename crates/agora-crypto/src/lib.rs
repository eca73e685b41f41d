//! # agora-crypto: Anonymous Voter Pseudonyms
//!
//! - [`UserSecret`]: a long-lived, high-entropy per-user value. Zeroized on
//!   drop, never serialized, redacted in `Debug`.
//! - [`Nullifier`]: the deterministic pseudonym of a (poll, voter) pair,
//!   derived with [`derive_nullifier()`] and checked in constant time with
//!   [`verify_nullifier()`].
//!
//! ## Crate Policy
//!
//! - Depends only on `agora-core` internally.
//! - No operation returns, formats or logs secret bytes.
//! - Tests use real SHA-256 and real OS randomness.

pub mod error;
pub mod nullifier;
pub mod secret;

pub use error::CryptoError;
pub use nullifier::{derive_nullifier, verify_nullifier, Nullifier, NULLIFIER_DOMAIN};
pub use secret::{UserSecret, MIN_SECRET_LEN};
