#![deny(missing_docs)]

//! # agora-core: Foundational Types for Agora
//!
//! Every other crate in the workspace depends on `agora-core`; it depends on
//! nothing internal.
//!
//! ## Design Principles
//!
//! 1. **Newtype identifiers.** [`PollId`], [`OptionId`], [`IdeaId`],
//!    [`UserId`] and [`TenantId`] are distinct types. A user id cannot be
//!    passed where a poll id is expected.
//!
//! 2. **[`CanonicalBytes`] is the only input to payload hashing.** Audit
//!    payload hashes must be reproducible by a verifier that never saw the
//!    original insertion order, so every payload digest flows through RFC 8785
//!    canonicalization.
//!
//! 3. **Unambiguous hash inputs.** Multi-component hashes are built with
//!    [`LengthPrefixedHasher`], which frames every component with its length.
//!
//! 4. **UTC-only, second-precision [`Timestamp`]s** obtained through the
//!    [`Clock`] seam, so time-window checks are testable.
//!
//! 5. **One error taxonomy.** Every domain error maps onto an [`ErrorKind`].

pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod tabular;
pub mod temporal;

pub use canonical::CanonicalBytes;
pub use digest::{sha256_canonical, LengthPrefixedHasher, Sha256Digest};
pub use error::{CanonicalizationError, ErrorKind, ValidationError};
pub use identity::{EventId, IdeaId, OptionId, PollId, TenantId, UserId, VoteId};
pub use tabular::CsvWriter;
pub use temporal::{Clock, ManualClock, SystemClock, Timestamp};
