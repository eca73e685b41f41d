//! # agora-audit: Hash-Chained Audit Log
//!
//! Each tenant has its own append-only chain of [`AuditEvent`]s:
//!
//! ```text
//! payload_hash(e)  = SHA-256(JCS(e.payload))
//! chain_hash(e)    = SHA-256(e.previous_event_hash ‖ payload_hash(e))   if linked
//!                  = SHA-256(payload_hash(e))                           for event 0
//! e[i].previous_event_hash = chain_hash(e[i-1])
//! ```
//!
//! The [`verify`] module re-derives both hashes from an exported bundle
//! without access to the platform's storage, so a tenant can check the chain
//! with nothing but the JSON file.
//!
//! ## Crate Policy
//!
//! - Events are never updated or deleted once committed.
//! - The verifier never panics on malformed input; structural problems are
//!   reported as warnings or per-event errors.

pub mod bundle;
pub mod chain;
pub mod error;
pub mod event;
pub mod log;
pub mod verify;

pub use bundle::{AuditBundle, BundleEvent, BundleVerification, ExportFormat};
pub use chain::{chain_hash, payload_hash};
pub use error::AuditError;
pub use event::{event_types, AuditEvent, NewAuditEvent};
pub use log::{AuditFilter, AuditLog, AuditPage, Pagination, PreparedEvent};
pub use verify::{
    verify_bundle_str, verify_bundle_value, verify_chain, BundleMetadata, BundleReport,
    ChainStats, ChainVerification, EventFault, EventIssue,
};
