//! Audit log errors.

use agora_core::{CanonicalizationError, ErrorKind, TenantId};
use thiserror::Error;

/// Errors raised while appending to or restoring the audit log.
#[derive(Error, Debug)]
pub enum AuditError {
    /// The payload cannot be canonicalized (e.g. it contains a float).
    #[error("audit payload is not canonicalizable: {0}")]
    Payload(#[from] CanonicalizationError),

    /// A bundle could not be rendered.
    #[error("failed to render bundle: {0}")]
    Render(#[from] serde_json::Error),

    /// The tenant's tail moved between prepare and commit.
    #[error("audit chain for tenant {tenant_id} advanced concurrently")]
    Conflict {
        /// Tenant whose chain moved.
        tenant_id: TenantId,
    },

    /// Restored events do not form a valid chain.
    #[error("audit chain for tenant {tenant_id} is broken at index {index}: {reason}")]
    Integrity {
        /// Tenant.
        tenant_id: TenantId,
        /// Offending position in the tenant's chain.
        index: usize,
        /// What failed.
        reason: String,
    },
}

impl AuditError {
    /// Taxonomy classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Payload(e) => e.kind(),
            Self::Render(_) => ErrorKind::Internal,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Integrity { .. } => ErrorKind::Integrity,
        }
    }
}
