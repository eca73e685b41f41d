//! Ledger errors.

use thiserror::Error;

use agora_audit::AuditError;
use agora_core::{ErrorKind, ValidationError};
use agora_crypto::CryptoError;
use agora_state::{IdeaStatus, PollError, StageError};

use crate::journal::JournalError;

/// Every failure a ledger operation can report.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// A referenced record does not exist (or belongs to another tenant).
    #[error("{entity} {id} not found")]
    NotFound {
        /// Record kind.
        entity: &'static str,
        /// Requested id.
        id: String,
    },

    /// A record with the requested id already exists.
    #[error("{entity} {id} already exists")]
    AlreadyExists {
        /// Record kind.
        entity: &'static str,
        /// Requested id.
        id: String,
    },

    /// A stored row references a record that was never stored.
    #[error("stored {entity} {id} references a missing record")]
    Dangling {
        /// Row kind.
        entity: &'static str,
        /// Row id.
        id: String,
    },

    /// The journal refused the unit; nothing was applied.
    #[error(transparent)]
    Journal(#[from] JournalError),

    /// Results are only shown to voters until the poll closes.
    #[error("results are available only after voting")]
    MustVoteFirst,

    /// The idea is no longer open for votes.
    #[error("idea is {status:?}, votes are only accepted on submitted ideas")]
    IdeaNotOpen {
        /// Current idea status.
        status: IdeaStatus,
    },

    /// Poll guard failure.
    #[error(transparent)]
    Poll(#[from] PollError),

    /// Consultation guard failure.
    #[error(transparent)]
    Stage(#[from] StageError),

    /// Audit append failure; the triggering action is not applied.
    #[error(transparent)]
    Audit(#[from] AuditError),

    /// Secret handling failure.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Malformed input.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A response document could not be rendered.
    #[error("render failed: {0}")]
    Render(#[from] serde_json::Error),
}

impl LedgerError {
    pub(crate) fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Taxonomy classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } => ErrorKind::Conflict,
            Self::Dangling { .. } => ErrorKind::Integrity,
            Self::Journal(_) => ErrorKind::Internal,
            Self::MustVoteFirst => ErrorKind::Forbidden,
            Self::IdeaNotOpen { .. } => ErrorKind::State,
            Self::Poll(e) => e.kind(),
            Self::Stage(e) => e.kind(),
            Self::Audit(e) => e.kind(),
            Self::Crypto(e) => e.kind(),
            Self::Validation(e) => e.kind(),
            Self::Render(_) => ErrorKind::Internal,
        }
    }
}
