//! # Write-Ahead Journal
//!
//! Every write unit describes its effect as a [`WriteSet`]: the rows it puts
//! and the audit event it appends. When a [`Journal`] is attached to the
//! ledger, the write set is handed to it before anything changes in memory.
//! A journal failure therefore fails the whole unit, audit event included.
//!
//! A [`Snapshot`] is the reverse direction: every row a journal holds, loaded
//! back into an empty ledger on startup.

use thiserror::Error;

use agora_audit::{AuditEvent, PreparedEvent};
use agora_core::{IdeaId, UserId};
use agora_state::{ConsultationStageInfo, Idea, IdeaVoteState, Poll};

use crate::votes::VoteRecord;

/// A user's current vote on one idea. [`IdeaVoteState::None`] deletes the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdeaVoteRow {
    /// Idea.
    pub idea_id: IdeaId,
    /// Voter.
    pub user_id: UserId,
    /// State after the unit.
    pub state: IdeaVoteState,
}

/// Rows one write unit puts, in apply order.
///
/// Vote versions are listed superseded-first so that at no point do two live
/// versions exist for one nullifier.
#[derive(Debug, Clone, Default)]
pub struct WriteSet {
    /// Polls, inserted or replaced.
    pub polls: Vec<Poll>,
    /// Consultation stage state, inserted or replaced.
    pub consultations: Vec<ConsultationStageInfo>,
    /// Ideas, inserted or replaced.
    pub ideas: Vec<Idea>,
    /// Vote versions, inserted or replaced.
    pub votes: Vec<VoteRecord>,
    /// Idea vote rows.
    pub idea_votes: Vec<IdeaVoteRow>,
    /// The audit event appended by the unit.
    pub audit: Option<PreparedEvent>,
}

impl WriteSet {
    /// Whether the unit changes nothing.
    pub fn is_empty(&self) -> bool {
        self.polls.is_empty()
            && self.consultations.is_empty()
            && self.ideas.is_empty()
            && self.votes.is_empty()
            && self.idea_votes.is_empty()
            && self.audit.is_none()
    }

    /// The audit event, as it will be committed.
    pub fn audit_event(&self) -> Option<&AuditEvent> {
        self.audit.as_ref().map(PreparedEvent::event)
    }
}

/// A journal write failed; nothing was applied.
#[derive(Error, Debug)]
#[error("journal write failed: {0}")]
pub struct JournalError(pub String);

/// Durable sink for write sets.
///
/// `persist` runs while the ledger holds its write guard, so implementations
/// see units in commit order and must not call back into the ledger.
pub trait Journal: Send + Sync {
    /// Durably record `writes`, all or nothing.
    fn persist(&self, writes: &WriteSet) -> Result<(), JournalError>;
}

/// Everything a journal holds, for loading into an empty ledger.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Every poll.
    pub polls: Vec<Poll>,
    /// Every consultation's stage state.
    pub consultations: Vec<ConsultationStageInfo>,
    /// Every idea.
    pub ideas: Vec<Idea>,
    /// Every vote version, live and superseded.
    pub votes: Vec<VoteRecord>,
    /// Every non-empty idea vote.
    pub idea_votes: Vec<IdeaVoteRow>,
    /// Audit events, each tenant's in chain order.
    pub audit: Vec<AuditEvent>,
}

#[cfg(test)]
pub(crate) mod recording {
    use parking_lot::Mutex;

    use super::*;

    /// Keeps every persisted write set; fails on demand.
    #[derive(Debug, Default)]
    pub struct RecordingJournal {
        pub units: Mutex<Vec<WriteSet>>,
        pub failing: Mutex<bool>,
    }

    impl Journal for RecordingJournal {
        fn persist(&self, writes: &WriteSet) -> Result<(), JournalError> {
            if *self.failing.lock() {
                return Err(JournalError("disk unavailable".into()));
            }
            self.units.lock().push(writes.clone());
            Ok(())
        }
    }
}
