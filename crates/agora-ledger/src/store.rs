//! # Transactional Store
//!
//! All ledger state lives in one [`Tables`] value behind a
//! [`TransactionalStore`]. A write unit receives `&mut Tables` for its whole
//! duration, so each operation is atomic with respect to every other.
//!
//! Write units follow one discipline: every fallible step (lookups, guards,
//! validation, audit preparation) runs against the current tables and
//! produces a [`WriteSet`]. The write set goes to the journal, if any, and
//! only then into the tables through [`Tables::apply()`]. A failing unit
//! therefore leaves no trace, in memory or in the journal.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

use agora_audit::{event_types, AuditLog};
use agora_core::{IdeaId, PollId, TenantId, UserId};
use agora_state::{ConsultationStageInfo, Idea, IdeaVoteState, Poll};

use crate::error::LedgerError;
use crate::journal::{IdeaVoteRow, Snapshot, WriteSet};
use crate::votes::VoteTable;

/// Every table the ledger owns.
#[derive(Debug, Default)]
pub struct Tables {
    /// Poll registry.
    pub polls: HashMap<PollId, Poll>,
    /// Versioned votes.
    pub votes: VoteTable,
    /// Consultation stage state, keyed by the consultation's poll.
    pub consultations: HashMap<PollId, ConsultationStageInfo>,
    /// Ideas by id.
    pub ideas: HashMap<IdeaId, Idea>,
    /// Idea ids per consultation, in submission order.
    pub ideas_by_poll: HashMap<PollId, Vec<IdeaId>>,
    /// Idea votes; absent means [`IdeaVoteState::None`].
    pub idea_votes: HashMap<(IdeaId, UserId), IdeaVoteState>,
    /// Per-tenant audit chains.
    pub audit: AuditLog,
}

impl Tables {
    /// A poll visible to `tenant_id`. Polls of other tenants are reported as
    /// not found.
    pub fn poll(&self, tenant_id: &TenantId, poll_id: &PollId) -> Result<&Poll, LedgerError> {
        self.polls
            .get(poll_id)
            .filter(|p| &p.tenant_id == tenant_id)
            .ok_or_else(|| LedgerError::not_found("poll", poll_id))
    }

    /// A consultation and its poll, both visible to `tenant_id`.
    pub fn consultation(
        &self,
        tenant_id: &TenantId,
        poll_id: &PollId,
    ) -> Result<(&Poll, &ConsultationStageInfo), LedgerError> {
        let poll = self.poll(tenant_id, poll_id)?;
        let info = self
            .consultations
            .get(poll_id)
            .ok_or_else(|| LedgerError::not_found("consultation", poll_id))?;
        Ok((poll, info))
    }

    /// An idea whose consultation is visible to `tenant_id`.
    pub fn idea(&self, tenant_id: &TenantId, idea_id: &IdeaId) -> Result<&Idea, LedgerError> {
        let idea = self
            .ideas
            .get(idea_id)
            .ok_or_else(|| LedgerError::not_found("idea", idea_id))?;
        self.poll(tenant_id, &idea.poll_id)
            .map_err(|_| LedgerError::not_found("idea", idea_id))?;
        Ok(idea)
    }

    /// Put every row of `writes` and append its audit event.
    ///
    /// The event was prepared against these tables under the same guard, so
    /// the tail check in the commit cannot fail here unless a unit broke that
    /// rule.
    pub fn apply(&mut self, writes: WriteSet) -> Result<(), LedgerError> {
        if let Some(prepared) = writes.audit {
            self.audit.commit(prepared)?;
        }
        for poll in writes.polls {
            self.polls.insert(poll.id.clone(), poll);
        }
        for info in writes.consultations {
            self.consultations.insert(info.poll_id.clone(), info);
        }
        for idea in writes.ideas {
            self.put_idea(idea);
        }
        for vote in writes.votes {
            self.votes.put(vote);
        }
        for row in writes.idea_votes {
            self.put_idea_vote(row);
        }
        Ok(())
    }

    /// Fill empty tables from a journal snapshot.
    ///
    /// Every row must reference a poll or idea of the snapshot, and every
    /// lifecycle event in the audit chains must name a subject that exists.
    /// A snapshot that fails either check is rejected whole.
    pub fn load(&mut self, snapshot: Snapshot) -> Result<usize, LedgerError> {
        let Snapshot {
            polls,
            consultations,
            mut ideas,
            votes,
            idea_votes,
            audit,
        } = snapshot;

        let mut tables = Tables::default();
        for poll in polls {
            tables.polls.insert(poll.id.clone(), poll);
        }
        for info in consultations {
            if !tables.polls.contains_key(&info.poll_id) {
                return Err(dangling("consultation", info.poll_id.as_str()));
            }
            tables.consultations.insert(info.poll_id.clone(), info);
        }
        ideas.sort_by_key(|i| i.sequence);
        for idea in ideas {
            if !tables.consultations.contains_key(&idea.poll_id) {
                return Err(dangling("idea", idea.id.as_str()));
            }
            tables.put_idea(idea);
        }
        if let Some(vote) = votes.iter().find(|v| !tables.polls.contains_key(&v.poll_id)) {
            return Err(dangling("vote", &vote.id.to_string()));
        }
        tables.votes.restore(votes);
        for row in idea_votes {
            if !tables.ideas.contains_key(&row.idea_id) {
                return Err(dangling("idea vote", row.idea_id.as_str()));
            }
            tables.put_idea_vote(row);
        }

        let poll_ids: HashSet<&str> = tables.polls.keys().map(PollId::as_str).collect();
        let idea_ids: HashSet<&str> = tables.ideas.keys().map(IdeaId::as_str).collect();
        for event in audit.iter().filter(|e| event_types::is_lifecycle(&e.event_type)) {
            let known = match event.subject_type.as_str() {
                "poll" => poll_ids.contains(event.subject_id.as_str()),
                "idea" => idea_ids.contains(event.subject_id.as_str()),
                _ => true,
            };
            if !known {
                return Err(dangling("audit event", &event.id.0.to_string()));
            }
        }
        let restored = tables.audit.restore(audit)?;

        *self = tables;
        Ok(restored)
    }

    fn put_idea(&mut self, idea: Idea) {
        if !self.ideas.contains_key(&idea.id) {
            self.ideas_by_poll
                .entry(idea.poll_id.clone())
                .or_default()
                .push(idea.id.clone());
        }
        self.ideas.insert(idea.id.clone(), idea);
    }

    fn put_idea_vote(&mut self, row: IdeaVoteRow) {
        let key = (row.idea_id, row.user_id);
        match row.state {
            IdeaVoteState::None => self.idea_votes.remove(&key),
            state => self.idea_votes.insert(key, state),
        };
    }

    /// The ideas of a consultation, in submission order.
    pub fn ideas_of(&self, poll_id: &PollId) -> impl Iterator<Item = &Idea> {
        self.ideas_by_poll
            .get(poll_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.ideas.get(id))
    }
}

fn dangling(entity: &'static str, id: &str) -> LedgerError {
    LedgerError::Dangling {
        entity,
        id: id.to_string(),
    }
}

/// Read/write access to [`Tables`] with unit-level atomicity.
///
/// Implementations must serialize write units against each other and
/// against readers. Closures must not block or await.
pub trait TransactionalStore: Send + Sync {
    /// Run `f` with shared access.
    fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R;

    /// Run `f` with exclusive access.
    fn write<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R;
}

/// In-process store behind a `parking_lot::RwLock`.
///
/// The lock is never held across `.await` points, and `parking_lot` locks
/// do not poison, so a panicking unit cannot wedge the store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransactionalStore for MemoryStore {
    fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        f(&self.tables.read())
    }

    fn write<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R {
        f(&mut self.tables.write())
    }
}
