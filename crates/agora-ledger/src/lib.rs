//! # agora-ledger: Votes, Results, Consultations, Audit
//!
//! [`Ledger`] is the transactional core. Each public operation is one write
//! or read unit against a [`TransactionalStore`]:
//!
//! | Module | Operations |
//! |---|---|
//! | [`polls`] | `create_poll`, `open_poll`, `close_poll`, `get_poll` |
//! | [`votes`] | `cast_or_update_vote`, `cast_vote_with_secret`, `has_voted`, `vote_history` |
//! | [`results`] | `get_results`, `get_public_results`, `export_results` |
//! | [`consultations`] | `create_consultation`, `submit_idea`, `vote_on_idea`, `transition_stage`, `finalize_consultation`, `get_consultation`, `list_ideas`, `idea_vote_state` |
//! | [`audit`] | `append_audit`, `list_audit`, `audit_events`, `export_audit_bundle`, `restore_audit_events` |
//! | [`journal`] | `with_journal`, `restore_snapshot` |
//!
//! Every audited mutation returns a [`Recorded`] carrying the committed
//! [`AuditEvent`]. Durability is the [`Journal`]'s job: when one is attached,
//! each unit's [`WriteSet`] reaches it before the tables change, so an action
//! and its audit event are stored together or not at all.
//!
//! Vote casts and idea votes are not audited: an event per cast
//! would publish when each nullifier was active.

use std::sync::Arc;

use agora_audit::{AuditEvent, PreparedEvent};
use agora_core::{Clock, SystemClock, TenantId, Timestamp, UserId};

pub mod audit;
pub mod consultations;
pub mod error;
pub mod journal;
pub mod polls;
pub mod results;
pub mod store;
pub mod votes;

pub use audit::BundleExport;
pub use consultations::{
    ConsultationView, FinalizeOutcome, IdeaVoteOutcome, NewConsultation, TransitionOutcome,
};
pub use error::LedgerError;
pub use journal::{IdeaVoteRow, Journal, JournalError, Snapshot, WriteSet};
pub use polls::NewPoll;
pub use results::{OptionTally, PollResults, ResultsExport};
pub use store::{MemoryStore, Tables, TransactionalStore};
pub use votes::{VoteReceipt, VoteRecord, VoteStatus, VoteTable};

/// The authenticated caller a mutation is performed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    /// Caller's tenant; scopes every lookup.
    pub tenant_id: TenantId,
    /// Caller's user id.
    pub user_id: UserId,
}

impl Actor {
    /// Convenience constructor.
    pub fn new(tenant_id: TenantId, user_id: UserId) -> Self {
        Self { tenant_id, user_id }
    }
}

/// A mutation's result together with the audit event it appended.
#[derive(Debug, Clone)]
pub struct Recorded<T> {
    /// Operation result.
    pub value: T,
    /// The committed audit event.
    pub audit_event: AuditEvent,
}

/// The transactional core.
pub struct Ledger<S: TransactionalStore = MemoryStore> {
    store: S,
    clock: Arc<dyn Clock>,
    journal: Option<Arc<dyn Journal>>,
}

impl Ledger<MemoryStore> {
    /// An in-memory ledger on the system clock.
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new(), Arc::new(SystemClock::new()))
    }
}

impl<S: TransactionalStore> Ledger<S> {
    /// A ledger over `store`, reading time from `clock`.
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            journal: None,
        }
    }

    /// Route every write unit through `journal` before it is applied.
    pub fn with_journal(mut self, journal: Arc<dyn Journal>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load a journal snapshot into this (empty) ledger. Returns the number
    /// of audit events restored.
    pub fn restore_snapshot(&self, snapshot: Snapshot) -> Result<usize, LedgerError> {
        let polls = snapshot.polls.len();
        let votes = snapshot.votes.len();
        let restored = self.store.write(|t| {
            if !t.polls.is_empty() || t.audit.tenants().next().is_some() {
                return Err(LedgerError::AlreadyExists {
                    entity: "ledger state",
                    id: "snapshot".into(),
                });
            }
            t.load(snapshot)
        })?;
        tracing::info!(polls, votes, audit_events = restored, "ledger state restored");
        Ok(restored)
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Journal `writes`, then apply them. Call under the write guard.
    pub(crate) fn commit(&self, t: &mut Tables, writes: WriteSet) -> Result<(), LedgerError> {
        if writes.is_empty() {
            return Ok(());
        }
        if let Some(journal) = &self.journal {
            journal.persist(&writes).map_err(|e| {
                tracing::error!(
                    event_type = writes.audit_event().map(|ev| ev.event_type.as_str()),
                    error = %e,
                    "write unit rejected by journal"
                );
                e
            })?;
        }
        t.apply(writes)
    }

    /// [`Ledger::commit()`] for a unit that appends `prepared`.
    pub(crate) fn commit_audited(
        &self,
        t: &mut Tables,
        mut writes: WriteSet,
        prepared: PreparedEvent,
    ) -> Result<AuditEvent, LedgerError> {
        let event = prepared.event().clone();
        writes.audit = Some(prepared);
        self.commit(t, writes)?;
        Ok(event)
    }
}

impl<S: TransactionalStore> std::fmt::Debug for Ledger<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger").finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testkit {
    use super::*;
    use agora_core::{ManualClock, OptionId, PollId};
    use agora_state::{PollOption, TimeWindow};

    pub fn t0() -> Timestamp {
        Timestamp::parse("2026-06-01T09:00:00Z").unwrap()
    }

    pub fn ledger() -> (Ledger, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(t0()));
        (Ledger::new(MemoryStore::new(), clock.clone()), clock)
    }

    pub fn official() -> Actor {
        Actor::new(TenantId::new("lyon").unwrap(), UserId::new("official-1").unwrap())
    }

    pub fn citizen(n: u32) -> Actor {
        Actor::new(
            TenantId::new("lyon").unwrap(),
            UserId::new(format!("citizen-{n}")).unwrap(),
        )
    }

    pub fn option(id: &str) -> OptionId {
        OptionId::new(id).unwrap()
    }

    pub fn active_poll(ledger: &Ledger) -> PollId {
        let poll = ledger
            .create_poll(
                &official(),
                NewPoll {
                    id: None,
                    title: "Library opening hours".into(),
                    options: vec![
                        PollOption { id: option("O1"), text: "Extend to 22:00".into() },
                        PollOption { id: option("O2"), text: "Keep 20:00".into() },
                        PollOption { id: option("O3"), text: "Open Sundays".into() },
                    ],
                    window: TimeWindow::unbounded(),
                },
            )
            .unwrap()
            .value
            .id;
        ledger.open_poll(&official(), &poll).unwrap();
        poll
    }
}
