//! # Vote Ledger
//!
//! Votes are versioned. Each change of choice inserts a new [`VoteRecord`]
//! that points at the version it supersedes and stamps `superseded_at` on
//! the old one. A version is live iff `superseded_at` is `None`, and the
//! `live` index holds exactly one version per (poll, nullifier).
//!
//! Re-casting the option that is already live changes nothing. The caller
//! receives the same [`VoteReceipt`] whichever branch ran.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use agora_core::{OptionId, PollId, TenantId, Timestamp, VoteId};
use agora_crypto::{derive_nullifier, Nullifier, UserSecret};
use agora_state::{ConsultationStage, PollKind};

use crate::error::LedgerError;
use crate::journal::WriteSet;
use crate::store::{Tables, TransactionalStore};
use crate::Ledger;

/// One version of a nullifier's choice in a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    /// Version id.
    pub id: VoteId,
    /// Poll.
    pub poll_id: PollId,
    /// Voter pseudonym.
    pub nullifier: Nullifier,
    /// Chosen option.
    pub option_id: OptionId,
    /// When this version was cast.
    pub cast_at: Timestamp,
    /// The version this one replaced.
    pub supersedes: Option<VoteId>,
    /// When a later version replaced this one.
    pub superseded_at: Option<Timestamp>,
}

impl VoteRecord {
    /// Whether this is the current version.
    pub fn is_live(&self) -> bool {
        self.superseded_at.is_none()
    }
}

/// Versioned vote storage with a live index.
#[derive(Debug, Default, Clone)]
pub struct VoteTable {
    rows: HashMap<VoteId, VoteRecord>,
    live: HashMap<PollId, HashMap<Nullifier, VoteId>>,
    history: HashMap<(PollId, Nullifier), Vec<VoteId>>,
}

impl VoteTable {
    /// The live version for (poll, nullifier).
    pub fn live_vote(&self, poll_id: &PollId, nullifier: &Nullifier) -> Option<&VoteRecord> {
        self.live
            .get(poll_id)
            .and_then(|by_nullifier| by_nullifier.get(nullifier))
            .and_then(|id| self.rows.get(id))
    }

    /// Every live version in a poll, in no particular order.
    pub fn live_votes<'a>(&'a self, poll_id: &PollId) -> impl Iterator<Item = &'a VoteRecord> + 'a {
        self.live
            .get(poll_id)
            .into_iter()
            .flat_map(|by_nullifier| by_nullifier.values())
            .filter_map(|id| self.rows.get(id))
    }

    /// Number of live votes in a poll.
    pub fn live_count(&self, poll_id: &PollId) -> usize {
        self.live.get(poll_id).map_or(0, HashMap::len)
    }

    /// Live vote count per option.
    pub fn tally(&self, poll_id: &PollId) -> HashMap<OptionId, u64> {
        let mut counts = HashMap::new();
        for vote in self.live_votes(poll_id) {
            *counts.entry(vote.option_id.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Every version for (poll, nullifier), oldest first.
    pub fn history(&self, poll_id: &PollId, nullifier: &Nullifier) -> Vec<&VoteRecord> {
        self.history
            .get(&(poll_id.clone(), *nullifier))
            .into_iter()
            .flatten()
            .filter_map(|id| self.rows.get(id))
            .collect()
    }

    /// The rows a cast writes: the superseded version, if any, then the new
    /// live one. Empty when the live version already holds `option_id`.
    pub(crate) fn plan_cast(
        &self,
        poll_id: &PollId,
        nullifier: Nullifier,
        option_id: &OptionId,
        at: Timestamp,
    ) -> Vec<VoteRecord> {
        let previous = self.live_vote(poll_id, &nullifier);
        if previous.is_some_and(|r| &r.option_id == option_id) {
            return Vec::new();
        }

        let mut rows = Vec::with_capacity(2);
        if let Some(prev) = previous {
            rows.push(VoteRecord {
                superseded_at: Some(at),
                ..prev.clone()
            });
        }
        rows.push(VoteRecord {
            id: VoteId::new(),
            poll_id: poll_id.clone(),
            nullifier,
            option_id: option_id.clone(),
            cast_at: at,
            supersedes: previous.map(|r| r.id),
            superseded_at: None,
        });
        rows
    }

    /// Insert or replace one version and keep the indexes in step.
    pub(crate) fn put(&mut self, record: VoteRecord) {
        let key = (record.poll_id.clone(), record.nullifier);
        let live = self.live.entry(record.poll_id.clone()).or_default();
        if record.is_live() {
            live.insert(record.nullifier, record.id);
        } else if live.get(&record.nullifier) == Some(&record.id) {
            live.remove(&record.nullifier);
        }
        if !self.rows.contains_key(&record.id) {
            self.history.entry(key).or_default().push(record.id);
        }
        self.rows.insert(record.id, record);
    }

    /// Load stored versions in any order. Each nullifier's history is
    /// rebuilt by following `supersedes` from its first version.
    pub(crate) fn restore(&mut self, records: Vec<VoteRecord>) {
        let mut groups: HashMap<(PollId, Nullifier), Vec<VoteRecord>> = HashMap::new();
        for record in records {
            groups
                .entry((record.poll_id.clone(), record.nullifier))
                .or_default()
                .push(record);
        }
        for (_, mut versions) in groups {
            versions.sort_by(|a, b| a.cast_at.cmp(&b.cast_at));
            let mut ordered = Vec::with_capacity(versions.len());
            let mut previous: Option<VoteId> = None;
            while let Some(pos) = versions.iter().position(|v| v.supersedes == previous) {
                let next = versions.remove(pos);
                previous = Some(next.id);
                ordered.push(next);
            }
            ordered.extend(versions);
            for record in ordered {
                self.put(record);
            }
        }
    }
}

/// What a voter learns after casting: the same shape whether the cast was new,
/// a change, or a repeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteReceipt {
    /// Poll.
    pub poll_id: PollId,
    /// Option now recorded.
    pub option_id: OptionId,
}

/// `hasVoted` answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteStatus {
    /// Whether a live vote exists.
    pub voted: bool,
    /// The live vote's option.
    pub option_id: Option<OptionId>,
}

fn check_vote_allowed(
    t: &Tables,
    tenant_id: &TenantId,
    poll_id: &PollId,
    option_id: &OptionId,
    now: Timestamp,
) -> Result<(), LedgerError> {
    let poll = t.poll(tenant_id, poll_id)?;
    if poll.kind == PollKind::Consultation {
        let (_, info) = t.consultation(tenant_id, poll_id)?;
        info.require_stage(ConsultationStage::FinalArbitration)?;
    }
    poll.check_accepts_vote(option_id, now)?;
    Ok(())
}

impl<S: TransactionalStore> Ledger<S> {
    /// Cast or change the vote of `nullifier` in `poll_id`.
    pub fn cast_or_update_vote(
        &self,
        tenant_id: &TenantId,
        poll_id: &PollId,
        nullifier: Nullifier,
        option_id: &OptionId,
    ) -> Result<VoteReceipt, LedgerError> {
        let now = self.now();
        self.store.write(|t| -> Result<_, LedgerError> {
            check_vote_allowed(t, tenant_id, poll_id, option_id, now).map_err(|e| {
                tracing::debug!(poll_id = %poll_id, error = %e, "vote rejected");
                e
            })?;
            let rows = t.votes.plan_cast(poll_id, nullifier, option_id, now);
            self.commit(
                t,
                WriteSet {
                    votes: rows,
                    ..WriteSet::default()
                },
            )?;
            Ok(VoteReceipt {
                poll_id: poll_id.clone(),
                option_id: option_id.clone(),
            })
        })
    }

    /// Derive the caller's nullifier from `secret` and cast.
    pub fn cast_vote_with_secret(
        &self,
        tenant_id: &TenantId,
        poll_id: &PollId,
        secret: &UserSecret,
        option_id: &OptionId,
    ) -> Result<VoteReceipt, LedgerError> {
        let nullifier = derive_nullifier(poll_id, secret);
        self.cast_or_update_vote(tenant_id, poll_id, nullifier, option_id)
    }

    /// Whether `nullifier` has a live vote in `poll_id`, and for what.
    pub fn has_voted(
        &self,
        tenant_id: &TenantId,
        poll_id: &PollId,
        nullifier: &Nullifier,
    ) -> Result<VoteStatus, LedgerError> {
        self.store.read(|t| {
            t.poll(tenant_id, poll_id)?;
            let option_id = t
                .votes
                .live_vote(poll_id, nullifier)
                .map(|v| v.option_id.clone());
            Ok(VoteStatus {
                voted: option_id.is_some(),
                option_id,
            })
        })
    }

    /// Every version cast by `nullifier` in `poll_id`, oldest first.
    pub fn vote_history(
        &self,
        tenant_id: &TenantId,
        poll_id: &PollId,
        nullifier: &Nullifier,
    ) -> Result<Vec<VoteRecord>, LedgerError> {
        self.store.read(|t| {
            t.poll(tenant_id, poll_id)?;
            Ok(t.votes
                .history(poll_id, nullifier)
                .into_iter()
                .cloned()
                .collect())
        })
    }
}
