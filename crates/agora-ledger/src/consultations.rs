//! # Consultation Service
//!
//! Drives the three-stage deliberation on top of a consultation poll:
//!
//! ```text
//! idea_collection ──(≥ min ideas)──▶ shortlist_selection ──▶ final_arbitration
//!   submit, vote on ideas             top N shortlisted         shortlist becomes
//!                                     rest rejected             the poll's options
//! ```
//!
//! Stage changes are compare-and-set on the stage held in [`Tables`]: the
//! plan is computed from the current stage and committed under the same
//! write guard, so of two concurrent requests for the same step exactly one
//! succeeds and the other reports an invalid transition.

use serde::Serialize;
use serde_json::json;

use agora_audit::{event_types, NewAuditEvent};
use agora_core::{IdeaId, OptionId, PollId};
use agora_state::{
    rank_ideas, select_shortlist, validate_idea_text, ConsultationStage, ConsultationStageInfo,
    ConsultationThresholds, Idea, IdeaStatus, IdeaVoteState, IdeaVoteType, Poll, PollError,
    PollOption, PollStatus, StageWindows,
};

use crate::error::LedgerError;
use crate::journal::{IdeaVoteRow, WriteSet};
use crate::store::{Tables, TransactionalStore};
use crate::{Actor, Ledger, Recorded};

/// Definition of a consultation.
#[derive(Debug, Clone)]
pub struct NewConsultation {
    /// Caller-chosen id; generated when absent.
    pub id: Option<PollId>,
    /// Title of the underlying poll.
    pub title: String,
    /// Per-stage windows.
    pub windows: StageWindows,
    /// Guards.
    pub thresholds: ConsultationThresholds,
}

/// A consultation as read back.
#[derive(Debug, Clone, Serialize)]
pub struct ConsultationView {
    /// The underlying poll.
    pub poll: Poll,
    /// Stage state.
    pub info: ConsultationStageInfo,
    /// Ideas submitted so far, in any status.
    pub idea_count: usize,
}

/// Counters after an idea vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdeaVoteOutcome {
    /// Idea.
    pub idea_id: IdeaId,
    /// The caller's vote after the toggle.
    pub state: IdeaVoteState,
    /// Idea upvotes.
    pub upvotes: u64,
    /// Idea downvotes.
    pub downvotes: u64,
}

/// Effect of a stage transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionOutcome {
    /// Stage left.
    pub from: ConsultationStage,
    /// Stage entered.
    pub to: ConsultationStage,
    /// Ideas shortlisted, best first (entering shortlist selection).
    pub shortlisted: Vec<IdeaId>,
    /// Ideas rejected (entering shortlist selection).
    pub rejected: Vec<IdeaId>,
    /// The poll's new options (entering final arbitration).
    pub options: Vec<PollOption>,
}

/// Winners of a finalized consultation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalizeOutcome {
    /// The consultation poll.
    pub poll_id: PollId,
    /// Every shortlisted idea tied for the most live votes; empty when no
    /// votes were cast.
    pub winners: Vec<IdeaId>,
    /// The winning vote count.
    pub winning_votes: u64,
}

fn submitted_count(t: &Tables, poll_id: &PollId) -> u32 {
    let n = t
        .ideas_of(poll_id)
        .filter(|i| i.status == IdeaStatus::Submitted)
        .count();
    u32::try_from(n).unwrap_or(u32::MAX)
}

impl<S: TransactionalStore> Ledger<S> {
    /// Create a consultation poll (active, no options) at idea collection.
    /// Emits `consultation.created`.
    pub fn create_consultation(
        &self,
        actor: &Actor,
        new: NewConsultation,
    ) -> Result<Recorded<ConsultationView>, LedgerError> {
        let now = self.now();
        let poll = Poll::new_consultation(
            new.id.unwrap_or_else(PollId::generate),
            actor.tenant_id.clone(),
            &new.title,
            actor.user_id.clone(),
            now,
        )?;
        let info = ConsultationStageInfo::new(poll.id.clone(), new.windows, new.thresholds)?;

        self.store.write(|t| -> Result<_, LedgerError> {
            if t.polls.contains_key(&poll.id) {
                return Err(LedgerError::AlreadyExists {
                    entity: "poll",
                    id: poll.id.to_string(),
                });
            }
            let prepared = t.audit.prepare(
                NewAuditEvent::new(
                    actor.tenant_id.clone(),
                    event_types::CONSULTATION_CREATED,
                    "poll",
                    poll.id.as_str(),
                    json!({
                        "title": poll.title,
                        "windows": info.windows,
                        "thresholds": info.thresholds,
                        "createdBy": actor.user_id,
                    }),
                ),
                now,
            )?;
            let audit_event = self.commit_audited(
                t,
                WriteSet {
                    polls: vec![poll.clone()],
                    consultations: vec![info.clone()],
                    ..WriteSet::default()
                },
                prepared,
            )?;
            tracing::info!(poll_id = %poll.id, tenant_id = %poll.tenant_id, "consultation created");
            Ok(Recorded {
                value: ConsultationView {
                    poll,
                    info,
                    idea_count: 0,
                },
                audit_event,
            })
        })
    }

    /// Submit an idea during idea collection. Emits
    /// `consultation.idea_submitted`.
    pub fn submit_idea(
        &self,
        actor: &Actor,
        poll_id: &PollId,
        title: &str,
        description: &str,
    ) -> Result<Recorded<Idea>, LedgerError> {
        let now = self.now();
        let (title, description) = validate_idea_text(title, description)?;

        self.store.write(|t| -> Result<_, LedgerError> {
            let (_, info) = t.consultation(&actor.tenant_id, poll_id)?;
            info.require_stage(ConsultationStage::IdeaCollection)?;
            info.check_window(now)?;

            let sequence = t.ideas_by_poll.get(poll_id).map_or(0, Vec::len) as u64;
            let idea = Idea {
                id: IdeaId::generate(),
                poll_id: poll_id.clone(),
                submitter_id: actor.user_id.clone(),
                title,
                description,
                upvotes: 0,
                downvotes: 0,
                status: IdeaStatus::Submitted,
                submitted_at: now,
                sequence,
            };
            let prepared = t.audit.prepare(
                NewAuditEvent::new(
                    actor.tenant_id.clone(),
                    event_types::IDEA_SUBMITTED,
                    "idea",
                    idea.id.as_str(),
                    json!({
                        "pollId": poll_id,
                        "title": idea.title,
                        "sequence": sequence,
                        "submitterId": idea.submitter_id,
                    }),
                ),
                now,
            )?;
            let audit_event = self.commit_audited(
                t,
                WriteSet {
                    ideas: vec![idea.clone()],
                    ..WriteSet::default()
                },
                prepared,
            )?;
            tracing::debug!(poll_id = %poll_id, idea_id = %idea.id, sequence, "idea submitted");
            Ok(Recorded {
                value: idea,
                audit_event,
            })
        })
    }

    /// Toggle the caller's vote on an idea. Counters and the vote row change
    /// in the same unit.
    pub fn vote_on_idea(
        &self,
        actor: &Actor,
        idea_id: &IdeaId,
        vote: IdeaVoteType,
    ) -> Result<IdeaVoteOutcome, LedgerError> {
        let now = self.now();
        self.store.write(|t| -> Result<_, LedgerError> {
            let mut idea = t.idea(&actor.tenant_id, idea_id)?.clone();
            let (_, info) = t.consultation(&actor.tenant_id, &idea.poll_id)?;
            info.require_stage(ConsultationStage::IdeaCollection)?;
            info.check_window(now)?;
            if idea.status != IdeaStatus::Submitted {
                return Err(LedgerError::IdeaNotOpen {
                    status: idea.status,
                });
            }

            let key = (idea_id.clone(), actor.user_id.clone());
            let current = t.idea_votes.get(&key).copied().unwrap_or_default();
            let toggle = current.apply(vote);
            idea.apply_toggle(&toggle);

            let outcome = IdeaVoteOutcome {
                idea_id: idea.id.clone(),
                state: toggle.next,
                upvotes: idea.upvotes,
                downvotes: idea.downvotes,
            };
            let (idea_id, user_id) = key;
            self.commit(
                t,
                WriteSet {
                    ideas: vec![idea],
                    idea_votes: vec![IdeaVoteRow {
                        idea_id,
                        user_id,
                        state: toggle.next,
                    }],
                    ..WriteSet::default()
                },
            )?;
            Ok(outcome)
        })
    }

    /// Advance the consultation to `requested`, which must be the stage
    /// immediately after the current one. Emits
    /// `consultation.stage_transitioned`.
    pub fn transition_stage(
        &self,
        actor: &Actor,
        poll_id: &PollId,
        requested: ConsultationStage,
    ) -> Result<Recorded<TransitionOutcome>, LedgerError> {
        let now = self.now();
        self.store.write(|t| -> Result<_, LedgerError> {
            let (poll, info) = t.consultation(&actor.tenant_id, poll_id)?;
            let plan = info
                .plan_transition(requested, submitted_count(t, poll_id))
                .map_err(|e| {
                    tracing::debug!(poll_id = %poll_id, stage = %info.stage, %requested, error = %e, "stage transition rejected");
                    e
                })?;
            if plan.to == ConsultationStage::FinalArbitration && poll.status != PollStatus::Active {
                return Err(PollError::NotActive {
                    status: poll.status,
                }
                .into());
            }
            let mut poll = poll.clone();
            let mut info = info.clone();
            info.commit_transition(plan, actor.user_id.clone(), now)?;

            let mut outcome = TransitionOutcome {
                from: plan.from,
                to: plan.to,
                shortlisted: Vec::new(),
                rejected: Vec::new(),
                options: Vec::new(),
            };
            let mut changed: Vec<Idea> = Vec::new();

            match plan.to {
                ConsultationStage::ShortlistSelection => {
                    let shortlist = select_shortlist(
                        t.ideas_of(poll_id),
                        info.thresholds.shortlist_size as usize,
                    );
                    for (ids, status) in [
                        (&shortlist.shortlisted, IdeaStatus::Shortlisted),
                        (&shortlist.rejected, IdeaStatus::Rejected),
                    ] {
                        for id in ids {
                            if let Some(idea) = t.ideas.get(id) {
                                let mut idea = idea.clone();
                                idea.status = status;
                                changed.push(idea);
                            }
                        }
                    }
                    outcome.shortlisted = shortlist.shortlisted;
                    outcome.rejected = shortlist.rejected;
                }
                ConsultationStage::FinalArbitration => {
                    let options: Vec<PollOption> = rank_ideas(
                        t.ideas_of(poll_id)
                            .filter(|i| i.status == IdeaStatus::Shortlisted),
                    )
                    .into_iter()
                    .map(|idea| PollOption {
                        id: OptionId::from(&idea.id),
                        text: idea.title.clone(),
                    })
                    .collect();
                    poll.replace_options(options.clone());
                    poll.window = info.windows.final_arbitration;
                    outcome.options = options;
                }
                ConsultationStage::IdeaCollection => {}
            }

            let payload = match plan.to {
                ConsultationStage::FinalArbitration => json!({
                    "from": plan.from,
                    "to": plan.to,
                    "by": actor.user_id,
                    "options": outcome.options,
                }),
                _ => json!({
                    "from": plan.from,
                    "to": plan.to,
                    "by": actor.user_id,
                    "shortlisted": outcome.shortlisted,
                    "rejected": outcome.rejected,
                }),
            };
            let prepared = t.audit.prepare(
                NewAuditEvent::new(
                    actor.tenant_id.clone(),
                    event_types::STAGE_TRANSITIONED,
                    "poll",
                    poll_id.as_str(),
                    payload,
                ),
                now,
            )?;
            let audit_event = self.commit_audited(
                t,
                WriteSet {
                    polls: vec![poll],
                    consultations: vec![info],
                    ideas: changed,
                    ..WriteSet::default()
                },
                prepared,
            )?;
            tracing::info!(
                poll_id = %poll_id,
                tenant_id = %actor.tenant_id,
                from = %plan.from,
                to = %plan.to,
                "consultation stage transitioned"
            );
            Ok(Recorded {
                value: outcome,
                audit_event,
            })
        })
    }

    /// Mark the shortlisted idea(s) with the most live votes as winners.
    /// Requires final arbitration and a closed poll. Emits
    /// `consultation.finalized`.
    pub fn finalize_consultation(
        &self,
        actor: &Actor,
        poll_id: &PollId,
    ) -> Result<Recorded<FinalizeOutcome>, LedgerError> {
        let now = self.now();
        self.store.write(|t| -> Result<_, LedgerError> {
            let (poll, info) = t.consultation(&actor.tenant_id, poll_id)?;
            info.check_finalizable()?;
            poll.require_closed()?;

            let counts = t.votes.tally(poll_id);
            let tallied: Vec<(&Idea, u64)> = t
                .ideas_of(poll_id)
                .filter(|i| i.status == IdeaStatus::Shortlisted)
                .map(|i| (i, counts.get(&OptionId::from(&i.id)).copied().unwrap_or(0)))
                .collect();
            let winning_votes = tallied.iter().map(|(_, c)| *c).max().unwrap_or(0);
            let winners: Vec<Idea> = if winning_votes == 0 {
                Vec::new()
            } else {
                tallied
                    .iter()
                    .filter(|(_, c)| *c == winning_votes)
                    .map(|(i, _)| Idea {
                        status: IdeaStatus::Winner,
                        ..(*i).clone()
                    })
                    .collect()
            };
            let winner_ids: Vec<IdeaId> = winners.iter().map(|i| i.id.clone()).collect();

            let mut info = info.clone();
            info.finalized_at = Some(now);

            let prepared = t.audit.prepare(
                NewAuditEvent::new(
                    actor.tenant_id.clone(),
                    event_types::CONSULTATION_FINALIZED,
                    "poll",
                    poll_id.as_str(),
                    json!({
                        "winners": winner_ids,
                        "winningVotes": winning_votes,
                        "by": actor.user_id,
                    }),
                ),
                now,
            )?;
            let audit_event = self.commit_audited(
                t,
                WriteSet {
                    consultations: vec![info],
                    ideas: winners,
                    ..WriteSet::default()
                },
                prepared,
            )?;
            tracing::info!(poll_id = %poll_id, winners = winner_ids.len(), "consultation finalized");
            Ok(Recorded {
                value: FinalizeOutcome {
                    poll_id: poll_id.clone(),
                    winners: winner_ids,
                    winning_votes,
                },
                audit_event,
            })
        })
    }

    /// Read a consultation.
    pub fn get_consultation(&self, actor: &Actor, poll_id: &PollId) -> Result<ConsultationView, LedgerError> {
        self.store.read(|t| {
            let (poll, info) = t.consultation(&actor.tenant_id, poll_id)?;
            Ok(ConsultationView {
                poll: poll.clone(),
                info: info.clone(),
                idea_count: t.ideas_of(poll_id).count(),
            })
        })
    }

    /// Ideas of a consultation, in submission order.
    pub fn list_ideas(&self, actor: &Actor, poll_id: &PollId) -> Result<Vec<Idea>, LedgerError> {
        self.store.read(|t| {
            t.consultation(&actor.tenant_id, poll_id)?;
            Ok(t.ideas_of(poll_id).cloned().collect())
        })
    }

    /// The caller's current vote on an idea.
    pub fn idea_vote_state(&self, actor: &Actor, idea_id: &IdeaId) -> Result<IdeaVoteState, LedgerError> {
        self.store.read(|t| {
            t.idea(&actor.tenant_id, idea_id)?;
            Ok(t.idea_votes
                .get(&(idea_id.clone(), actor.user_id.clone()))
                .copied()
                .unwrap_or_default())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::*;
    use agora_core::{ErrorKind, TenantId, UserId};
    use agora_crypto::UserSecret;
    use agora_state::{StageError, TimeWindow};

    fn consultation(ledger: &crate::Ledger, min: u32, size: u32) -> PollId {
        ledger
            .create_consultation(
                &official(),
                NewConsultation {
                    id: None,
                    title: "Riverside park".into(),
                    windows: StageWindows::default(),
                    thresholds: ConsultationThresholds {
                        min_ideas_for_stage2: min,
                        shortlist_size: size,
                    },
                },
            )
            .unwrap()
            .value
            .poll
            .id
    }

    fn submit(ledger: &crate::Ledger, poll: &PollId, n: u32) -> IdeaId {
        ledger
            .submit_idea(&citizen(n), poll, &format!("Idea {n}"), "details")
            .unwrap()
            .value
            .id
    }

    fn status(ledger: &crate::Ledger, idea: &IdeaId) -> IdeaStatus {
        ledger.store().read(|t| t.ideas[idea].status)
    }

    fn tenant() -> TenantId {
        official().tenant_id
    }

    #[test]
    fn threshold_blocks_then_allows_shortlisting() {
        let (ledger, _) = ledger();
        let poll = consultation(&ledger, 10, 3);
        let ideas: Vec<IdeaId> = (0..9).map(|n| submit(&ledger, &poll, n)).collect();

        // Same second everywhere: ties fall back to submission order.
        ledger.vote_on_idea(&citizen(50), &ideas[4], IdeaVoteType::Upvote).unwrap();
        ledger.vote_on_idea(&citizen(51), &ideas[4], IdeaVoteType::Upvote).unwrap();
        ledger.vote_on_idea(&citizen(50), &ideas[7], IdeaVoteType::Upvote).unwrap();
        ledger.vote_on_idea(&citizen(50), &ideas[0], IdeaVoteType::Downvote).unwrap();

        let err = ledger
            .transition_stage(&official(), &poll, ConsultationStage::ShortlistSelection)
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Stage(StageError::ThresholdUnmet { required: 10, actual: 9 })
        ));
        assert_eq!(err.kind(), ErrorKind::State);

        let tenth = submit(&ledger, &poll, 9);
        let out = ledger
            .transition_stage(&official(), &poll, ConsultationStage::ShortlistSelection)
            .unwrap();
        assert_eq!(out.value.shortlisted, vec![ideas[4].clone(), ideas[7].clone(), ideas[1].clone()]);
        assert_eq!(out.value.rejected.len(), 7);
        assert!(out.value.rejected.contains(&tenth));
        assert_eq!(out.value.rejected.last(), Some(&ideas[0]));
        assert_eq!(status(&ledger, &ideas[4]), IdeaStatus::Shortlisted);
        assert_eq!(status(&ledger, &ideas[0]), IdeaStatus::Rejected);
        assert_eq!(out.audit_event.event_type, "consultation.stage_transitioned");
        assert_eq!(out.audit_event.payload["shortlisted"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn idea_vote_toggles() {
        let (ledger, _) = ledger();
        let poll = consultation(&ledger, 1, 1);
        let idea = submit(&ledger, &poll, 1);
        let voter = citizen(2);

        let up = ledger.vote_on_idea(&voter, &idea, IdeaVoteType::Upvote).unwrap();
        assert_eq!((up.upvotes, up.downvotes, up.state), (1, 0, IdeaVoteState::Upvote));
        let off = ledger.vote_on_idea(&voter, &idea, IdeaVoteType::Upvote).unwrap();
        assert_eq!((off.upvotes, off.downvotes, off.state), (0, 0, IdeaVoteState::None));
        assert!(ledger.store().read(|t| t.idea_votes.is_empty()));

        ledger.vote_on_idea(&voter, &idea, IdeaVoteType::Upvote).unwrap();
        let flip = ledger.vote_on_idea(&voter, &idea, IdeaVoteType::Downvote).unwrap();
        assert_eq!((flip.upvotes, flip.downvotes), (0, 1));
        assert_eq!(ledger.idea_vote_state(&voter, &idea).unwrap(), IdeaVoteState::Downvote);
    }

    #[test]
    fn stages_cannot_be_skipped_or_repeated() {
        let (ledger, _) = ledger();
        let poll = consultation(&ledger, 1, 1);
        submit(&ledger, &poll, 1);
        let skip = ledger
            .transition_stage(&official(), &poll, ConsultationStage::FinalArbitration)
            .unwrap_err();
        assert!(matches!(skip, LedgerError::Stage(StageError::InvalidTransition { .. })));

        ledger
            .transition_stage(&official(), &poll, ConsultationStage::ShortlistSelection)
            .unwrap();
        let again = ledger
            .transition_stage(&official(), &poll, ConsultationStage::ShortlistSelection)
            .unwrap_err();
        assert!(matches!(again, LedgerError::Stage(StageError::InvalidTransition { .. })));
        let back = ledger
            .transition_stage(&official(), &poll, ConsultationStage::IdeaCollection)
            .unwrap_err();
        assert_eq!(back.kind(), ErrorKind::State);
    }

    #[test]
    fn idea_collection_closes_after_shortlisting() {
        let (ledger, _) = ledger();
        let poll = consultation(&ledger, 1, 1);
        let idea = submit(&ledger, &poll, 1);
        ledger
            .transition_stage(&official(), &poll, ConsultationStage::ShortlistSelection)
            .unwrap();
        let err = ledger.submit_idea(&citizen(2), &poll, "Late", "").unwrap_err();
        assert!(matches!(err, LedgerError::Stage(StageError::WrongStage { .. })));
        let err = ledger.vote_on_idea(&citizen(2), &idea, IdeaVoteType::Upvote).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
    }

    #[test]
    fn submission_window_is_enforced() {
        let (ledger, clock) = ledger();
        let poll = ledger
            .create_consultation(
                &official(),
                NewConsultation {
                    id: None,
                    title: "Windowed".into(),
                    windows: StageWindows {
                        idea_collection: TimeWindow::between(t0(), t0().plus_secs(3600)),
                        ..StageWindows::default()
                    },
                    thresholds: ConsultationThresholds {
                        min_ideas_for_stage2: 1,
                        shortlist_size: 1,
                    },
                },
            )
            .unwrap()
            .value
            .poll
            .id;
        submit(&ledger, &poll, 1);
        clock.advance(3600);
        let err = ledger.submit_idea(&citizen(2), &poll, "Too late", "").unwrap_err();
        assert!(matches!(err, LedgerError::Stage(StageError::StageEnded { .. })));
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let (ledger, _) = ledger();
        let err = ledger
            .create_consultation(
                &official(),
                NewConsultation {
                    id: None,
                    title: "Bad".into(),
                    windows: StageWindows::default(),
                    thresholds: ConsultationThresholds {
                        min_ideas_for_stage2: 0,
                        shortlist_size: 1,
                    },
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(ledger.store().read(|t| t.audit.len(&tenant())), 0);
    }

    fn to_final(ledger: &crate::Ledger, ideas: u32, size: u32) -> (PollId, Vec<IdeaId>) {
        let poll = consultation(ledger, 1, size);
        let ids = (0..ideas).map(|n| submit(ledger, &poll, n)).collect();
        ledger
            .transition_stage(&official(), &poll, ConsultationStage::ShortlistSelection)
            .unwrap();
        ledger
            .transition_stage(&official(), &poll, ConsultationStage::FinalArbitration)
            .unwrap();
        (poll, ids)
    }

    fn cast(ledger: &crate::Ledger, poll: &PollId, voter: u8, idea: &IdeaId) {
        let secret = UserSecret::from_slice(&[voter; 32]).unwrap();
        ledger
            .cast_vote_with_secret(&tenant(), poll, &secret, &OptionId::from(idea))
            .unwrap();
    }

    #[test]
    fn final_arbitration_turns_shortlist_into_options() {
        let (ledger, _) = ledger();
        let (poll, ideas) = to_final(&ledger, 4, 2);
        let p = ledger.get_poll(&official(), &poll).unwrap();
        let opts: Vec<&str> = p.options.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(opts, [ideas[0].as_str(), ideas[1].as_str()]);
        assert_eq!(p.options[0].text, "Idea 0");

        let view = ledger.get_consultation(&official(), &poll).unwrap();
        assert_eq!(view.info.stage, ConsultationStage::FinalArbitration);
        assert_eq!(view.info.transitions.len(), 2);
        assert_eq!(view.idea_count, 4);
    }

    #[test]
    fn consultation_votes_wait_for_final_arbitration() {
        let (ledger, _) = ledger();
        let poll = consultation(&ledger, 1, 1);
        let idea = submit(&ledger, &poll, 1);
        let secret = UserSecret::from_slice(&[1; 32]).unwrap();
        let err = ledger
            .cast_vote_with_secret(&tenant(), &poll, &secret, &OptionId::from(&idea))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Stage(StageError::WrongStage { .. })));
    }

    #[test]
    fn finalize_marks_tied_leaders() {
        let (ledger, _) = ledger();
        let (poll, ideas) = to_final(&ledger, 3, 3);
        cast(&ledger, &poll, 1, &ideas[0]);
        cast(&ledger, &poll, 2, &ideas[2]);

        let early = ledger.finalize_consultation(&official(), &poll).unwrap_err();
        assert_eq!(early.kind(), ErrorKind::State);

        ledger.close_poll(&official(), &poll).unwrap();
        let out = ledger.finalize_consultation(&official(), &poll).unwrap();
        assert_eq!(out.value.winning_votes, 1);
        assert_eq!(out.value.winners, vec![ideas[0].clone(), ideas[2].clone()]);
        assert_eq!(status(&ledger, &ideas[0]), IdeaStatus::Winner);
        assert_eq!(status(&ledger, &ideas[1]), IdeaStatus::Shortlisted);

        let again = ledger.finalize_consultation(&official(), &poll).unwrap_err();
        assert!(matches!(again, LedgerError::Stage(StageError::AlreadyFinalized)));
    }

    #[test]
    fn finalize_without_votes_has_no_winner() {
        let (ledger, _) = ledger();
        let (poll, ideas) = to_final(&ledger, 2, 2);
        ledger.close_poll(&official(), &poll).unwrap();
        let out = ledger.finalize_consultation(&official(), &poll).unwrap();
        assert!(out.value.winners.is_empty());
        assert!(ideas.iter().all(|i| status(&ledger, i) == IdeaStatus::Shortlisted));
    }

    #[test]
    fn lifecycle_is_audited_in_order() {
        let (ledger, _) = ledger();
        let (poll, _) = to_final(&ledger, 2, 1);
        ledger.close_poll(&official(), &poll).unwrap();
        ledger.finalize_consultation(&official(), &poll).unwrap();
        let types: Vec<String> = ledger.store().read(|t| {
            t.audit.events(&tenant()).iter().map(|e| e.event_type.clone()).collect()
        });
        assert_eq!(
            types,
            [
                "consultation.created",
                "consultation.idea_submitted",
                "consultation.idea_submitted",
                "consultation.stage_transitioned",
                "consultation.stage_transitioned",
                "poll.closed",
                "consultation.finalized",
            ]
        );
    }

    #[test]
    fn ideas_are_tenant_scoped() {
        let (ledger, _) = ledger();
        let poll = consultation(&ledger, 1, 1);
        let idea = submit(&ledger, &poll, 1);
        let stranger = Actor::new(TenantId::new("paris").unwrap(), UserId::new("u").unwrap());
        assert_eq!(
            ledger.vote_on_idea(&stranger, &idea, IdeaVoteType::Upvote).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(ledger.list_ideas(&stranger, &poll).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(ledger.list_ideas(&official(), &poll).unwrap().len(), 1);
    }

    #[test]
    fn consultation_poll_cannot_be_closed_before_final_arbitration() {
        let (ledger, _) = ledger();
        let poll = consultation(&ledger, 1, 1);
        submit(&ledger, &poll, 1);
        let events_before = ledger.store().read(|t| t.audit.len(&tenant()));

        let err = ledger.close_poll(&official(), &poll).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Stage(StageError::WrongStage {
                expected: ConsultationStage::FinalArbitration,
                actual: ConsultationStage::IdeaCollection,
            })
        ));
        let p = ledger.get_poll(&official(), &poll).unwrap();
        assert_eq!(p.status, PollStatus::Active);
        assert_eq!(ledger.store().read(|t| t.audit.len(&tenant())), events_before);

        ledger
            .transition_stage(&official(), &poll, ConsultationStage::ShortlistSelection)
            .unwrap();
        let err = ledger.close_poll(&official(), &poll).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);

        ledger
            .transition_stage(&official(), &poll, ConsultationStage::FinalArbitration)
            .unwrap();
        let closed = ledger.close_poll(&official(), &poll).unwrap();
        assert_eq!(closed.value.status, PollStatus::Closed);
    }

    #[test]
    fn consultation_poll_cannot_be_reopened() {
        let (ledger, _) = ledger();
        let poll = consultation(&ledger, 1, 1);
        let err = ledger.open_poll(&official(), &poll).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
    }
}
