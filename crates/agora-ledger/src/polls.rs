//! Poll registry: creation and the `draft → active → closed` lifecycle.

use serde_json::json;

use agora_audit::{event_types, NewAuditEvent};
use agora_core::PollId;
use agora_state::{ConsultationStage, Poll, PollKind, PollOption, PollStatus, TimeWindow};

use crate::error::LedgerError;
use crate::journal::WriteSet;
use crate::store::TransactionalStore;
use crate::{Actor, Ledger, Recorded};

/// Definition of a standard poll.
#[derive(Debug, Clone)]
pub struct NewPoll {
    /// Caller-chosen id; generated when absent.
    pub id: Option<PollId>,
    /// Title.
    pub title: String,
    /// At least two options with distinct ids.
    pub options: Vec<PollOption>,
    /// Voting window.
    pub window: TimeWindow,
}

impl<S: TransactionalStore> Ledger<S> {
    /// Create a standard poll in `draft`. Emits `poll.created`.
    pub fn create_poll(&self, actor: &Actor, new: NewPoll) -> Result<Recorded<Poll>, LedgerError> {
        let now = self.now();
        let poll = Poll::new_standard(
            new.id.unwrap_or_else(PollId::generate),
            actor.tenant_id.clone(),
            &new.title,
            new.options,
            new.window,
            actor.user_id.clone(),
            now,
        )?;
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
                    event_types::POLL_CREATED,
                    "poll",
                    poll.id.as_str(),
                    json!({
                        "title": poll.title,
                        "kind": poll.kind,
                        "options": poll.options,
                        "window": poll.window,
                        "createdBy": poll.created_by,
                    }),
                ),
                now,
            )?;
            let audit_event = self.commit_audited(
                t,
                WriteSet {
                    polls: vec![poll.clone()],
                    ..WriteSet::default()
                },
                prepared,
            )?;
            tracing::info!(poll_id = %poll.id, tenant_id = %poll.tenant_id, "poll created");
            Ok(Recorded {
                value: poll,
                audit_event,
            })
        })
    }

    /// `draft → active`. Emits `poll.opened`.
    pub fn open_poll(&self, actor: &Actor, poll_id: &PollId) -> Result<Recorded<Poll>, LedgerError> {
        self.transition_poll(actor, poll_id, PollStatus::Active, event_types::POLL_OPENED)
    }

    /// `active → closed`. Emits `poll.closed`.
    ///
    /// A consultation's poll can only be closed in final arbitration.
    pub fn close_poll(&self, actor: &Actor, poll_id: &PollId) -> Result<Recorded<Poll>, LedgerError> {
        self.transition_poll(actor, poll_id, PollStatus::Closed, event_types::POLL_CLOSED)
    }

    /// Read a poll.
    pub fn get_poll(&self, actor: &Actor, poll_id: &PollId) -> Result<Poll, LedgerError> {
        self.store
            .read(|t| t.poll(&actor.tenant_id, poll_id).cloned())
    }

    fn transition_poll(
        &self,
        actor: &Actor,
        poll_id: &PollId,
        to: PollStatus,
        event_type: &str,
    ) -> Result<Recorded<Poll>, LedgerError> {
        let now = self.now();
        self.store.write(|t| -> Result<_, LedgerError> {
            let mut poll = t.poll(&actor.tenant_id, poll_id)?.clone();
            if poll.kind == PollKind::Consultation {
                // Closing ends final arbitration; earlier stages have no votes to close.
                let (_, info) = t.consultation(&actor.tenant_id, poll_id)?;
                info.require_stage(ConsultationStage::FinalArbitration)?;
            }
            let from = poll.status;
            poll.transition(to, now).map_err(|e| {
                tracing::debug!(poll_id = %poll_id, %from, %to, "poll transition rejected");
                e
            })?;
            let prepared = t.audit.prepare(
                NewAuditEvent::new(
                    actor.tenant_id.clone(),
                    event_type,
                    "poll",
                    poll_id.as_str(),
                    json!({ "from": from, "to": to, "by": actor.user_id }),
                ),
                now,
            )?;
            let audit_event = self.commit_audited(
                t,
                WriteSet {
                    polls: vec![poll.clone()],
                    ..WriteSet::default()
                },
                prepared,
            )?;
            tracing::info!(poll_id = %poll_id, %from, %to, "poll transitioned");
            Ok(Recorded {
                value: poll,
                audit_event,
            })
        })
    }
}
