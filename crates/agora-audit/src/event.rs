//! Audit event records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use agora_core::{EventId, Sha256Digest, TenantId, Timestamp};

use crate::chain::chain_hash;

/// Event type names emitted by the platform.
pub mod event_types {
    /// A standard poll was created.
    pub const POLL_CREATED: &str = "poll.created";
    /// A poll started accepting votes.
    pub const POLL_OPENED: &str = "poll.opened";
    /// A poll stopped accepting votes.
    pub const POLL_CLOSED: &str = "poll.closed";
    /// A consultation and its poll were created.
    pub const CONSULTATION_CREATED: &str = "consultation.created";
    /// An idea was submitted.
    pub const IDEA_SUBMITTED: &str = "consultation.idea_submitted";
    /// A consultation moved to its next stage.
    pub const STAGE_TRANSITIONED: &str = "consultation.stage_transitioned";
    /// Winners were computed.
    pub const CONSULTATION_FINALIZED: &str = "consultation.finalized";

    /// Every type above.
    pub const LIFECYCLE: [&str; 7] = [
        POLL_CREATED,
        POLL_OPENED,
        POLL_CLOSED,
        CONSULTATION_CREATED,
        IDEA_SUBMITTED,
        STAGE_TRANSITIONED,
        CONSULTATION_FINALIZED,
    ];

    /// Whether `event_type` is emitted by the platform itself rather than
    /// appended by a collaborator.
    pub fn is_lifecycle(event_type: &str) -> bool {
        LIFECYCLE.contains(&event_type)
    }
}

/// An event to be appended.
#[derive(Debug, Clone)]
pub struct NewAuditEvent {
    /// Tenant whose chain receives the event.
    pub tenant_id: TenantId,
    /// See [`event_types`].
    pub event_type: String,
    /// Kind of entity the event is about (`poll`, `consultation`, `idea`).
    pub subject_type: String,
    /// Identifier of that entity.
    pub subject_id: String,
    /// Structured details. Must not contain non-integer numbers.
    pub payload: Value,
}

impl NewAuditEvent {
    /// Convenience constructor.
    pub fn new(
        tenant_id: TenantId,
        event_type: &str,
        subject_type: &str,
        subject_id: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            tenant_id,
            event_type: event_type.to_string(),
            subject_type: subject_type.to_string(),
            subject_id: subject_id.into(),
            payload,
        }
    }
}

/// A committed, immutable audit event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event identifier.
    pub id: EventId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Event type.
    pub event_type: String,
    /// Subject kind.
    pub subject_type: String,
    /// Subject identifier.
    pub subject_id: String,
    /// Structured details.
    pub payload: Value,
    /// SHA-256 of the canonical payload.
    pub payload_hash: Sha256Digest,
    /// Chain hash of the previous event; absent for the first.
    pub previous_event_hash: Option<Sha256Digest>,
    /// Creation instant.
    pub created_at: Timestamp,
}

impl AuditEvent {
    /// The value the next event in the chain must carry as its
    /// `previous_event_hash`.
    pub fn chain_hash(&self) -> Sha256Digest {
        chain_hash(&self.payload_hash, self.previous_event_hash.as_ref())
    }
}
