//! # Per-Tenant Append-Only Log
//!
//! `AuditLog` is plain data; the caller supplies mutual exclusion (the
//! ledger keeps it inside its store's write lock). Appending is split in two:
//!
//! - [`AuditLog::prepare()`] canonicalizes and hashes the payload and links
//!   it to the tenant's current tail. This is the only fallible step that
//!   depends on caller input, so write units run it before mutating anything
//!   else.
//! - [`AuditLog::commit()`] re-checks that the tail is still the one the
//!   event was chained to and pushes it.

use std::collections::HashMap;

use serde::Serialize;

use agora_core::{EventId, Sha256Digest, TenantId, Timestamp};

use crate::chain::payload_hash;
use crate::error::AuditError;
use crate::event::{AuditEvent, NewAuditEvent};

/// An event hashed and linked, but not yet part of the chain.
#[derive(Debug, Clone)]
pub struct PreparedEvent {
    event: AuditEvent,
    position: usize,
}

impl PreparedEvent {
    /// The event as it will be committed.
    pub fn event(&self) -> &AuditEvent {
        &self.event
    }
}

/// Filters for [`AuditLog::list()`]. `tenant_id` is required.
#[derive(Debug, Clone)]
pub struct AuditFilter {
    /// Tenant whose chain is listed.
    pub tenant_id: TenantId,
    /// Exact event type.
    pub event_type: Option<String>,
    /// Exact subject type.
    pub subject_type: Option<String>,
    /// Exact subject id.
    pub subject_id: Option<String>,
    /// Inclusive lower bound on `created_at`.
    pub created_from: Option<Timestamp>,
    /// Inclusive upper bound on `created_at`.
    pub created_to: Option<Timestamp>,
}

impl AuditFilter {
    /// All events of a tenant.
    pub fn tenant(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            event_type: None,
            subject_type: None,
            subject_id: None,
            created_from: None,
            created_to: None,
        }
    }

    fn matches(&self, e: &AuditEvent) -> bool {
        self.event_type.as_deref().map_or(true, |t| e.event_type == t)
            && self.subject_type.as_deref().map_or(true, |t| e.subject_type == t)
            && self.subject_id.as_deref().map_or(true, |t| e.subject_id == t)
            && self.created_from.map_or(true, |t| e.created_at >= t)
            && self.created_to.map_or(true, |t| e.created_at <= t)
    }
}

/// Limit/offset pagination (default 100, max 1000).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Maximum items returned.
    pub limit: usize,
    /// Items skipped.
    pub offset: usize,
}

impl Pagination {
    /// Default page size.
    pub const DEFAULT_LIMIT: usize = 100;
    /// Hard cap on page size.
    pub const MAX_LIMIT: usize = 1000;

    /// Apply defaults and clamp the limit.
    pub fn new(limit: Option<usize>, offset: Option<usize>) -> Self {
        Self {
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).min(Self::MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of events in chain order.
#[derive(Debug, Clone, Serialize)]
pub struct AuditPage {
    /// Events on this page.
    pub events: Vec<AuditEvent>,
    /// Total events matching the filter.
    pub total: usize,
    /// Applied limit.
    pub limit: usize,
    /// Applied offset.
    pub offset: usize,
}

/// Append-only audit chains keyed by tenant.
#[derive(Debug, Default, Clone)]
pub struct AuditLog {
    chains: HashMap<TenantId, Vec<AuditEvent>>,
}

impl AuditLog {
    /// An empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// The tenant's events in chain order.
    pub fn events(&self, tenant_id: &TenantId) -> &[AuditEvent] {
        self.chains.get(tenant_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of events for the tenant.
    pub fn len(&self, tenant_id: &TenantId) -> usize {
        self.events(tenant_id).len()
    }

    /// Whether the tenant has no events.
    pub fn is_empty(&self, tenant_id: &TenantId) -> bool {
        self.events(tenant_id).is_empty()
    }

    /// The hash the tenant's next event must link to.
    pub fn tail_hash(&self, tenant_id: &TenantId) -> Option<Sha256Digest> {
        self.events(tenant_id).last().map(AuditEvent::chain_hash)
    }

    /// Hash, link and stamp an event without appending it.
    pub fn prepare(&self, new: NewAuditEvent, now: Timestamp) -> Result<PreparedEvent, AuditError> {
        let payload_hash = payload_hash(&new.payload)?;
        let position = self.len(&new.tenant_id);
        let previous_event_hash = self.tail_hash(&new.tenant_id);
        Ok(PreparedEvent {
            event: AuditEvent {
                id: EventId::new(),
                tenant_id: new.tenant_id,
                event_type: new.event_type,
                subject_type: new.subject_type,
                subject_id: new.subject_id,
                payload: new.payload,
                payload_hash,
                previous_event_hash,
                created_at: now,
            },
            position,
        })
    }

    /// Append a prepared event if the tenant's tail has not moved.
    pub fn commit(&mut self, prepared: PreparedEvent) -> Result<AuditEvent, AuditError> {
        let PreparedEvent { event, position } = prepared;
        let tail = self.tail_hash(&event.tenant_id);
        if self.len(&event.tenant_id) != position || tail != event.previous_event_hash {
            tracing::warn!(
                tenant_id = %event.tenant_id,
                event_type = %event.event_type,
                "audit append lost race for chain tail"
            );
            return Err(AuditError::Conflict {
                tenant_id: event.tenant_id,
            });
        }
        tracing::debug!(
            tenant_id = %event.tenant_id,
            event_type = %event.event_type,
            position,
            "audit event appended"
        );
        self.chains
            .entry(event.tenant_id.clone())
            .or_default()
            .push(event.clone());
        Ok(event)
    }

    /// Prepare and commit in one step.
    pub fn append(&mut self, new: NewAuditEvent, now: Timestamp) -> Result<AuditEvent, AuditError> {
        let prepared = self.prepare(new, now)?;
        self.commit(prepared)
    }

    /// Filtered, paginated listing in chain order.
    pub fn list(&self, filter: &AuditFilter, page: Pagination) -> AuditPage {
        let matching: Vec<&AuditEvent> = self
            .events(&filter.tenant_id)
            .iter()
            .filter(|e| filter.matches(e))
            .collect();
        let total = matching.len();
        let events = matching
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect();
        AuditPage {
            events,
            total,
            limit: page.limit,
            offset: page.offset,
        }
    }

    /// Tenants with at least one event.
    pub fn tenants(&self) -> impl Iterator<Item = &TenantId> {
        self.chains.keys()
    }

    /// Load previously persisted events, in chain order per tenant.
    ///
    /// Events whose id is already present are skipped. Every other event must
    /// carry a correct payload hash and link to the current tail; the first
    /// failure aborts the restore for that event's tenant and is returned.
    pub fn restore(&mut self, events: impl IntoIterator<Item = AuditEvent>) -> Result<usize, AuditError> {
        let mut restored = 0;
        for event in events {
            let chain = self.chains.entry(event.tenant_id.clone()).or_default();
            if chain.iter().any(|e| e.id == event.id) {
                continue;
            }
            let index = chain.len();
            let recomputed = payload_hash(&event.payload)?;
            if recomputed != event.payload_hash {
                return Err(AuditError::Integrity {
                    tenant_id: event.tenant_id,
                    index,
                    reason: "payload hash mismatch".into(),
                });
            }
            let expected = chain.last().map(AuditEvent::chain_hash);
            if expected != event.previous_event_hash {
                return Err(AuditError::Integrity {
                    tenant_id: event.tenant_id,
                    index,
                    reason: "previous event hash does not link".into(),
                });
            }
            chain.push(event);
            restored += 1;
        }
        Ok(restored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::event_types;
    use serde_json::json;

    fn tenant(s: &str) -> TenantId {
        TenantId::new(s).unwrap()
    }

    fn now() -> Timestamp {
        Timestamp::parse("2026-04-01T10:00:00Z").unwrap()
    }

    fn new_event(t: &str, n: u64) -> NewAuditEvent {
        NewAuditEvent::new(
            tenant(t),
            event_types::POLL_CREATED,
            "poll",
            format!("P{n}"),
            json!({"n": n}),
        )
    }

    #[test]
    fn first_event_has_no_previous_hash() {
        let mut log = AuditLog::new();
        let e = log.append(new_event("t1", 0), now()).unwrap();
        assert!(e.previous_event_hash.is_none());
    }

    #[test]
    fn events_link_to_predecessor() {
        let mut log = AuditLog::new();
        let e0 = log.append(new_event("t1", 0), now()).unwrap();
        let e1 = log.append(new_event("t1", 1), now()).unwrap();
        assert_eq!(e1.previous_event_hash, Some(e0.chain_hash()));
    }

    #[test]
    fn tenants_have_independent_chains() {
        let mut log = AuditLog::new();
        log.append(new_event("t1", 0), now()).unwrap();
        let other = log.append(new_event("t2", 0), now()).unwrap();
        assert!(other.previous_event_hash.is_none());
        assert_eq!(log.len(&tenant("t1")), 1);
        assert_eq!(log.tenants().count(), 2);
    }

    #[test]
    fn stale_prepare_conflicts() {
        let mut log = AuditLog::new();
        let a = log.prepare(new_event("t1", 0), now()).unwrap();
        let b = log.prepare(new_event("t1", 1), now()).unwrap();
        log.commit(a).unwrap();
        let err = log.commit(b).unwrap_err();
        assert_eq!(err.kind(), agora_core::ErrorKind::Conflict);
        assert_eq!(log.len(&tenant("t1")), 1);
    }

    #[test]
    fn float_payload_is_rejected_before_append() {
        let mut log = AuditLog::new();
        let bad = NewAuditEvent::new(tenant("t1"), "x", "poll", "P", json!({"ratio": 0.25}));
        let err = log.append(bad, now()).unwrap_err();
        assert_eq!(err.kind(), agora_core::ErrorKind::Validation);
        assert!(log.is_empty(&tenant("t1")));
    }

    #[test]
    fn list_filters_and_paginates() {
        let mut log = AuditLog::new();
        for n in 0..5 {
            log.append(new_event("t1", n), now().plus_secs(n as i64)).unwrap();
        }
        log.append(
            NewAuditEvent::new(tenant("t1"), event_types::POLL_OPENED, "poll", "P1", json!({})),
            now().plus_secs(10),
        )
        .unwrap();

        let all = log.list(&AuditFilter::tenant(tenant("t1")), Pagination::default());
        assert_eq!(all.total, 6);

        let mut by_type = AuditFilter::tenant(tenant("t1"));
        by_type.event_type = Some(event_types::POLL_CREATED.into());
        let page = log.list(&by_type, Pagination::new(Some(2), Some(1)));
        assert_eq!(page.total, 5);
        let subjects: Vec<_> = page.events.iter().map(|e| e.subject_id.as_str()).collect();
        assert_eq!(subjects, ["P1", "P2"]);

        let mut by_subject = AuditFilter::tenant(tenant("t1"));
        by_subject.subject_id = Some("P1".into());
        assert_eq!(log.list(&by_subject, Pagination::default()).total, 2);

        let mut by_time = AuditFilter::tenant(tenant("t1"));
        by_time.created_from = Some(now().plus_secs(3));
        by_time.created_to = Some(now().plus_secs(4));
        assert_eq!(log.list(&by_time, Pagination::default()).total, 2);

        assert_eq!(log.list(&AuditFilter::tenant(tenant("nobody")), Pagination::default()).total, 0);
    }

    #[test]
    fn pagination_defaults_and_cap() {
        assert_eq!(Pagination::default(), Pagination { limit: 100, offset: 0 });
        assert_eq!(Pagination::new(Some(5000), Some(3)).limit, 1000);
    }

    #[test]
    fn restore_accepts_valid_chain_and_skips_duplicates() {
        let mut source = AuditLog::new();
        for n in 0..3 {
            source.append(new_event("t1", n), now()).unwrap();
        }
        let events = source.events(&tenant("t1")).to_vec();

        let mut restored = AuditLog::new();
        assert_eq!(restored.restore(events.clone()).unwrap(), 3);
        assert_eq!(restored.restore(events).unwrap(), 0);
        let next = restored.append(new_event("t1", 3), now()).unwrap();
        assert_eq!(next.previous_event_hash, source.tail_hash(&tenant("t1")));
    }

    #[test]
    fn restore_rejects_tampered_payload() {
        let mut source = AuditLog::new();
        source.append(new_event("t1", 0), now()).unwrap();
        source.append(new_event("t1", 1), now()).unwrap();
        let mut events = source.events(&tenant("t1")).to_vec();
        events[1].payload = json!({"n": 99});
        let err = AuditLog::new().restore(events).unwrap_err();
        assert!(matches!(err, AuditError::Integrity { index: 1, .. }));
    }
}
