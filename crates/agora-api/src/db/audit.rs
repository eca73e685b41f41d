//! Audit event persistence.
//!
//! Rows mirror [`AuditEvent`] exactly, hashes as lowercase hex. The chain is
//! never recomputed here: the ledger verifies every row when it is restored.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use agora_audit::AuditEvent;
use agora_core::{EventId, Sha256Digest, TenantId, Timestamp};

/// Insert one event inside the caller's transaction. Re-inserting an id
/// already stored is a no-op.
pub async fn insert(conn: &mut PgConnection, event: &AuditEvent) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO audit_events (id, tenant_id, event_type, subject_type, subject_id,
         payload, payload_hash, previous_event_hash, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(event.id.0)
    .bind(event.tenant_id.as_str())
    .bind(&event.event_type)
    .bind(&event.subject_type)
    .bind(&event.subject_id)
    .bind(&event.payload)
    .bind(event.payload_hash.to_hex())
    .bind(event.previous_event_hash.as_ref().map(Sha256Digest::to_hex))
    .bind(*event.created_at.as_datetime())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Every stored event, in insertion order.
pub async fn load_all(pool: &PgPool) -> Result<Vec<AuditEvent>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AuditEventRow>(
        "SELECT id, tenant_id, event_type, subject_type, subject_id,
         payload, payload_hash, previous_event_hash, created_at
         FROM audit_events ORDER BY seq",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(AuditEventRow::into_event).collect()
}

/// Reorder each tenant's events by following the hash links from the
/// genesis event.
///
/// `seq` order is chain order for rows this service wrote, but rows copied in
/// from elsewhere need not be. Events that do not link into the chain are
/// appended after it, so the restore that follows reports them instead of
/// silently dropping them.
pub fn order_by_chain(events: Vec<AuditEvent>) -> Vec<AuditEvent> {
    let mut tenants: Vec<TenantId> = Vec::new();
    let mut by_tenant: HashMap<TenantId, Vec<AuditEvent>> = HashMap::new();
    for event in events {
        if !by_tenant.contains_key(&event.tenant_id) {
            tenants.push(event.tenant_id.clone());
        }
        by_tenant.entry(event.tenant_id.clone()).or_default().push(event);
    }

    let mut ordered = Vec::new();
    for tenant in tenants {
        let Some(mut pending) = by_tenant.remove(&tenant) else {
            continue;
        };
        let mut previous: Option<Sha256Digest> = None;
        while let Some(pos) = pending
            .iter()
            .position(|e| e.previous_event_hash == previous)
        {
            let next = pending.remove(pos);
            previous = Some(next.chain_hash());
            ordered.push(next);
        }
        ordered.extend(pending);
    }
    ordered
}

#[derive(sqlx::FromRow)]
struct AuditEventRow {
    id: Uuid,
    tenant_id: String,
    event_type: String,
    subject_type: String,
    subject_id: String,
    payload: serde_json::Value,
    payload_hash: String,
    previous_event_hash: Option<String>,
    created_at: DateTime<Utc>,
}

impl AuditEventRow {
    fn into_event(self) -> Result<AuditEvent, sqlx::Error> {
        let decode = |e: agora_core::ValidationError| sqlx::Error::Decode(Box::new(e));
        Ok(AuditEvent {
            id: EventId(self.id),
            tenant_id: TenantId::new(self.tenant_id).map_err(decode)?,
            event_type: self.event_type,
            subject_type: self.subject_type,
            subject_id: self.subject_id,
            payload: self.payload,
            payload_hash: Sha256Digest::from_hex(&self.payload_hash).map_err(decode)?,
            previous_event_hash: self
                .previous_event_hash
                .as_deref()
                .map(Sha256Digest::from_hex)
                .transpose()
                .map_err(decode)?,
            created_at: Timestamp::from_utc(self.created_at),
        })
    }
}
