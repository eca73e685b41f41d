//! # Export Bundles
//!
//! A bundle is everything a tenant needs to check its chain offline: every
//! event, in order, plus instructions for recomputing the hashes. JSON keys
//! are camelCase; hashes are lowercase hex; the first event's
//! `previousEventHash` is `null`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use agora_core::{CanonicalBytes, CanonicalizationError, CsvWriter, EventId, Sha256Digest, TenantId, Timestamp, ValidationError};

use crate::event::AuditEvent;
use crate::verify::verify_chain;

/// Verification steps embedded in every bundle.
pub const VERIFICATION_INSTRUCTIONS: &str = "For each event in order: \
(1) canonicalize `payload` with RFC 8785 (JCS: sorted keys, compact separators) \
and check that its SHA-256, as lowercase hex, equals `payloadHash`; \
(2) compute chainHash = SHA-256(bytes(previousEventHash) || bytes(payloadHash)) \
over the raw 32-byte digests, or SHA-256(bytes(payloadHash)) when \
previousEventHash is null; \
(3) check that the first event's previousEventHash is null and that every later \
event's previousEventHash equals the chainHash of the event before it.";

/// Output format for exports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Structured JSON document.
    #[default]
    Json,
    /// Flat CSV.
    Csv,
}

impl std::str::FromStr for ExportFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(ValidationError::InvalidFormat {
                field: "format".into(),
                reason: format!("expected json or csv, got {other:?}"),
            }),
        }
    }
}

/// One event as it appears in a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEvent {
    /// Event id.
    pub id: EventId,
    /// Event type.
    pub event_type: String,
    /// Subject kind.
    pub subject_type: String,
    /// Subject id.
    pub subject_id: String,
    /// Payload document.
    pub payload: Value,
    /// Stored payload hash.
    pub payload_hash: Sha256Digest,
    /// Stored link to the previous event.
    pub previous_event_hash: Option<Sha256Digest>,
    /// Creation instant.
    pub created_at: Timestamp,
}

impl From<&AuditEvent> for BundleEvent {
    fn from(e: &AuditEvent) -> Self {
        Self {
            id: e.id,
            event_type: e.event_type.clone(),
            subject_type: e.subject_type.clone(),
            subject_id: e.subject_id.clone(),
            payload: e.payload.clone(),
            payload_hash: e.payload_hash,
            previous_event_hash: e.previous_event_hash,
            created_at: e.created_at,
        }
    }
}

/// The `verification` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleVerification {
    /// How to check the chain.
    pub instructions: String,
    /// The exporter's own verdict at export time.
    pub chain_valid: bool,
}

/// A complete export of one tenant's chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditBundle {
    /// Export instant.
    pub exported_at: Timestamp,
    /// Tenant.
    pub tenant_id: TenantId,
    /// `events.len()`.
    pub total_events: usize,
    /// Every event, in chain order.
    pub events: Vec<BundleEvent>,
    /// Instructions and verdict.
    pub verification: BundleVerification,
}

impl AuditBundle {
    /// Build a bundle and run the verifier over it to fill `chainValid`.
    pub fn build(tenant_id: TenantId, events: &[AuditEvent], exported_at: Timestamp) -> Self {
        let events: Vec<BundleEvent> = events.iter().map(BundleEvent::from).collect();
        let chain_valid = verify_chain(&events).valid;
        Self {
            exported_at,
            tenant_id,
            total_events: events.len(),
            events,
            verification: BundleVerification {
                instructions: VERIFICATION_INSTRUCTIONS.to_string(),
                chain_valid,
            },
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// One CSV row per event; `payload` is compact canonical JSON and a
    /// missing `previousEventHash` is an empty field.
    pub fn to_csv(&self) -> Result<String, CanonicalizationError> {
        let mut w = CsvWriter::with_header(&[
            "id",
            "eventType",
            "subjectType",
            "subjectId",
            "payload",
            "payloadHash",
            "previousEventHash",
            "createdAt",
        ]);
        for e in &self.events {
            let id = e.id.to_string();
            let payload = CanonicalBytes::new(&e.payload)?.to_text();
            let payload_hash = e.payload_hash.to_hex();
            let previous = e.previous_event_hash.map(|h| h.to_hex()).unwrap_or_default();
            let created_at = e.created_at.to_iso8601();
            w.row([
                id.as_str(),
                e.event_type.as_str(),
                e.subject_type.as_str(),
                e.subject_id.as_str(),
                payload.as_str(),
                payload_hash.as_str(),
                previous.as_str(),
                created_at.as_str(),
            ]);
        }
        Ok(w.finish())
    }

    /// Render in `format`.
    pub fn render(&self, format: ExportFormat) -> Result<String, crate::AuditError> {
        match format {
            ExportFormat::Json => Ok(self.to_json()?),
            ExportFormat::Csv => Ok(self.to_csv()?),
        }
    }
}
