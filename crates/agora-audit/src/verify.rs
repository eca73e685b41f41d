//! # Chain Verifier
//!
//! Pure functions over an ordered event sequence. No storage, no clock.
//!
//! For every event `i`:
//!
//! - **hash check**: the stored `payloadHash` equals a fresh hash of the
//!   payload's canonical form;
//! - **link check**: event 0 has no `previousEventHash`; event `i > 0` has
//!   `previousEventHash == chain_hash(event[i-1])`.
//!
//! The two checks are independent, so a rewritten payload is caught by its
//! own hash check even if the attacker also recomputed `payloadHash`: the
//! following event's link then fails instead.
//!
//! [`verify_bundle_value()`] wraps the chain check with tolerant parsing of
//! the bundle envelope. Structural problems become warnings or per-event
//! issues; nothing here panics on untrusted input.

use serde::Serialize;
use serde_json::Value;

use agora_core::Sha256Digest;

use crate::bundle::BundleEvent;
use crate::chain::{chain_hash, payload_hash};

/// What went wrong with one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventFault {
    /// Stored payload hash differs from the recomputed one.
    PayloadHashMismatch,
    /// The payload cannot be canonicalized.
    PayloadNotCanonicalizable,
    /// The first event carries a previous hash.
    UnexpectedPreviousHash,
    /// A later event is missing its previous hash.
    MissingPreviousHash,
    /// The previous hash does not match the predecessor's chain hash.
    BrokenLink,
    /// The predecessor could not be parsed, so the link cannot be checked.
    UnverifiableLink,
    /// The event itself could not be parsed.
    Malformed,
}

/// One finding, tied to an event position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventIssue {
    /// Zero-based position in the sequence.
    pub index: usize,
    /// Event id, when readable.
    pub event_id: Option<String>,
    /// Classification.
    pub fault: EventFault,
    /// Human-readable detail.
    pub message: String,
}

/// Counters over the whole sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStats {
    /// Events examined.
    pub total: usize,
    /// Events whose payload hash checked out.
    pub valid_hashes: usize,
    /// Events whose link checked out.
    pub valid_links: usize,
}

/// Verdict for a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainVerification {
    /// True iff no issues were found.
    pub valid: bool,
    /// Every issue, in index order.
    pub errors: Vec<EventIssue>,
    /// Counters.
    pub stats: ChainStats,
}

impl ChainVerification {
    /// Indices with at least one issue.
    pub fn failing_indices(&self) -> Vec<usize> {
        let mut v: Vec<usize> = self.errors.iter().map(|e| e.index).collect();
        v.dedup();
        v
    }
}

/// Verify a typed event sequence.
pub fn verify_chain(events: &[BundleEvent]) -> ChainVerification {
    let entries: Vec<Result<&BundleEvent, &Malformed>> = events.iter().map(Ok).collect();
    verify_entries(&entries)
}

struct Malformed {
    event_id: Option<String>,
    reason: String,
}

fn verify_entries(entries: &[Result<&BundleEvent, &Malformed>]) -> ChainVerification {
    let mut errors = Vec::new();
    let mut stats = ChainStats {
        total: entries.len(),
        ..ChainStats::default()
    };
    // Chain hash of the previous entry; `Err(())` when it was unreadable.
    let mut previous: Option<Result<Sha256Digest, ()>> = None;

    for (index, entry) in entries.iter().enumerate() {
        let event = match entry {
            Ok(event) => *event,
            Err(m) => {
                errors.push(EventIssue {
                    index,
                    event_id: m.event_id.clone(),
                    fault: EventFault::Malformed,
                    message: m.reason.clone(),
                });
                previous = Some(Err(()));
                continue;
            }
        };
        let event_id = Some(event.id.to_string());
        let mut issue = |fault: EventFault, message: String| {
            errors.push(EventIssue {
                index,
                event_id: event_id.clone(),
                fault,
                message,
            });
        };

        match payload_hash(&event.payload) {
            Ok(h) if h == event.payload_hash => stats.valid_hashes += 1,
            Ok(h) => issue(
                EventFault::PayloadHashMismatch,
                format!("payloadHash is {} but payload hashes to {}", event.payload_hash, h),
            ),
            Err(e) => issue(EventFault::PayloadNotCanonicalizable, e.to_string()),
        }

        match (&previous, &event.previous_event_hash) {
            (None, None) => stats.valid_links += 1,
            (None, Some(_)) => issue(
                EventFault::UnexpectedPreviousHash,
                "first event must have a null previousEventHash".into(),
            ),
            (Some(Err(())), _) => issue(
                EventFault::UnverifiableLink,
                "previous event is malformed; link cannot be checked".into(),
            ),
            (Some(Ok(_)), None) => issue(
                EventFault::MissingPreviousHash,
                "previousEventHash is null but this is not the first event".into(),
            ),
            (Some(Ok(expected)), Some(actual)) if expected == actual => stats.valid_links += 1,
            (Some(Ok(expected)), Some(actual)) => issue(
                EventFault::BrokenLink,
                format!("previousEventHash is {actual} but the previous event chains to {expected}"),
            ),
        }

        previous = Some(Ok(chain_hash(&event.payload_hash, event.previous_event_hash.as_ref())));
    }

    ChainVerification {
        valid: errors.is_empty(),
        errors,
        stats,
    }
}

/// Envelope fields reported alongside the verdict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleMetadata {
    /// `exportedAt`, as given.
    pub exported_at: Option<String>,
    /// `tenantId`, as given.
    pub tenant_id: Option<String>,
    /// `totalEvents`, as given.
    pub total_events: Option<u64>,
    /// `verification.chainValid`, as given.
    pub claimed_chain_valid: Option<bool>,
}

/// Full report for a bundle document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleReport {
    /// Overall verdict.
    pub valid: bool,
    /// Envelope fields.
    pub metadata: BundleMetadata,
    /// Structural findings that do not by themselves break the chain.
    pub warnings: Vec<String>,
    /// Structural findings that make the bundle unverifiable.
    pub bundle_errors: Vec<String>,
    /// Chain verdict.
    pub verification: ChainVerification,
}

/// Parse and verify a bundle given as JSON text.
///
/// # Errors
///
/// Only when `text` is not JSON at all.
pub fn verify_bundle_str(text: &str) -> Result<BundleReport, serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;
    Ok(verify_bundle_value(&value))
}

/// Verify a parsed bundle document.
pub fn verify_bundle_value(doc: &Value) -> BundleReport {
    let mut warnings = Vec::new();
    let mut bundle_errors = Vec::new();

    let Some(obj) = doc.as_object() else {
        bundle_errors.push("bundle is not a JSON object".to_string());
        return BundleReport {
            valid: false,
            metadata: BundleMetadata::default(),
            warnings,
            bundle_errors,
            verification: verify_entries(&[]),
        };
    };

    let metadata = BundleMetadata {
        exported_at: obj.get("exportedAt").and_then(Value::as_str).map(str::to_string),
        tenant_id: obj.get("tenantId").and_then(Value::as_str).map(str::to_string),
        total_events: obj.get("totalEvents").and_then(Value::as_u64),
        claimed_chain_valid: obj
            .get("verification")
            .and_then(|v| v.get("chainValid"))
            .and_then(Value::as_bool),
    };
    for (field, present) in [
        ("exportedAt", metadata.exported_at.is_some()),
        ("tenantId", metadata.tenant_id.is_some()),
        ("totalEvents", metadata.total_events.is_some()),
        ("verification.chainValid", metadata.claimed_chain_valid.is_some()),
    ] {
        if !present {
            warnings.push(format!("missing or malformed metadata field `{field}`"));
        }
    }

    let raw_events: &[Value] = match obj.get("events") {
        Some(Value::Array(items)) => items,
        Some(_) => {
            bundle_errors.push("`events` is not an array".to_string());
            &[]
        }
        None => {
            bundle_errors.push("bundle has no `events` array".to_string());
            &[]
        }
    };

    let parsed: Vec<Result<BundleEvent, Malformed>> = raw_events
        .iter()
        .map(|raw| {
            serde_json::from_value::<BundleEvent>(raw.clone()).map_err(|e| Malformed {
                event_id: raw.get("id").and_then(Value::as_str).map(str::to_string),
                reason: format!("event cannot be parsed: {e}"),
            })
        })
        .collect();
    let entries: Vec<Result<&BundleEvent, &Malformed>> = parsed.iter().map(Result::as_ref).collect();
    let verification = verify_entries(&entries);

    if let Some(claimed) = metadata.total_events {
        if claimed != raw_events.len() as u64 {
            warnings.push(format!(
                "totalEvents says {claimed} but bundle contains {} events",
                raw_events.len()
            ));
        }
    }
    if let Some(claimed) = metadata.claimed_chain_valid {
        if claimed != verification.valid {
            warnings.push(format!(
                "bundle claims chainValid={claimed} but verification found valid={}",
                verification.valid
            ));
        }
    }

    BundleReport {
        valid: bundle_errors.is_empty() && verification.valid,
        metadata,
        warnings,
        bundle_errors,
        verification,
    }
}
