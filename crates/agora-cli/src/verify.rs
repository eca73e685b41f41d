//! # Verify Subcommand
//!
//! Reads a bundle file, runs [`agora_audit::verify_bundle_str`] over it and
//! prints a human-readable report. The report goes to the supplied writer so
//! tests can capture it; diagnostics go through `tracing`.

use std::io::Write;
use std::path::Path;

use anyhow::Result;

use agora_audit::BundleReport;

/// The chain verified.
pub const EXIT_VALID: u8 = 0;
/// The bundle was read but the chain or its envelope is broken.
pub const EXIT_INVALID: u8 = 1;
/// The file could not be read or is not JSON.
pub const EXIT_UNREADABLE: u8 = 2;

/// Verify the bundle at `path` and write the report to `out`.
///
/// Returns the process exit code. `Err` only when writing the report fails.
pub fn run_verify(path: &Path, verbose: bool, out: &mut impl Write) -> Result<u8> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "cannot read bundle");
            writeln!(out, "error: cannot read {}: {e}", path.display())?;
            return Ok(EXIT_UNREADABLE);
        }
    };

    let report = match agora_audit::verify_bundle_str(&text) {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "bundle is not JSON");
            writeln!(out, "error: {} is not valid JSON: {e}", path.display())?;
            return Ok(EXIT_UNREADABLE);
        }
    };

    tracing::debug!(
        events = report.verification.stats.total,
        valid = report.valid,
        "bundle verified"
    );
    print_report(&report, verbose, out)?;
    Ok(if report.valid { EXIT_VALID } else { EXIT_INVALID })
}

fn print_report(report: &BundleReport, verbose: bool, out: &mut impl Write) -> std::io::Result<()> {
    let meta = &report.metadata;
    let or_missing = |v: Option<&str>| v.unwrap_or("(missing)").to_string();

    writeln!(out, "Bundle")?;
    writeln!(out, "  tenant:       {}", or_missing(meta.tenant_id.as_deref()))?;
    writeln!(out, "  exported at:  {}", or_missing(meta.exported_at.as_deref()))?;
    writeln!(
        out,
        "  total events: {}",
        meta.total_events.map_or_else(|| "(missing)".to_string(), |n| n.to_string())
    )?;
    writeln!(
        out,
        "  claims valid: {}",
        meta.claimed_chain_valid.map_or_else(|| "(missing)".to_string(), |b| b.to_string())
    )?;

    if !report.warnings.is_empty() {
        writeln!(out)?;
        writeln!(out, "Warnings")?;
        for w in &report.warnings {
            writeln!(out, "  - {w}")?;
        }
    }

    if !report.bundle_errors.is_empty() {
        writeln!(out)?;
        writeln!(out, "Bundle errors")?;
        for e in &report.bundle_errors {
            writeln!(out, "  - {e}")?;
        }
    }

    let verification = &report.verification;
    if !verification.errors.is_empty() {
        writeln!(out)?;
        writeln!(out, "Event errors")?;
        for issue in &verification.errors {
            let id = issue.event_id.as_deref().unwrap_or("?");
            writeln!(out, "  [{}] {id}: {}", issue.index, issue.message)?;
            if verbose {
                writeln!(out, "        fault: {:?}", issue.fault)?;
            }
        }
    }

    let stats = verification.stats;
    writeln!(out)?;
    writeln!(out, "Statistics")?;
    writeln!(out, "  events checked: {}", stats.total)?;
    writeln!(out, "  valid hashes:   {}/{}", stats.valid_hashes, stats.total)?;
    writeln!(out, "  valid links:    {}/{}", stats.valid_links, stats.total)?;
    writeln!(out)?;

    if report.valid {
        writeln!(out, "VALID: audit chain verified ({} events)", stats.total)
    } else {
        let failing = verification.failing_indices();
        if failing.is_empty() {
            writeln!(out, "INVALID: bundle is structurally broken")
        } else {
            let list: Vec<String> = failing.iter().map(usize::to_string).collect();
            writeln!(out, "INVALID: chain broken at event index {}", list.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_audit::{AuditBundle, AuditLog, NewAuditEvent};
    use agora_core::{TenantId, Timestamp};
    use serde_json::{json, Value};

    fn exported_bundle(n: u64) -> Value {
        let tenant = TenantId::new("lyon").unwrap();
        let now = Timestamp::parse("2026-05-01T09:00:00Z").unwrap();
        let mut log = AuditLog::new();
        for i in 0..n {
            log.append(
                NewAuditEvent::new(tenant.clone(), "poll.created", "poll", format!("P{i}"), json!({ "title": format!("Poll {i}") })),
                now,
            )
            .unwrap();
        }
        let bundle = AuditBundle::build(tenant.clone(), log.events(&tenant), now);
        serde_json::from_str(&bundle.to_json().unwrap()).unwrap()
    }

    fn run_on(contents: &str, verbose: bool) -> (u8, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        std::fs::write(&path, contents).unwrap();
        let mut out = Vec::new();
        let code = run_verify(&path, verbose, &mut out).unwrap();
        (code, String::from_utf8(out).unwrap())
    }

    #[test]
    fn exported_bundle_is_valid() {
        let (code, out) = run_on(&exported_bundle(4).to_string(), false);
        assert_eq!(code, EXIT_VALID, "{out}");
        assert!(out.contains("tenant:       lyon"));
        assert!(out.contains("valid hashes:   4/4"));
        assert!(out.trim_end().ends_with("VALID: audit chain verified (4 events)"));
    }

    #[test]
    fn tampered_bundle_is_invalid_and_names_the_index() {
        let mut doc = exported_bundle(4);
        doc["events"][2]["payload"] = json!({ "title": "Rewritten" });
        let (code, out) = run_on(&doc.to_string(), true);
        assert_eq!(code, EXIT_INVALID);
        assert!(out.contains("[2]"), "{out}");
        assert!(out.contains("PayloadHashMismatch"));
        assert!(out.contains("Warnings"));
        assert!(out.trim_end().ends_with("INVALID: chain broken at event index 2"));
    }

    #[test]
    fn empty_chain_is_valid() {
        let (code, out) = run_on(&exported_bundle(0).to_string(), false);
        assert_eq!(code, EXIT_VALID, "{out}");
        assert!(out.contains("events checked: 0"));
    }

    #[test]
    fn bundle_without_events_is_invalid() {
        let (code, out) = run_on(r#"{"tenantId": "lyon"}"#, false);
        assert_eq!(code, EXIT_INVALID);
        assert!(out.contains("Bundle errors"));
        assert!(out.contains("INVALID: bundle is structurally broken"));
    }

    #[test]
    fn non_json_file_is_unreadable() {
        let (code, out) = run_on("this is not json", false);
        assert_eq!(code, EXIT_UNREADABLE);
        assert!(out.starts_with("error:"));
    }

    #[test]
    fn missing_file_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        let code = run_verify(&dir.path().join("absent.json"), false, &mut out).unwrap();
        assert_eq!(code, EXIT_UNREADABLE);
    }
}
