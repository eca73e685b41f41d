//! # Results Aggregator
//!
//! Counts live votes per option. While a poll is open, results are shown
//! only to nullifiers that have voted; once it closes they are public and
//! exportable.

use serde::Serialize;

use agora_audit::ExportFormat;
use agora_core::{CsvWriter, OptionId, PollId, TenantId};
use agora_crypto::Nullifier;
use agora_state::{Poll, PollStatus};

use crate::error::LedgerError;
use crate::store::{Tables, TransactionalStore};
use crate::Ledger;

/// One option's share.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionTally {
    /// Option id.
    pub option_id: OptionId,
    /// Option text.
    pub option_text: String,
    /// Live votes.
    pub count: u64,
    /// `count / total × 100`, two decimals; zero when nobody voted.
    pub percentage: f64,
}

/// Aggregated results of a poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollResults {
    /// Poll.
    pub poll_id: PollId,
    /// Poll title.
    pub title: String,
    /// Poll status at computation time.
    pub status: PollStatus,
    /// Live votes across all options.
    pub total_votes: u64,
    /// Every current option, in the poll's order.
    pub options: Vec<OptionTally>,
}

/// A rendered results document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsExport {
    /// MIME type of `body`.
    pub content_type: &'static str,
    /// Rendered document.
    pub body: String,
}

fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 / total as f64 * 10_000.0).round() / 100.0
}

fn compute(t: &Tables, poll: &Poll) -> PollResults {
    let counts = t.votes.tally(&poll.id);
    // Votes for options no longer on the poll are not counted.
    let tallies: Vec<(&agora_state::PollOption, u64)> = poll
        .options
        .iter()
        .map(|o| (o, counts.get(&o.id).copied().unwrap_or(0)))
        .collect();
    let total: u64 = tallies.iter().map(|(_, c)| c).sum();
    PollResults {
        poll_id: poll.id.clone(),
        title: poll.title.clone(),
        status: poll.status,
        total_votes: total,
        options: tallies
            .into_iter()
            .map(|(o, count)| OptionTally {
                option_id: o.id.clone(),
                option_text: o.text.clone(),
                count,
                percentage: percentage(count, total),
            })
            .collect(),
    }
}

impl PollResults {
    /// `option_id,option_text,count,percentage`, one row per option.
    pub fn to_csv(&self) -> String {
        let mut w = CsvWriter::with_header(&["option_id", "option_text", "count", "percentage"]);
        for o in &self.options {
            let count = o.count.to_string();
            let pct = format!("{:.2}", o.percentage);
            w.row([o.option_id.as_str(), o.option_text.as_str(), count.as_str(), pct.as_str()]);
        }
        w.finish()
    }
}

impl<S: TransactionalStore> Ledger<S> {
    /// Results for a voter. Fails with [`LedgerError::MustVoteFirst`] unless
    /// `nullifier` has a live vote in the poll.
    pub fn get_results(
        &self,
        tenant_id: &TenantId,
        poll_id: &PollId,
        nullifier: &Nullifier,
    ) -> Result<PollResults, LedgerError> {
        self.store.read(|t| {
            let poll = t.poll(tenant_id, poll_id)?;
            if t.votes.live_vote(poll_id, nullifier).is_none() {
                return Err(LedgerError::MustVoteFirst);
            }
            Ok(compute(t, poll))
        })
    }

    /// Results of a closed poll, for anyone in the tenant.
    pub fn get_public_results(
        &self,
        tenant_id: &TenantId,
        poll_id: &PollId,
    ) -> Result<PollResults, LedgerError> {
        self.store.read(|t| {
            let poll = t.poll(tenant_id, poll_id)?;
            poll.require_closed()?;
            Ok(compute(t, poll))
        })
    }

    /// Public results rendered as JSON or CSV.
    pub fn export_results(
        &self,
        tenant_id: &TenantId,
        poll_id: &PollId,
        format: ExportFormat,
    ) -> Result<ResultsExport, LedgerError> {
        let results = self.get_public_results(tenant_id, poll_id)?;
        Ok(match format {
            ExportFormat::Json => ResultsExport {
                content_type: "application/json",
                body: serde_json::to_string_pretty(&results)?,
            },
            ExportFormat::Csv => ResultsExport {
                content_type: "text/csv; charset=utf-8",
                body: results.to_csv(),
            },
        })
    }
}
