//! Postgres-backed [`Journal`].
//!
//! Each write set becomes one transaction: record rows first, the audit event
//! last. The ledger calls [`Journal::persist`] synchronously under its write
//! guard, so the journal blocks on the runtime handle it was built with.
//! Callers must therefore reach the ledger from a blocking thread
//! (see [`crate::state::AppState::run`]), never from an async task.

use sqlx::PgPool;
use tokio::runtime::Handle;

use agora_ledger::{Journal, JournalError, WriteSet};

use super::{audit, records};

/// Writes each unit in its own transaction.
#[derive(Debug, Clone)]
pub struct PgJournal {
    pool: PgPool,
    handle: Handle,
}

impl PgJournal {
    /// Journal writing to `pool`, driven by `handle`.
    pub fn new(pool: PgPool, handle: Handle) -> Self {
        Self { pool, handle }
    }
}

impl Journal for PgJournal {
    fn persist(&self, writes: &WriteSet) -> Result<(), JournalError> {
        self.handle
            .block_on(write_unit(&self.pool, writes))
            .map_err(|e| JournalError(e.to_string()))
    }
}

/// Write one unit atomically.
pub async fn write_unit(pool: &PgPool, writes: &WriteSet) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for poll in &writes.polls {
        records::upsert_poll(&mut tx, poll).await?;
    }
    for info in &writes.consultations {
        records::upsert_consultation(&mut tx, info).await?;
    }
    for idea in &writes.ideas {
        records::upsert_idea(&mut tx, idea).await?;
    }
    for vote in &writes.votes {
        records::upsert_vote(&mut tx, vote).await?;
    }
    for row in &writes.idea_votes {
        records::put_idea_vote(&mut tx, row).await?;
    }
    if let Some(event) = writes.audit_event() {
        audit::insert(&mut tx, event).await?;
    }
    tx.commit().await
}
