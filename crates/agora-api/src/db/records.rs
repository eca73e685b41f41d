//! Ledger record persistence.
//!
//! One upsert per row kind, each taking the open transaction of the unit
//! being journaled, and a bulk [`load_snapshot`] for startup. Records are
//! stored whole as JSONB and decoded back with their serde representation.

use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use agora_core::{IdeaId, UserId};
use agora_ledger::{IdeaVoteRow, Snapshot, VoteRecord};
use agora_state::{ConsultationStageInfo, Idea, IdeaVoteState, Poll};

/// Insert or replace a poll.
pub async fn upsert_poll(conn: &mut PgConnection, poll: &Poll) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO polls (id, tenant_id, record) VALUES ($1, $2, $3)
         ON CONFLICT (id) DO UPDATE SET record = EXCLUDED.record, updated_at = now()",
    )
    .bind(poll.id.as_str())
    .bind(poll.tenant_id.as_str())
    .bind(Json(poll))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Insert or replace a consultation's stage state.
pub async fn upsert_consultation(
    conn: &mut PgConnection,
    info: &ConsultationStageInfo,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO consultations (poll_id, record) VALUES ($1, $2)
         ON CONFLICT (poll_id) DO UPDATE SET record = EXCLUDED.record, updated_at = now()",
    )
    .bind(info.poll_id.as_str())
    .bind(Json(info))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Insert or replace an idea.
pub async fn upsert_idea(conn: &mut PgConnection, idea: &Idea) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO ideas (id, poll_id, sequence, record) VALUES ($1, $2, $3, $4)
         ON CONFLICT (id) DO UPDATE SET record = EXCLUDED.record, updated_at = now()",
    )
    .bind(idea.id.as_str())
    .bind(idea.poll_id.as_str())
    .bind(i64::try_from(idea.sequence).unwrap_or(i64::MAX))
    .bind(Json(idea))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Insert a vote version, or stamp an existing one as superseded.
pub async fn upsert_vote(conn: &mut PgConnection, vote: &VoteRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO votes (id, poll_id, nullifier, live, record) VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (id) DO UPDATE SET live = EXCLUDED.live, record = EXCLUDED.record",
    )
    .bind(vote.id.0)
    .bind(vote.poll_id.as_str())
    .bind(vote.nullifier.to_hex())
    .bind(vote.is_live())
    .bind(Json(vote))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Record a user's idea vote; [`IdeaVoteState::None`] deletes the row.
pub async fn put_idea_vote(conn: &mut PgConnection, row: &IdeaVoteRow) -> Result<(), sqlx::Error> {
    if row.state == IdeaVoteState::None {
        sqlx::query("DELETE FROM idea_votes WHERE idea_id = $1 AND user_id = $2")
            .bind(row.idea_id.as_str())
            .bind(row.user_id.as_str())
            .execute(&mut *conn)
            .await?;
        return Ok(());
    }
    sqlx::query(
        "INSERT INTO idea_votes (idea_id, user_id, state) VALUES ($1, $2, $3)
         ON CONFLICT (idea_id, user_id) DO UPDATE SET state = EXCLUDED.state",
    )
    .bind(row.idea_id.as_str())
    .bind(row.user_id.as_str())
    .bind(Json(row.state))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Every stored row, ready for [`agora_ledger::Ledger::restore_snapshot`].
pub async fn load_snapshot(pool: &PgPool) -> Result<Snapshot, sqlx::Error> {
    let polls = sqlx::query_scalar::<_, Json<Poll>>("SELECT record FROM polls ORDER BY created_at")
        .fetch_all(pool)
        .await?;
    let consultations =
        sqlx::query_scalar::<_, Json<ConsultationStageInfo>>("SELECT record FROM consultations")
            .fetch_all(pool)
            .await?;
    let ideas = sqlx::query_scalar::<_, Json<Idea>>("SELECT record FROM ideas ORDER BY poll_id, sequence")
        .fetch_all(pool)
        .await?;
    let votes = sqlx::query_scalar::<_, Json<VoteRecord>>("SELECT record FROM votes")
        .fetch_all(pool)
        .await?;
    let idea_votes = sqlx::query_as::<_, (String, String, Json<IdeaVoteState>)>(
        "SELECT idea_id, user_id, state FROM idea_votes",
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|(idea_id, user_id, state)| {
        let decode = |e: agora_core::ValidationError| sqlx::Error::Decode(Box::new(e));
        Ok(IdeaVoteRow {
            idea_id: IdeaId::new(idea_id).map_err(decode)?,
            user_id: UserId::new(user_id).map_err(decode)?,
            state: state.0,
        })
    })
    .collect::<Result<Vec<_>, sqlx::Error>>()?;

    let audit = crate::db::audit::order_by_chain(crate::db::audit::load_all(pool).await?);

    Ok(Snapshot {
        polls: polls.into_iter().map(|j| j.0).collect(),
        consultations: consultations.into_iter().map(|j| j.0).collect(),
        ideas: ideas.into_iter().map(|j| j.0).collect(),
        votes: votes.into_iter().map(|j| j.0).collect(),
        idea_votes,
        audit,
    })
}
