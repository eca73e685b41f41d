//! # Poll & Vote API
//!
//! - **POST `/v1/polls`**: create a standard poll in `draft` (official)
//! - **GET `/v1/polls/{id}`**: read a poll
//! - **POST `/v1/polls/{id}/open`**, **`/close`**: lifecycle (official)
//! - **POST `/v1/polls/{id}/votes`**: cast or change the caller's vote
//! - **GET `/v1/polls/{id}/vote-status`**: whether the caller has voted
//! - **GET `/v1/polls/{id}/results`**: live results, voters only
//! - **GET `/v1/polls/{id}/results/public`**: results of a closed poll
//! - **GET `/v1/polls/{id}/results/export`**: JSON or CSV export
//!
//! The caller's nullifier is derived server-side from the vault secret; it
//! never appears in a request or response.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use agora_core::{OptionId, PollId};
use agora_crypto::derive_nullifier;
use agora_ledger::{NewPoll, PollResults, VoteReceipt, VoteStatus};
use agora_state::{Poll, PollOption, TimeWindow};

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_json, extract_query, path_id, FormatQuery};
use crate::routes::{document_response, extension, filename_part};
use crate::state::AppState;

/// Request to create a standard poll.
#[derive(Debug, Deserialize)]
pub struct CreatePollRequest {
    /// Caller-chosen id; generated when absent.
    #[serde(default)]
    pub id: Option<PollId>,
    /// Question shown to voters, 1 to 200 characters.
    pub title: String,
    /// At least two options with distinct ids.
    pub options: Vec<PollOption>,
    /// Voting window; unbounded when absent.
    #[serde(default)]
    pub window: TimeWindow,
}

/// Request to cast or change a vote.
#[derive(Debug, Deserialize)]
pub struct CastVoteRequest {
    /// Option chosen; replaces any earlier choice.
    pub option_id: OptionId,
}

/// Construct the polls router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/polls", post(create_poll))
        .route("/v1/polls/{id}", get(get_poll))
        .route("/v1/polls/{id}/open", post(open_poll))
        .route("/v1/polls/{id}/close", post(close_poll))
        .route("/v1/polls/{id}/votes", post(cast_vote))
        .route("/v1/polls/{id}/vote-status", get(vote_status))
        .route("/v1/polls/{id}/results", get(results))
        .route("/v1/polls/{id}/results/public", get(public_results))
        .route("/v1/polls/{id}/results/export", get(export_results))
}

async fn create_poll(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreatePollRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Poll>), AppError> {
    require_role(&caller, Role::Official)?;
    let req = extract_json(body)?;
    let recorded = state
        .run(move |ledger, _| {
            let new = NewPoll {
                id: req.id,
                title: req.title,
                options: req.options,
                window: req.window,
            };
            Ok(ledger.create_poll(&caller.actor(), new)?)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(recorded.value)))
}

async fn get_poll(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<Json<Poll>, AppError> {
    let poll_id: PollId = path_id(&id)?;
    let poll = state
        .run(move |ledger, _| Ok(ledger.get_poll(&caller.actor(), &poll_id)?))
        .await?;
    Ok(Json(poll))
}

async fn open_poll(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<Json<Poll>, AppError> {
    require_role(&caller, Role::Official)?;
    let poll_id: PollId = path_id(&id)?;
    let recorded = state
        .run(move |ledger, _| Ok(ledger.open_poll(&caller.actor(), &poll_id)?))
        .await?;
    Ok(Json(recorded.value))
}

async fn close_poll(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<Json<Poll>, AppError> {
    require_role(&caller, Role::Official)?;
    let poll_id: PollId = path_id(&id)?;
    let recorded = state
        .run(move |ledger, _| Ok(ledger.close_poll(&caller.actor(), &poll_id)?))
        .await?;
    Ok(Json(recorded.value))
}

async fn cast_vote(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
    body: Result<Json<CastVoteRequest>, JsonRejection>,
) -> Result<Json<VoteReceipt>, AppError> {
    let poll_id: PollId = path_id(&id)?;
    let req = extract_json(body)?;
    let receipt = state
        .run(move |ledger, vault| {
            let secret = vault.secret_for(&caller.tenant_id, &caller.caller_id)?;
            Ok(ledger.cast_vote_with_secret(&caller.tenant_id, &poll_id, &secret, &req.option_id)?)
        })
        .await?;
    Ok(Json(receipt))
}

async fn vote_status(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<Json<VoteStatus>, AppError> {
    let poll_id: PollId = path_id(&id)?;
    let status = state
        .run(move |ledger, vault| {
            let secret = vault.secret_for(&caller.tenant_id, &caller.caller_id)?;
            let nullifier = derive_nullifier(&poll_id, &secret);
            Ok(ledger.has_voted(&caller.tenant_id, &poll_id, &nullifier)?)
        })
        .await?;
    Ok(Json(status))
}

async fn results(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<Json<PollResults>, AppError> {
    let poll_id: PollId = path_id(&id)?;
    let results = state
        .run(move |ledger, vault| {
            let secret = vault.secret_for(&caller.tenant_id, &caller.caller_id)?;
            let nullifier = derive_nullifier(&poll_id, &secret);
            Ok(ledger.get_results(&caller.tenant_id, &poll_id, &nullifier)?)
        })
        .await?;
    Ok(Json(results))
}

async fn public_results(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<Json<PollResults>, AppError> {
    let poll_id: PollId = path_id(&id)?;
    let results = state
        .run(move |ledger, _| Ok(ledger.get_public_results(&caller.tenant_id, &poll_id)?))
        .await?;
    Ok(Json(results))
}

async fn export_results(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
    query: Result<Query<FormatQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let poll_id: PollId = path_id(&id)?;
    let format = extract_query(query)?.format();
    let export = {
        let poll_id = poll_id.clone();
        state
            .run(move |ledger, _| Ok(ledger.export_results(&caller.tenant_id, &poll_id, format)?))
            .await?
    };
    let filename = format!(
        "results-{}.{}",
        filename_part(poll_id.as_str()),
        extension(export.content_type)
    );
    Ok(document_response(export.content_type, filename, export.body))
}
