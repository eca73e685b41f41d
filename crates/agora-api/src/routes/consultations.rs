//! # Consultation API
//!
//! - **POST `/v1/consultations`**: create a consultation (official)
//! - **GET `/v1/consultations/{id}`**: poll, stage info and idea count
//! - **GET/POST `/v1/consultations/{id}/ideas`**: list / submit ideas
//! - **POST `/v1/ideas/{id}/votes`**: toggle an up- or downvote
//! - **POST `/v1/consultations/{id}/transition`**: advance the stage (official)
//! - **POST `/v1/consultations/{id}/finalize`**: compute winners (official)
//!
//! Final-arbitration votes go through the poll vote endpoint; a consultation
//! is a poll.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use agora_core::{IdeaId, PollId};
use agora_ledger::{ConsultationView, FinalizeOutcome, IdeaVoteOutcome, NewConsultation, TransitionOutcome};
use agora_state::{ConsultationStage, ConsultationThresholds, Idea, IdeaVoteType, StageWindows};

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_json, path_id};
use crate::state::AppState;

/// Request to create a consultation.
#[derive(Debug, Deserialize)]
pub struct CreateConsultationRequest {
    /// Caller-chosen poll id; generated when absent.
    #[serde(default)]
    pub id: Option<PollId>,
    /// Consultation question, 1 to 200 characters.
    pub title: String,
    /// Per-stage windows; every stage unbounded when absent.
    #[serde(default)]
    pub windows: StageWindows,
    /// Idea count needed to leave idea collection, and shortlist size.
    pub thresholds: ConsultationThresholds,
}

/// Request to submit an idea.
#[derive(Debug, Deserialize)]
pub struct SubmitIdeaRequest {
    /// Idea title, 1 to 200 characters.
    pub title: String,
    /// Free text, up to 5000 characters; empty when absent.
    #[serde(default)]
    pub description: String,
}

/// Request to vote on an idea.
#[derive(Debug, Deserialize)]
pub struct IdeaVoteRequest {
    /// Repeating the current vote withdraws it.
    pub vote: IdeaVoteType,
}

/// Request to advance a consultation.
#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    /// Must be the stage immediately after the current one.
    pub stage: ConsultationStage,
}

/// Construct the consultations router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/consultations", post(create_consultation))
        .route("/v1/consultations/{id}", get(get_consultation))
        .route(
            "/v1/consultations/{id}/ideas",
            get(list_ideas).post(submit_idea),
        )
        .route("/v1/consultations/{id}/transition", post(transition_stage))
        .route("/v1/consultations/{id}/finalize", post(finalize))
        .route("/v1/ideas/{id}/votes", post(vote_on_idea))
}

async fn create_consultation(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateConsultationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ConsultationView>), AppError> {
    require_role(&caller, Role::Official)?;
    let req = extract_json(body)?;
    let recorded = state
        .run(move |ledger, _| {
            let new = NewConsultation {
                id: req.id,
                title: req.title,
                windows: req.windows,
                thresholds: req.thresholds,
            };
            Ok(ledger.create_consultation(&caller.actor(), new)?)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(recorded.value)))
}

async fn get_consultation(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<Json<ConsultationView>, AppError> {
    let poll_id: PollId = path_id(&id)?;
    let view = state
        .run(move |ledger, _| Ok(ledger.get_consultation(&caller.actor(), &poll_id)?))
        .await?;
    Ok(Json(view))
}

async fn list_ideas(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<Json<Vec<Idea>>, AppError> {
    let poll_id: PollId = path_id(&id)?;
    let ideas = state
        .run(move |ledger, _| Ok(ledger.list_ideas(&caller.actor(), &poll_id)?))
        .await?;
    Ok(Json(ideas))
}

async fn submit_idea(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
    body: Result<Json<SubmitIdeaRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Idea>), AppError> {
    let poll_id: PollId = path_id(&id)?;
    let req = extract_json(body)?;
    let recorded = state
        .run(move |ledger, _| {
            Ok(ledger.submit_idea(&caller.actor(), &poll_id, &req.title, &req.description)?)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(recorded.value)))
}

async fn vote_on_idea(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
    body: Result<Json<IdeaVoteRequest>, JsonRejection>,
) -> Result<Json<IdeaVoteOutcome>, AppError> {
    let idea_id: IdeaId = path_id(&id)?;
    let req = extract_json(body)?;
    let outcome = state
        .run(move |ledger, _| Ok(ledger.vote_on_idea(&caller.actor(), &idea_id, req.vote)?))
        .await?;
    Ok(Json(outcome))
}

async fn transition_stage(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
    body: Result<Json<TransitionRequest>, JsonRejection>,
) -> Result<Json<TransitionOutcome>, AppError> {
    require_role(&caller, Role::Official)?;
    let poll_id: PollId = path_id(&id)?;
    let req = extract_json(body)?;
    let recorded = state
        .run(move |ledger, _| Ok(ledger.transition_stage(&caller.actor(), &poll_id, req.stage)?))
        .await?;
    Ok(Json(recorded.value))
}

async fn finalize(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<Json<FinalizeOutcome>, AppError> {
    require_role(&caller, Role::Official)?;
    let poll_id: PollId = path_id(&id)?;
    let recorded = state
        .run(move |ledger, _| Ok(ledger.finalize_consultation(&caller.actor(), &poll_id)?))
        .await?;
    Ok(Json(recorded.value))
}
