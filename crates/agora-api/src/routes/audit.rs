//! # Audit API
//!
//! - **GET `/v1/audit/events`**: filtered, paginated listing of the
//!   caller's tenant chain (official)
//! - **GET `/v1/audit/export`**: export bundle as JSON or CSV (official)
//! - **POST `/v1/audit/verify`**: verify a posted bundle document
//!
//! The tenant always comes from the caller context; there is no way to name
//! another tenant's chain.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::HeaderValue;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use agora_audit::{verify_bundle_value, AuditFilter, AuditPage, BundleReport, Pagination};
use agora_core::Timestamp;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_json, extract_query, FormatQuery};
use crate::routes::{document_response, extension, filename_part};
use crate::state::AppState;

/// Query parameters for listing audit events.
#[derive(Debug, Default, Deserialize)]
pub struct AuditQueryParams {
    /// Exact event type, e.g. `poll.opened`.
    pub event_type: Option<String>,
    /// Exact subject type: `poll` or `idea`.
    pub subject_type: Option<String>,
    /// Exact subject id.
    pub subject_id: Option<String>,
    /// Inclusive lower bound on `created_at`, RFC 3339 with `Z`.
    pub from: Option<String>,
    /// Inclusive upper bound on `created_at`.
    pub to: Option<String>,
    /// Maximum number of items to return (default: 100, max: 1000).
    pub limit: Option<usize>,
    /// Number of items to skip (default: 0).
    pub offset: Option<usize>,
}

/// Construct the audit router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/audit/events", get(list_events))
        .route("/v1/audit/export", get(export_bundle))
        .route("/v1/audit/verify", post(verify_bundle))
}

async fn list_events(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<AuditQueryParams>, QueryRejection>,
) -> Result<Json<AuditPage>, AppError> {
    require_role(&caller, Role::Official)?;
    let params = extract_query(query)?;
    let filter = AuditFilter {
        event_type: params.event_type,
        subject_type: params.subject_type,
        subject_id: params.subject_id,
        created_from: params.from.as_deref().map(Timestamp::parse).transpose()?,
        created_to: params.to.as_deref().map(Timestamp::parse).transpose()?,
        ..AuditFilter::tenant(caller.tenant_id.clone())
    };
    let page = Pagination::new(params.limit, params.offset);
    let listing = state
        .run(move |ledger, _| Ok(ledger.list_audit(&filter, page)))
        .await?;
    Ok(Json(listing))
}

async fn export_bundle(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<FormatQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    require_role(&caller, Role::Official)?;
    let format = extract_query(query)?.format();
    let tenant_id = caller.tenant_id.clone();
    let export = state
        .run(move |ledger, _| Ok(ledger.export_audit_bundle(&tenant_id, format)?))
        .await?;
    tracing::info!(
        tenant_id = %caller.tenant_id,
        events = export.total_events,
        chain_valid = export.chain_valid,
        "audit bundle exported"
    );
    let filename = format!(
        "audit-{}.{}",
        filename_part(caller.tenant_id.as_str()),
        extension(export.content_type)
    );
    let mut response = document_response(export.content_type, filename, export.body);
    response.headers_mut().insert(
        "x-agora-chain-valid",
        HeaderValue::from_static(if export.chain_valid { "true" } else { "false" }),
    );
    Ok(response)
}

/// Verify an uploaded bundle. Always 200 for a JSON body; the verdict is
/// in `valid`.
async fn verify_bundle(
    _caller: CallerIdentity,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<BundleReport>, AppError> {
    let doc = extract_json(body)?;
    let report = verify_bundle_value(&doc);
    if !report.valid {
        tracing::warn!(
            errors = report.verification.errors.len(),
            bundle_errors = report.bundle_errors.len(),
            "submitted audit bundle failed verification"
        );
    }
    Ok(Json(report))
}
