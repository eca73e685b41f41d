//! # Extraction Helpers
//!
//! Handlers take `Result<Json<T>, JsonRejection>` (and the `Query`
//! equivalent) so malformed input is reported in the API's own error body
//! rather than axum's plain-text rejection.

use std::str::FromStr;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::Json;
use serde::Deserialize;

use agora_audit::ExportFormat;
use agora_core::ValidationError;

use crate::error::AppError;

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract query parameters, mapping parse errors to [`AppError::BadRequest`].
pub fn extract_query<T>(result: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    result
        .map(|Query(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Parse a path segment into an identifier newtype (422 on failure).
pub fn path_id<T>(raw: &str) -> Result<T, AppError>
where
    T: FromStr<Err = ValidationError>,
{
    raw.parse().map_err(AppError::from)
}

/// `?format=json|csv`, defaulting to JSON.
#[derive(Debug, Default, Deserialize)]
pub struct FormatQuery {
    #[serde(default)]
    pub format: Option<ExportFormat>,
}

impl FormatQuery {
    /// The requested format, or JSON.
    pub fn format(&self) -> ExportFormat {
        self.format.unwrap_or_default()
    }
}
