//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Domain errors are mapped through their [`ErrorKind`], never their
//! concrete type, so every crate's failures land on the same status codes.
//! Internal error details are never returned to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use agora_core::{ErrorKind, ValidationError};
use agora_ledger::LedgerError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "STATE_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found, or owned by another tenant (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body or query could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid credentials (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Role or ownership violation (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Not allowed in the current poll or consultation state (409).
    #[error("{0}")]
    State(String),

    /// A concurrent writer or an existing record won (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Hash or chain mismatch (422).
    #[error("integrity error: {0}")]
    Integrity(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::State(_) => (StatusCode::CONFLICT, "STATE_ERROR"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Integrity(_) => (StatusCode::UNPROCESSABLE_ENTITY, "INTEGRITY_ERROR"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// Wrap `message` in the variant for `kind`.
    pub fn from_kind(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::Validation => Self::Validation(message),
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::State => Self::State(message),
            ErrorKind::Forbidden => Self::Forbidden(message),
            ErrorKind::Conflict => Self::Conflict(message),
            ErrorKind::Integrity => Self::Integrity(message),
            ErrorKind::Internal => Self::Internal(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::State(msg) => msg.clone(),
            other => other.to_string(),
        };

        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        Self::from_kind(err.kind(), err.to_string())
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::IdeaId;
    use agora_state::{ConsultationStage, StageError};
    use http_body_util::BodyExt;

    async fn response_parts(err: AppError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn kinds_map_to_statuses() {
        let cases = [
            (ErrorKind::Validation, StatusCode::UNPROCESSABLE_ENTITY),
            (ErrorKind::NotFound, StatusCode::NOT_FOUND),
            (ErrorKind::State, StatusCode::CONFLICT),
            (ErrorKind::Forbidden, StatusCode::FORBIDDEN),
            (ErrorKind::Conflict, StatusCode::CONFLICT),
            (ErrorKind::Integrity, StatusCode::UNPROCESSABLE_ENTITY),
            (ErrorKind::Internal, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (kind, status) in cases {
            let err = AppError::from_kind(kind, "x".into());
            assert_eq!(err.status_and_code().0, status, "{kind}");
        }
    }

    #[test]
    fn codes_follow_the_taxonomy() {
        let err = AppError::from_kind(ErrorKind::State, "x".into());
        assert_eq!(err.status_and_code().1, "STATE_ERROR");
        let err = AppError::from_kind(ErrorKind::Integrity, "x".into());
        assert_eq!(err.status_and_code().1, ErrorKind::Integrity.as_str());
    }

    #[tokio::test]
    async fn ledger_not_found_becomes_404() {
        let err: AppError = LedgerError::NotFound {
            entity: "idea",
            id: "I-9".into(),
        }
        .into();
        let (status, body) = response_parts(err).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error.code, "NOT_FOUND");
        assert!(body.error.message.contains("I-9"));
    }

    #[tokio::test]
    async fn wrong_stage_becomes_409() {
        let err: AppError = LedgerError::Stage(StageError::WrongStage {
            expected: ConsultationStage::IdeaCollection,
            actual: ConsultationStage::FinalArbitration,
        })
        .into();
        let (status, body) = response_parts(err).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error.code, "STATE_ERROR");
    }

    #[tokio::test]
    async fn must_vote_first_becomes_403() {
        let (status, body) = response_parts(LedgerError::MustVoteFirst.into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.error.code, "FORBIDDEN");
    }

    #[tokio::test]
    async fn internal_message_is_hidden() {
        let (status, body) =
            response_parts(AppError::Internal("connection refused on 10.0.0.4".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.message, "An internal error occurred");
    }

    #[tokio::test]
    async fn validation_error_becomes_422() {
        let err: AppError = IdeaId::new("  ").unwrap_err().into();
        let (status, body) = response_parts(err).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.error.code, "VALIDATION_ERROR");
    }
}
