//! # API Route Modules
//!
//! - `polls`: standard polls, anonymous votes, results and results export.
//! - `consultations`: the three-stage consultation: ideas, idea votes,
//!   stage transitions, finalization.
//! - `audit`: tenant audit listing, bundle export and bundle verification.

pub mod audit;
pub mod consultations;
pub mod polls;

use axum::http::header;
use axum::response::{IntoResponse, Response};

/// A rendered export with its content type and a download filename.
pub(crate) fn document_response(content_type: &'static str, filename: String, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

/// `value` reduced to `[A-Za-z0-9_-]` for use in a download filename; every
/// other character becomes `_`.
pub(crate) fn filename_part(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// File extension for an export content type.
pub(crate) fn extension(content_type: &str) -> &'static str {
    if content_type.starts_with("text/csv") {
        "csv"
    } else {
        "json"
    }
}
