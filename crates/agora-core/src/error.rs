//! # Error Types
//!
//! The shared error taxonomy and the leaf error types used across Agora.
//! All errors use `thiserror` for derive-based `Display` and `Error`.
//!
//! Every domain error in the workspace exposes `kind() -> ErrorKind`, and the
//! HTTP layer maps the kind, never the concrete type, to a status code.

use thiserror::Error;

/// Classification shared by every domain error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or out-of-range input.
    Validation,
    /// A referenced poll, idea, option or event does not exist.
    NotFound,
    /// The operation is not allowed in the current state.
    State,
    /// Ownership or role violation.
    Forbidden,
    /// A concurrent writer won the race.
    Conflict,
    /// Hash or chain mismatch.
    Integrity,
    /// Unexpected failure, e.g. rendering a response document.
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::State => "STATE_ERROR",
            Self::Forbidden => "FORBIDDEN",
            Self::Conflict => "CONFLICT",
            Self::Integrity => "INTEGRITY_ERROR",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Non-integer numbers are not permitted in canonical payloads.
    #[error("non-integer numbers are not permitted in canonical payloads: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

impl CanonicalizationError {
    /// Always [`ErrorKind::Validation`]: the payload was malformed.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

/// Malformed input rejected at a domain boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was empty or whitespace.
    #[error("{field} must not be empty")]
    Empty {
        /// Field name.
        field: String,
    },

    /// A field exceeded its maximum length (in characters).
    #[error("{field} exceeds {max} characters (got {actual})")]
    TooLong {
        /// Field name.
        field: String,
        /// Maximum allowed.
        max: usize,
        /// Actual length.
        actual: usize,
    },

    /// A numeric field was below its minimum.
    #[error("{field} must be at least {min} (got {actual})")]
    BelowMinimum {
        /// Field name.
        field: String,
        /// Minimum allowed.
        min: u64,
        /// Actual value.
        actual: u64,
    },

    /// A field did not parse.
    #[error("invalid {field}: {reason}")]
    InvalidFormat {
        /// Field name.
        field: String,
        /// What was wrong.
        reason: String,
    },
}

impl ValidationError {
    /// Always [`ErrorKind::Validation`].
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

/// Require a non-blank string of at most `max` characters.
///
/// Returns the trimmed value.
pub fn require_text(field: &str, value: &str, max: usize) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty {
            field: field.to_string(),
        });
    }
    let actual = trimmed.chars().count();
    if actual > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
            actual,
        });
    }
    Ok(trimmed.to_string())
}
