//! # Domain Identity Newtypes
//!
//! Newtype wrappers for every identifier in Agora. A `UserId` cannot be
//! passed where a `PollId` is expected.
//!
//! Poll, option, idea, user and tenant identifiers are opaque strings
//! supplied by collaborators (or generated as UUID v4 text). Audit event and
//! vote-version identifiers are always server-generated UUIDs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Maximum length, in characters, of a string identifier.
pub const MAX_ID_LEN: usize = 128;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap an identifier: non-blank, no surrounding
            /// whitespace, at most [`MAX_ID_LEN`] characters.
            pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(ValidationError::Empty { field: $field.into() });
                }
                if value.trim() != value {
                    return Err(ValidationError::InvalidFormat {
                        field: $field.into(),
                        reason: "surrounding whitespace".into(),
                    });
                }
                let len = value.chars().count();
                if len > MAX_ID_LEN {
                    return Err(ValidationError::TooLong {
                        field: $field.into(),
                        max: MAX_ID_LEN,
                        actual: len,
                    });
                }
                Ok(Self(value))
            }

            /// Generate a fresh random identifier (UUID v4 text).
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Borrow the identifier text.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }
    };
}

string_id!(
    /// An isolated organisation. Audit chains are per tenant.
    TenantId,
    "tenant_id"
);
string_id!(
    /// A poll, standard or consultation.
    PollId,
    "poll_id"
);
string_id!(
    /// One selectable option of a poll.
    OptionId,
    "option_id"
);
string_id!(
    /// An idea submitted during a consultation's collection stage.
    IdeaId,
    "idea_id"
);
string_id!(
    /// An authenticated platform user.
    UserId,
    "user_id"
);

impl From<&IdeaId> for OptionId {
    /// A shortlisted idea becomes a poll option under the same identifier.
    fn from(idea: &IdeaId) -> Self {
        OptionId(idea.0.clone())
    }
}

/// Unique identifier for an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub Uuid);

impl EventId {
    /// Generate a new random event identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for one version of a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoteId(pub Uuid);

impl VoteId {
    /// Generate a new random vote-version identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for VoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for VoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_ids_validate() {
        assert!(PollId::new("P1").is_ok());
        assert!(matches!(PollId::new(""), Err(ValidationError::Empty { .. })));
        assert!(matches!(
            PollId::new(" P1"),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(matches!(
            UserId::new("u".repeat(MAX_ID_LEN + 1)),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(IdeaId::generate(), IdeaId::generate());
        assert_ne!(EventId::new(), EventId::new());
    }

    #[test]
    fn serde_is_transparent_and_validating() {
        let id = TenantId::new("city-of-lyon").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"city-of-lyon\"");
        let back: TenantId = serde_json::from_str("\"city-of-lyon\"").unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<TenantId>("\"\"").is_err());
    }

    #[test]
    fn idea_converts_to_option_with_same_text() {
        let idea = IdeaId::new("idea-7").unwrap();
        assert_eq!(OptionId::from(&idea).as_str(), "idea-7");
    }
}
