//! # Poll Lifecycle
//!
//! ```text
//! Draft ──▶ Active ──▶ Closed (terminal)
//! ```
//!
//! Consultation polls are born `Active` with no options; their option set is
//! filled by the consultation machine when it reaches final arbitration.
//!
//! A poll accepts votes only while `Active` and inside its optional window.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use agora_core::error::require_text;
use agora_core::{ErrorKind, OptionId, PollId, TenantId, Timestamp, UserId, ValidationError};

use crate::window::{TimeWindow, WindowViolation};

/// Maximum poll title length in characters.
pub const MAX_POLL_TITLE_LEN: usize = 200;
/// Maximum option text length in characters.
pub const MAX_OPTION_TEXT_LEN: usize = 200;

// ─── Status ──────────────────────────────────────────────────────────

/// The lifecycle state of a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    /// Created, not yet accepting votes.
    Draft,
    /// Accepting votes (subject to the window).
    Active,
    /// No longer accepting votes; public results available.
    Closed,
}

impl PollStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }

    /// States reachable in one step.
    pub fn valid_transitions(&self) -> &'static [PollStatus] {
        match self {
            Self::Draft => &[Self::Active],
            Self::Active => &[Self::Closed],
            Self::Closed => &[],
        }
    }

    /// Whether no further transitions exist.
    pub fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}

impl std::fmt::Display for PollStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a poll is an ordinary vote or the final stage of a consultation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollKind {
    /// Options fixed at creation.
    Standard,
    /// Options derived from a consultation shortlist.
    Consultation,
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors raised by poll guards and transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    /// The poll is not accepting votes.
    #[error("poll is not active (status: {status})")]
    NotActive {
        /// Current status.
        status: PollStatus,
    },

    /// The poll window has not opened yet.
    #[error("poll has not started (starts at {starts_at})")]
    NotStarted {
        /// Opening instant.
        starts_at: Timestamp,
    },

    /// The poll window has closed.
    #[error("poll has ended (ended at {ends_at})")]
    Ended {
        /// Closing instant.
        ends_at: Timestamp,
    },

    /// The option is not one of the poll's current options.
    #[error("option {option_id} is not an option of this poll")]
    InvalidOption {
        /// The rejected option.
        option_id: OptionId,
    },

    /// The poll must be closed for this operation.
    #[error("poll is not closed (status: {status})")]
    NotClosed {
        /// Current status.
        status: PollStatus,
    },

    /// Lifecycle transition not allowed from the current status.
    #[error("invalid poll transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: PollStatus,
        /// Requested status.
        to: PollStatus,
    },

    /// Malformed poll definition.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl PollError {
    /// Taxonomy classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidOption { .. } | Self::Validation(_) => ErrorKind::Validation,
            Self::NotActive { .. }
            | Self::NotStarted { .. }
            | Self::Ended { .. }
            | Self::NotClosed { .. }
            | Self::InvalidTransition { .. } => ErrorKind::State,
        }
    }
}

impl From<WindowViolation> for PollError {
    fn from(v: WindowViolation) -> Self {
        match v {
            WindowViolation::NotStarted { starts_at } => Self::NotStarted { starts_at },
            WindowViolation::Ended { ends_at } => Self::Ended { ends_at },
        }
    }
}

// ─── Poll ────────────────────────────────────────────────────────────

/// One selectable option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    /// Option identifier.
    pub id: OptionId,
    /// Display text.
    pub text: String,
}

/// The minimal poll record the ledger needs to enforce voting preconditions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poll {
    /// Poll identifier.
    pub id: PollId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Title.
    pub title: String,
    /// Standard or consultation.
    pub kind: PollKind,
    /// Lifecycle status.
    pub status: PollStatus,
    /// Current options, in display order.
    pub options: Vec<PollOption>,
    /// Voting window.
    pub window: TimeWindow,
    /// Creating official.
    pub created_by: UserId,
    /// Creation instant.
    pub created_at: Timestamp,
    /// When the poll was closed, if it has been.
    pub closed_at: Option<Timestamp>,
}

impl Poll {
    /// A standard poll in `Draft` with at least two uniquely-identified options.
    pub fn new_standard(
        id: PollId,
        tenant_id: TenantId,
        title: &str,
        options: Vec<PollOption>,
        window: TimeWindow,
        created_by: UserId,
        now: Timestamp,
    ) -> Result<Self, PollError> {
        let title = require_text("title", title, MAX_POLL_TITLE_LEN)?;
        window.validate("window")?;
        let options = validate_options(options)?;
        if options.len() < 2 {
            return Err(ValidationError::BelowMinimum {
                field: "options".into(),
                min: 2,
                actual: options.len() as u64,
            }
            .into());
        }
        Ok(Self {
            id,
            tenant_id,
            title,
            kind: PollKind::Standard,
            status: PollStatus::Draft,
            options,
            window,
            created_by,
            created_at: now,
            closed_at: None,
        })
    }

    /// A consultation poll: `Active`, no options, window set later.
    pub fn new_consultation(
        id: PollId,
        tenant_id: TenantId,
        title: &str,
        created_by: UserId,
        now: Timestamp,
    ) -> Result<Self, PollError> {
        let title = require_text("title", title, MAX_POLL_TITLE_LEN)?;
        Ok(Self {
            id,
            tenant_id,
            title,
            kind: PollKind::Consultation,
            status: PollStatus::Active,
            options: Vec::new(),
            window: TimeWindow::unbounded(),
            created_by,
            created_at: now,
            closed_at: None,
        })
    }

    /// Check that moving to `to` is allowed. Does not mutate.
    pub fn check_transition(&self, to: PollStatus) -> Result<(), PollError> {
        if self.status.valid_transitions().contains(&to) {
            Ok(())
        } else {
            Err(PollError::InvalidTransition {
                from: self.status,
                to,
            })
        }
    }

    /// Apply a transition previously accepted by [`Poll::check_transition()`].
    pub fn transition(&mut self, to: PollStatus, now: Timestamp) -> Result<(), PollError> {
        self.check_transition(to)?;
        self.status = to;
        if to == PollStatus::Closed {
            self.closed_at = Some(now);
        }
        Ok(())
    }

    /// Guard for casting: active, inside the window, and a known option.
    pub fn check_accepts_vote(&self, option_id: &OptionId, now: Timestamp) -> Result<(), PollError> {
        if self.status != PollStatus::Active {
            return Err(PollError::NotActive {
                status: self.status,
            });
        }
        self.window.check(now)?;
        if !self.has_option(option_id) {
            return Err(PollError::InvalidOption {
                option_id: option_id.clone(),
            });
        }
        Ok(())
    }

    /// Guard for public results and export.
    pub fn require_closed(&self) -> Result<(), PollError> {
        if self.status == PollStatus::Closed {
            Ok(())
        } else {
            Err(PollError::NotClosed {
                status: self.status,
            })
        }
    }

    /// Whether `option_id` is a current option.
    pub fn has_option(&self, option_id: &OptionId) -> bool {
        self.options.iter().any(|o| &o.id == option_id)
    }

    /// Replace the option set wholesale.
    pub fn replace_options(&mut self, options: Vec<PollOption>) {
        self.options = options;
    }
}

fn validate_options(options: Vec<PollOption>) -> Result<Vec<PollOption>, ValidationError> {
    let mut seen = std::collections::HashSet::new();
    options
        .into_iter()
        .map(|o| {
            if !seen.insert(o.id.clone()) {
                return Err(ValidationError::InvalidFormat {
                    field: "options".into(),
                    reason: format!("duplicate option id {}", o.id),
                });
            }
            let text = require_text("option text", &o.text, MAX_OPTION_TEXT_LEN)?;
            Ok(PollOption { id: o.id, text })
        })
        .collect()
}
