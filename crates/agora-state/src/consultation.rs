//! # Consultation Stage Machine
//!
//! ```text
//! idea_collection ──▶ shortlist_selection ──▶ final_arbitration
//! ```
//!
//! Strictly forward, one step at a time, no re-entry. A transition is split
//! into two phases so the ledger can do all fallible work between them:
//!
//! 1. [`ConsultationStageInfo::plan_transition()`] validates the request
//!    against the current stage and the idea-count guard.
//! 2. [`ConsultationStageInfo::commit_transition()`] compares the current
//!    stage with the planned source stage and only then advances it. A
//!    concurrent winner that already moved the stage makes the commit fail
//!    with [`StageError::InvalidTransition`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use agora_core::{ErrorKind, PollId, Timestamp, UserId, ValidationError};

use crate::window::{TimeWindow, WindowViolation};

// ─── Stage ───────────────────────────────────────────────────────────

/// The phase a consultation is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStage {
    /// Citizens submit and vote on ideas.
    IdeaCollection,
    /// Shortlist is fixed; officials review.
    ShortlistSelection,
    /// The shortlist is the option set of the final vote.
    FinalArbitration,
}

impl ConsultationStage {
    /// All stages, in order.
    pub const ALL: [ConsultationStage; 3] = [
        Self::IdeaCollection,
        Self::ShortlistSelection,
        Self::FinalArbitration,
    ];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IdeaCollection => "idea_collection",
            Self::ShortlistSelection => "shortlist_selection",
            Self::FinalArbitration => "final_arbitration",
        }
    }

    /// The only stage reachable from this one.
    pub fn next(&self) -> Option<ConsultationStage> {
        match self {
            Self::IdeaCollection => Some(Self::ShortlistSelection),
            Self::ShortlistSelection => Some(Self::FinalArbitration),
            Self::FinalArbitration => None,
        }
    }
}

impl std::fmt::Display for ConsultationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConsultationStage {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "stage".into(),
                reason: format!("unknown stage {s:?}"),
            })
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors raised by the consultation stage machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    /// The requested transition is not the single forward step from the
    /// current stage, or the source stage has already been left.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current stage.
        from: ConsultationStage,
        /// Requested stage.
        to: ConsultationStage,
    },

    /// Not enough submitted ideas to leave idea collection.
    #[error("need at least {required} submitted ideas to advance, have {actual} ({} short)", .required - .actual)]
    ThresholdUnmet {
        /// `min_ideas_for_stage2`.
        required: u32,
        /// Submitted idea count.
        actual: u32,
    },

    /// The operation belongs to a different stage.
    #[error("operation requires stage {expected}, consultation is in {actual}")]
    WrongStage {
        /// Stage the operation needs.
        expected: ConsultationStage,
        /// Current stage.
        actual: ConsultationStage,
    },

    /// The current stage's window has not opened.
    #[error("{stage} has not started (starts at {starts_at})")]
    StageNotStarted {
        /// Current stage.
        stage: ConsultationStage,
        /// Opening instant.
        starts_at: Timestamp,
    },

    /// The current stage's window has closed.
    #[error("{stage} has ended (ended at {ends_at})")]
    StageEnded {
        /// Current stage.
        stage: ConsultationStage,
        /// Closing instant.
        ends_at: Timestamp,
    },

    /// Final results were already computed.
    #[error("invalid transition: consultation already finalized")]
    AlreadyFinalized,

    /// Malformed windows or thresholds.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl StageError {
    /// Taxonomy classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            _ => ErrorKind::State,
        }
    }

    fn from_window(stage: ConsultationStage, v: WindowViolation) -> Self {
        match v {
            WindowViolation::NotStarted { starts_at } => Self::StageNotStarted { stage, starts_at },
            WindowViolation::Ended { ends_at } => Self::StageEnded { stage, ends_at },
        }
    }
}

// ─── Configuration ───────────────────────────────────────────────────

/// Per-stage time windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageWindows {
    /// Idea submission and idea voting.
    #[serde(default)]
    pub idea_collection: TimeWindow,
    /// Review of the shortlist.
    #[serde(default)]
    pub shortlist_selection: TimeWindow,
    /// Final vote; copied onto the poll on entry.
    #[serde(default)]
    pub final_arbitration: TimeWindow,
}

impl StageWindows {
    /// The window for `stage`.
    pub fn for_stage(&self, stage: ConsultationStage) -> &TimeWindow {
        match stage {
            ConsultationStage::IdeaCollection => &self.idea_collection,
            ConsultationStage::ShortlistSelection => &self.shortlist_selection,
            ConsultationStage::FinalArbitration => &self.final_arbitration,
        }
    }

    /// Every window with both bounds must have `starts_at < ends_at`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for stage in ConsultationStage::ALL {
            self.for_stage(stage).validate(stage.as_str())?;
        }
        Ok(())
    }
}

/// Guards for the idea-collection exit and the shortlist size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsultationThresholds {
    /// Submitted ideas required to leave idea collection.
    pub min_ideas_for_stage2: u32,
    /// Number of ideas shortlisted.
    pub shortlist_size: u32,
}

impl ConsultationThresholds {
    /// Both values must be at least 1.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.min_ideas_for_stage2 < 1 {
            return Err(ValidationError::BelowMinimum {
                field: "min_ideas_for_stage2".into(),
                min: 1,
                actual: u64::from(self.min_ideas_for_stage2),
            });
        }
        if self.shortlist_size < 1 {
            return Err(ValidationError::BelowMinimum {
                field: "shortlist_size".into(),
                min: 1,
                actual: u64::from(self.shortlist_size),
            });
        }
        Ok(())
    }
}

// ─── Stage info ──────────────────────────────────────────────────────

/// Record of one stage transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransitionRecord {
    /// Stage left.
    pub from: ConsultationStage,
    /// Stage entered.
    pub to: ConsultationStage,
    /// When.
    pub at: Timestamp,
    /// Official who requested it.
    pub actor: UserId,
}

/// A validated, not yet committed, stage transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionPlan {
    /// Stage the plan was computed against.
    pub from: ConsultationStage,
    /// Target stage.
    pub to: ConsultationStage,
}

/// The stage state of one consultation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationStageInfo {
    /// The consultation poll.
    pub poll_id: PollId,
    /// Current stage.
    pub stage: ConsultationStage,
    /// Per-stage windows.
    pub windows: StageWindows,
    /// Guards.
    pub thresholds: ConsultationThresholds,
    /// Ordered transition log.
    pub transitions: Vec<StageTransitionRecord>,
    /// Set once winners were computed.
    pub finalized_at: Option<Timestamp>,
}

impl ConsultationStageInfo {
    /// Validate configuration and start at idea collection.
    pub fn new(
        poll_id: PollId,
        windows: StageWindows,
        thresholds: ConsultationThresholds,
    ) -> Result<Self, StageError> {
        windows.validate()?;
        thresholds.validate()?;
        Ok(Self {
            poll_id,
            stage: ConsultationStage::IdeaCollection,
            windows,
            thresholds,
            transitions: Vec::new(),
            finalized_at: None,
        })
    }

    /// Fail unless the consultation is in `expected`.
    pub fn require_stage(&self, expected: ConsultationStage) -> Result<(), StageError> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(StageError::WrongStage {
                expected,
                actual: self.stage,
            })
        }
    }

    /// Fail unless `now` is inside the current stage's window.
    pub fn check_window(&self, now: Timestamp) -> Result<(), StageError> {
        self.windows
            .for_stage(self.stage)
            .check(now)
            .map_err(|v| StageError::from_window(self.stage, v))
    }

    /// Validate a transition request. Does not mutate.
    ///
    /// `submitted_ideas` is the count of ideas still in `submitted` status.
    pub fn plan_transition(
        &self,
        requested: ConsultationStage,
        submitted_ideas: u32,
    ) -> Result<TransitionPlan, StageError> {
        if self.stage.next() != Some(requested) {
            return Err(StageError::InvalidTransition {
                from: self.stage,
                to: requested,
            });
        }
        if self.stage == ConsultationStage::IdeaCollection
            && submitted_ideas < self.thresholds.min_ideas_for_stage2
        {
            return Err(StageError::ThresholdUnmet {
                required: self.thresholds.min_ideas_for_stage2,
                actual: submitted_ideas,
            });
        }
        Ok(TransitionPlan {
            from: self.stage,
            to: requested,
        })
    }

    /// Compare-and-set: advance only if still in `plan.from`.
    pub fn commit_transition(
        &mut self,
        plan: TransitionPlan,
        actor: UserId,
        at: Timestamp,
    ) -> Result<(), StageError> {
        if self.stage != plan.from || plan.from.next() != Some(plan.to) {
            return Err(StageError::InvalidTransition {
                from: self.stage,
                to: plan.to,
            });
        }
        self.stage = plan.to;
        self.transitions.push(StageTransitionRecord {
            from: plan.from,
            to: plan.to,
            at,
            actor,
        });
        Ok(())
    }

    /// Guard for computing winners: final arbitration, not yet finalized.
    pub fn check_finalizable(&self) -> Result<(), StageError> {
        if self.finalized_at.is_some() {
            return Err(StageError::AlreadyFinalized);
        }
        self.require_stage(ConsultationStage::FinalArbitration)
    }
}
