//! # agora-state: Lifecycle State Machines
//!
//! Every type here is plain data plus transition logic. Nothing in this crate
//! touches storage, clocks or locks: callers pass `now` in and persist the
//! result. This keeps the guards testable in isolation and lets the ledger
//! run them inside a single write unit.
//!
//! ## Machines
//!
//! - **Poll** ([`poll`]): `Draft → Active → Closed`, plus the optional voting
//!   window check.
//! - **Consultation** ([`consultation`]): `idea_collection →
//!   shortlist_selection → final_arbitration`, strictly forward, with a
//!   compare-and-set commit.
//! - **Idea vote** ([`idea`]): tagged `{none, upvote, downvote}` state whose
//!   transitions yield the exact counter deltas to apply.

pub mod consultation;
pub mod idea;
pub mod poll;
pub mod window;

pub use consultation::{
    ConsultationStage, ConsultationStageInfo, ConsultationThresholds, StageError,
    StageTransitionRecord, StageWindows, TransitionPlan,
};
pub use idea::{
    rank_ideas, select_shortlist, validate_idea_text, Idea, IdeaStatus, IdeaVoteState, IdeaVoteType,
    ShortlistOutcome, VoteToggle, MAX_IDEA_DESCRIPTION_LEN, MAX_IDEA_TITLE_LEN,
};
pub use poll::{Poll, PollError, PollKind, PollOption, PollStatus, MAX_POLL_TITLE_LEN};
pub use window::{TimeWindow, WindowViolation};
