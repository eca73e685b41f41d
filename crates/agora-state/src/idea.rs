//! # Ideas, Idea Votes, and Shortlisting
//!
//! Idea votes are tracked per (idea, user) as an explicit tagged state. The
//! transition table is exhaustive, and each transition reports the counter
//! deltas to apply in the same write unit:
//!
//! | current  | vote     | next     | Δup | Δdown |
//! |----------|----------|----------|-----|-------|
//! | none     | upvote   | upvote   | +1  |  0    |
//! | none     | downvote | downvote |  0  | +1    |
//! | upvote   | upvote   | none     | −1  |  0    |
//! | upvote   | downvote | downvote | −1  | +1    |
//! | downvote | downvote | none     |  0  | −1    |
//! | downvote | upvote   | upvote   | +1  | −1    |

use serde::{Deserialize, Serialize};

use agora_core::error::require_text;
use agora_core::{IdeaId, PollId, Timestamp, UserId, ValidationError};

/// Maximum idea title length in characters.
pub const MAX_IDEA_TITLE_LEN: usize = 200;
/// Maximum idea description length in characters.
pub const MAX_IDEA_DESCRIPTION_LEN: usize = 5000;

/// Lifecycle of an idea.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdeaStatus {
    /// Submitted during idea collection.
    Submitted,
    /// Selected into the final vote.
    Shortlisted,
    /// Not selected.
    Rejected,
    /// Leading shortlisted idea after the final vote.
    Winner,
}

/// A single idea vote request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdeaVoteType {
    /// +1.
    Upvote,
    /// −1.
    Downvote,
}

/// What a user currently has recorded on one idea.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdeaVoteState {
    /// No vote.
    #[default]
    None,
    /// Upvoted.
    Upvote,
    /// Downvoted.
    Downvote,
}

/// Outcome of applying a vote to a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteToggle {
    /// The state to store (`None` means delete the row).
    pub next: IdeaVoteState,
    /// Change to the idea's upvote counter.
    pub upvote_delta: i64,
    /// Change to the idea's downvote counter.
    pub downvote_delta: i64,
}

impl IdeaVoteState {
    /// Apply `vote` to this state.
    pub fn apply(self, vote: IdeaVoteType) -> VoteToggle {
        use IdeaVoteState as S;
        use IdeaVoteType as V;
        let (next, upvote_delta, downvote_delta) = match (self, vote) {
            (S::None, V::Upvote) => (S::Upvote, 1, 0),
            (S::None, V::Downvote) => (S::Downvote, 0, 1),
            (S::Upvote, V::Upvote) => (S::None, -1, 0),
            (S::Upvote, V::Downvote) => (S::Downvote, -1, 1),
            (S::Downvote, V::Downvote) => (S::None, 0, -1),
            (S::Downvote, V::Upvote) => (S::Upvote, 1, -1),
        };
        VoteToggle {
            next,
            upvote_delta,
            downvote_delta,
        }
    }
}

/// An idea submitted to a consultation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Idea {
    /// Idea identifier.
    pub id: IdeaId,
    /// Consultation poll.
    pub poll_id: PollId,
    /// Author.
    pub submitter_id: UserId,
    /// Title, 1–200 characters.
    pub title: String,
    /// Description, up to 5000 characters.
    pub description: String,
    /// Upvote count.
    pub upvotes: u64,
    /// Downvote count.
    pub downvotes: u64,
    /// Lifecycle status.
    pub status: IdeaStatus,
    /// Submission instant.
    pub submitted_at: Timestamp,
    /// Per-poll submission counter; breaks ties within the same second.
    pub sequence: u64,
}

impl Idea {
    /// `upvotes − downvotes`.
    pub fn score(&self) -> i64 {
        self.upvotes as i64 - self.downvotes as i64
    }

    /// Apply counter deltas from a [`VoteToggle`].
    pub fn apply_toggle(&mut self, toggle: &VoteToggle) {
        self.upvotes = self.upvotes.saturating_add_signed(toggle.upvote_delta);
        self.downvotes = self.downvotes.saturating_add_signed(toggle.downvote_delta);
    }
}

/// Trim and bound an idea's title and description.
pub fn validate_idea_text(title: &str, description: &str) -> Result<(String, String), ValidationError> {
    let title = require_text("title", title, MAX_IDEA_TITLE_LEN)?;
    let description = description.trim().to_string();
    let len = description.chars().count();
    if len > MAX_IDEA_DESCRIPTION_LEN {
        return Err(ValidationError::TooLong {
            field: "description".into(),
            max: MAX_IDEA_DESCRIPTION_LEN,
            actual: len,
        });
    }
    Ok((title, description))
}

/// Sort ideas best first: score descending, then earliest `submitted_at`,
/// then lowest `sequence`.
pub fn rank_ideas<'a>(ideas: impl IntoIterator<Item = &'a Idea>) -> Vec<&'a Idea> {
    let mut ranked: Vec<&Idea> = ideas.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.score()
            .cmp(&a.score())
            .then(a.submitted_at.cmp(&b.submitted_at))
            .then(a.sequence.cmp(&b.sequence))
    });
    ranked
}

/// Result of shortlisting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortlistOutcome {
    /// Selected ideas, best first.
    pub shortlisted: Vec<IdeaId>,
    /// Remaining submitted ideas, in rank order.
    pub rejected: Vec<IdeaId>,
}

/// Rank `submitted` ideas with [`rank_ideas()`] and split them at `size`.
/// Ideas in any other status are ignored.
pub fn select_shortlist<'a>(ideas: impl IntoIterator<Item = &'a Idea>, size: usize) -> ShortlistOutcome {
    let ranked = rank_ideas(
        ideas
            .into_iter()
            .filter(|idea| idea.status == IdeaStatus::Submitted),
    );
    let split = size.min(ranked.len());
    let (top, rest) = ranked.split_at(split);
    ShortlistOutcome {
        shortlisted: top.iter().map(|i| i.id.clone()).collect(),
        rejected: rest.iter().map(|i| i.id.clone()).collect(),
    }
}
