//! Optional `[starts_at, ends_at)` time windows for polls and stages.

use serde::{Deserialize, Serialize};

use agora_core::{Timestamp, ValidationError};

/// A half-open window. Either bound may be absent.
///
/// An instant `t` is inside iff `starts_at <= t` and `t < ends_at`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Opening instant, inclusive.
    #[serde(default)]
    pub starts_at: Option<Timestamp>,
    /// Closing instant, exclusive.
    #[serde(default)]
    pub ends_at: Option<Timestamp>,
}

/// Why an instant falls outside a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowViolation {
    /// Before `starts_at`.
    NotStarted {
        /// The opening instant.
        starts_at: Timestamp,
    },
    /// At or after `ends_at`.
    Ended {
        /// The closing instant.
        ends_at: Timestamp,
    },
}

impl TimeWindow {
    /// A window with no bounds.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// A window with both bounds.
    pub fn between(starts_at: Timestamp, ends_at: Timestamp) -> Self {
        Self {
            starts_at: Some(starts_at),
            ends_at: Some(ends_at),
        }
    }

    /// When both bounds are present, `starts_at` must precede `ends_at`.
    pub fn validate(&self, field: &str) -> Result<(), ValidationError> {
        if let (Some(start), Some(end)) = (self.starts_at, self.ends_at) {
            if start >= end {
                return Err(ValidationError::InvalidFormat {
                    field: field.to_string(),
                    reason: format!("starts_at {start} must be before ends_at {end}"),
                });
            }
        }
        Ok(())
    }

    /// Check whether `now` lies inside the window.
    pub fn check(&self, now: Timestamp) -> Result<(), WindowViolation> {
        if let Some(starts_at) = self.starts_at {
            if now < starts_at {
                return Err(WindowViolation::NotStarted { starts_at });
            }
        }
        if let Some(ends_at) = self.ends_at {
            if now >= ends_at {
                return Err(WindowViolation::Ended { ends_at });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    #[test]
    fn bounds_are_half_open() {
        let w = TimeWindow::between(ts("2026-05-01T00:00:00Z"), ts("2026-05-02T00:00:00Z"));
        assert!(w.check(ts("2026-05-01T00:00:00Z")).is_ok());
        assert!(w.check(ts("2026-05-01T23:59:59Z")).is_ok());
        assert_eq!(
            w.check(ts("2026-04-30T23:59:59Z")),
            Err(WindowViolation::NotStarted {
                starts_at: ts("2026-05-01T00:00:00Z")
            })
        );
        assert_eq!(
            w.check(ts("2026-05-02T00:00:00Z")),
            Err(WindowViolation::Ended {
                ends_at: ts("2026-05-02T00:00:00Z")
            })
        );
    }

    #[test]
    fn unbounded_always_open() {
        assert!(TimeWindow::unbounded().check(ts("1999-01-01T00:00:00Z")).is_ok());
    }

    #[test]
    fn validate_requires_start_before_end() {
        let t = ts("2026-05-01T00:00:00Z");
        assert!(TimeWindow::between(t, t).validate("window").is_err());
        assert!(TimeWindow::between(t.plus_secs(1), t).validate("window").is_err());
        assert!(TimeWindow::between(t, t.plus_secs(1)).validate("window").is_ok());
        assert!(TimeWindow { starts_at: Some(t), ends_at: None }.validate("window").is_ok());
    }

    #[test]
    fn missing_bounds_deserialize_as_none() {
        let w: TimeWindow = serde_json::from_str("{}").unwrap();
        assert_eq!(w, TimeWindow::unbounded());
    }
}
