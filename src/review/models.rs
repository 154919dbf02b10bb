//! Data models for the spaced repetition error bank

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of an error entry
///
/// `Resolved` is terminal: a later failure on the same question opens a
/// fresh entry instead of reviving this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Failed once, not yet in the reinforcement loop
    NewError,
    /// Failed repeatedly; under active spaced review
    InReinforcement,
    /// Explicitly closed by the learner
    Resolved,
}

impl Default for ReviewStatus {
    fn default() -> Self {
        Self::NewError
    }
}

/// Spaced repetition bookkeeping for one question (SM-2 style)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewState {
    /// SM-2 easiness factor, never below 1.3
    #[serde(default = "default_easiness")]
    pub easiness: f32,
    /// Consecutive successful reviews
    #[serde(default)]
    pub repetitions: i32,
    /// Days until the next review is due, always at least 1
    #[serde(default = "default_interval")]
    pub interval: i32,
    #[serde(default)]
    pub status: ReviewStatus,
    /// Total incorrect answers recorded against this entry
    #[serde(default)]
    pub times_failed: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

fn default_easiness() -> f32 {
    2.5
}

fn default_interval() -> i32 {
    1
}

impl ReviewState {
    pub fn new() -> Self {
        Self {
            easiness: default_easiness(),
            repetitions: 0,
            interval: default_interval(),
            status: ReviewStatus::default(),
            times_failed: 0,
            last_reviewed_at: None,
        }
    }

    /// Whether the entry should be offered for review.
    /// Never-reviewed entries are always due; resolved ones never are.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if self.status == ReviewStatus::Resolved {
            return false;
        }
        match self.last_reviewed_at {
            None => true,
            Some(last) => (now - last).num_days() >= self.interval as i64,
        }
    }

    /// Whole days since the last review; `None` if never reviewed
    pub fn days_since_review(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_reviewed_at.map(|last| (now - last).num_days())
    }
}

impl Default for ReviewState {
    fn default() -> Self {
        Self::new()
    }
}

/// Selection bucket for session composition; ordering follows urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Baja,
    Media,
    Alta,
}

/// Graded outcome of reviewing one question, as reported by the grading
/// collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReviewOutcome {
    Correct {
        /// Optional 0-5 self-assessment; a plain "correct" scores as 4
        #[serde(default, skip_serializing_if = "Option::is_none")]
        grade: Option<i32>,
    },
    Incorrect,
}

/// Thresholds at which a due entry reaches a tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierThresholds {
    /// `times_failed` at or above this reaches the tier
    pub times_failed: i32,
    /// Days since last review at or above this reaches the tier
    pub stale_days: i64,
}

/// Tiering and staleness policy for the scheduler and composer.
/// Every cutoff the selection logic uses lives here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfig {
    pub alta: TierThresholds,
    pub media: TierThresholds,
    /// Days after which a selected error counts as "antiguo" in the
    /// session statistics
    pub old_error_days: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            alta: TierThresholds {
                times_failed: 3,
                stale_days: 7,
            },
            media: TierThresholds {
                times_failed: 2,
                stale_days: 3,
            },
            old_error_days: 7,
        }
    }
}

/// Bank-wide totals for the overview screen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankStats {
    pub total_errors: usize,
    pub new_errors: usize,
    pub in_reinforcement: usize,
    pub resolved: usize,
    pub due: usize,
}

impl Default for BankStats {
    fn default() -> Self {
        Self {
            total_errors: 0,
            new_errors: 0,
            in_reinforcement: 0,
            resolved: 0,
            due: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_state_defaults() {
        let state = ReviewState::new();
        assert_eq!(state.easiness, 2.5);
        assert_eq!(state.repetitions, 0);
        assert_eq!(state.interval, 1);
        assert_eq!(state.status, ReviewStatus::NewError);
        assert_eq!(state.times_failed, 0);
        assert!(state.last_reviewed_at.is_none());
    }

    #[test]
    fn test_never_reviewed_is_due() {
        let now = Utc::now();
        assert!(ReviewState::new().is_due(now));
    }

    #[test]
    fn test_due_when_interval_elapsed() {
        let now = Utc::now();
        let mut state = ReviewState::new();
        state.interval = 3;
        state.last_reviewed_at = Some(now - Duration::days(3));
        assert!(state.is_due(now));

        state.last_reviewed_at = Some(now - Duration::days(2));
        assert!(!state.is_due(now));
    }

    #[test]
    fn test_resolved_never_due() {
        let now = Utc::now();
        let mut state = ReviewState::new();
        state.status = ReviewStatus::Resolved;
        assert!(!state.is_due(now));
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Alta > Priority::Media);
        assert!(Priority::Media > Priority::Baja);
    }

    #[test]
    fn test_priority_wire_names() {
        assert_eq!(
            serde_json::to_value(Priority::Alta).unwrap(),
            serde_json::json!("alta")
        );
    }

    #[test]
    fn test_state_deserializes_from_sparse_object() {
        // Normalization fills these, but the model tolerates sparse
        // states on its own as well
        let state: ReviewState = serde_json::from_str("{}").unwrap();
        assert_eq!(state, ReviewState::new());
    }
}
