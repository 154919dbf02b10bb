//! SM-2 style scheduling for the error bank
//!
//! Outcomes arrive as a binary correct/incorrect from grading, optionally
//! with a 0-5 self-assessment:
//! - 0-2: would count as incorrect in classic SM-2
//! - 3: correct with serious difficulty
//! - 4: correct after hesitation (assumed for a plain "correct")
//! - 5: perfect response

use chrono::{DateTime, Utc};

use super::models::{Priority, ReviewOutcome, ReviewState, ReviewStatus, SchedulerConfig};

/// Minimum easiness factor allowed
pub const MIN_EASINESS: f32 = 1.3;

/// Grade assumed when a plain "correct" carries no self-assessment
const DEFAULT_CORRECT_GRADE: i32 = 4;

/// Apply a review outcome, producing the next state.
///
/// The input is untouched; every outcome yields one complete replacement
/// state, so a caller persists it atomically or not at all. Resolved
/// entries are terminal and are not handled here: the storage layer opens
/// a fresh entry for them instead.
pub fn apply_outcome(
    state: &ReviewState,
    outcome: ReviewOutcome,
    now: DateTime<Utc>,
) -> ReviewState {
    let mut next = state.clone();

    match outcome {
        ReviewOutcome::Incorrect => {
            next.times_failed += 1;
            next.repetitions = 0;
            next.interval = 1;
            next.easiness = (next.easiness - 0.2).max(MIN_EASINESS);
            // Reinforcement starts with the second failure; a single
            // failure keeps the entry fresh
            next.status = if next.times_failed >= 2 {
                ReviewStatus::InReinforcement
            } else {
                ReviewStatus::NewError
            };
        }
        ReviewOutcome::Correct { grade } => {
            let quality = grade.unwrap_or(DEFAULT_CORRECT_GRADE).clamp(0, 5);
            next.repetitions += 1;

            // EF' = EF + (0.1 - (5-q) * (0.08 + (5-q) * 0.02))
            let q = quality as f32;
            next.easiness =
                (next.easiness + (0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02))).max(MIN_EASINESS);

            next.interval = match next.repetitions {
                1 => 1,
                2 => 6,
                _ => ((state.interval as f32) * next.easiness).round().max(1.0) as i32,
            };
        }
    }

    next.last_reviewed_at = Some(now);
    next
}

/// Close an entry. Terminal; only an explicit learner action gets here.
pub fn resolve(state: &ReviewState) -> ReviewState {
    ReviewState {
        status: ReviewStatus::Resolved,
        ..state.clone()
    }
}

/// Assign the priority tier for a due entry
pub fn priority_for(
    state: &ReviewState,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) -> Priority {
    let days = state.days_since_review(now);

    if state.times_failed >= config.alta.times_failed
        || days.map_or(false, |d| d >= config.alta.stale_days)
    {
        return Priority::Alta;
    }

    // A fresh error the learner has not worked on yet is always worth at
    // least media
    if state.status == ReviewStatus::NewError {
        return Priority::Media;
    }

    if state.times_failed >= config.media.times_failed
        || days.map_or(false, |d| d >= config.media.stale_days)
    {
        return Priority::Media;
    }

    Priority::Baja
}
