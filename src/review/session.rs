//! Study session composition
//!
//! Turns the pool of due errors into a bounded, tiered session plus the
//! statistics the review screen displays. Selection prefers the `alta`
//! tier, then `media`, then `baja`; within a tier the stalest entry goes
//! first, and entries never reviewed at all count as stalest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::exams::models::QuestionType;

use super::algorithm::priority_for;
use super::models::{Priority, ReviewState, ReviewStatus, SchedulerConfig};

/// A due, unresolved question eligible for selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCandidate {
    pub exam_id: String,
    pub question_id: String,
    pub question_type: QuestionType,
    pub text: String,
    pub state: ReviewState,
}

/// One selected item, with the rationale shown on its card
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionItem {
    pub exam_id: String,
    pub question_id: String,
    pub question_type: QuestionType,
    pub text: String,
    pub priority: Priority,
    pub times_failed: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_since_review: Option<i64>,
    /// Why this item made the cut, for the learner
    pub rationale: String,
    /// How to study it, keyed off priority and question type
    pub recommendation: String,
    pub state: ReviewState,
}

/// Session statistics, keyed as the review screen expects them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    #[serde(rename = "errores_nuevos_incluidos")]
    pub new_errors_included: usize,
    #[serde(rename = "errores_alta_frecuencia")]
    pub high_frequency_errors: usize,
    #[serde(rename = "errores_antiguos")]
    pub old_errors: usize,
    #[serde(rename = "promedio_dias_sin_practica")]
    pub average_days_unpracticed: f64,
}

/// The payload handed to the presentation layer.
/// An empty `items` list is the normal "no pending errors" answer, not a
/// failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySession {
    pub items: Vec<SessionItem>,
    pub stats: SessionStats,
    pub requested_size: usize,
    /// Due candidates that existed before the size cap
    pub pool_size: usize,
}

/// Compose a session of at most `max_size` items from the candidate pool
pub fn compose_session(
    candidates: Vec<SessionCandidate>,
    max_size: usize,
    config: &SchedulerConfig,
    now: DateTime<Utc>,
) -> StudySession {
    // The pool is expected to be due and unresolved already; filtering
    // here keeps a stale caller from padding the session anyway
    let mut pool: Vec<(Priority, i64, SessionCandidate)> = candidates
        .into_iter()
        .filter(|c| c.state.status != ReviewStatus::Resolved && c.state.is_due(now))
        .map(|c| {
            let priority = priority_for(&c.state, now, config);
            let staleness = c.state.days_since_review(now).unwrap_or(i64::MAX);
            (priority, staleness, c)
        })
        .collect();
    let pool_size = pool.len();

    // Highest tier first; stalest first within a tier
    pool.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
    pool.truncate(max_size);

    let items: Vec<SessionItem> = pool
        .into_iter()
        .map(|(priority, _, candidate)| {
            let days = candidate.state.days_since_review(now);
            SessionItem {
                rationale: rationale(&candidate.state, days, config),
                recommendation: recommendation(priority, &candidate.question_type),
                exam_id: candidate.exam_id,
                question_id: candidate.question_id,
                question_type: candidate.question_type,
                text: candidate.text,
                priority,
                times_failed: candidate.state.times_failed,
                days_since_review: days,
                state: candidate.state,
            }
        })
        .collect();

    let stats = session_stats(&items, config);

    StudySession {
        items,
        stats,
        requested_size: max_size,
        pool_size,
    }
}

fn session_stats(items: &[SessionItem], config: &SchedulerConfig) -> SessionStats {
    let new_errors_included = items
        .iter()
        .filter(|i| i.state.status == ReviewStatus::NewError)
        .count();
    let high_frequency_errors = items
        .iter()
        .filter(|i| i.times_failed >= config.alta.times_failed)
        .count();
    let old_errors = items
        .iter()
        .filter(|i| i.days_since_review.map_or(false, |d| d > config.old_error_days))
        .count();

    // Mean staleness over the items that have been practiced at all
    let practiced: Vec<i64> = items.iter().filter_map(|i| i.days_since_review).collect();
    let average_days_unpracticed = if practiced.is_empty() {
        0.0
    } else {
        practiced.iter().sum::<i64>() as f64 / practiced.len() as f64
    };

    SessionStats {
        new_errors_included,
        high_frequency_errors,
        old_errors,
        average_days_unpracticed,
    }
}

/// Which signal put the item in the session: frequency, staleness, or
/// being a new error
fn rationale(state: &ReviewState, days: Option<i64>, config: &SchedulerConfig) -> String {
    let stale_days = days.filter(|d| *d >= config.alta.stale_days);

    if state.times_failed >= config.alta.times_failed {
        format!(
            "Fallada {} veces; la frecuencia de fallo pide repasarla ya",
            state.times_failed
        )
    } else if let Some(d) = stale_days {
        format!("Sin practicar desde hace {} días", d)
    } else if state.status == ReviewStatus::NewError {
        "Error nuevo; todavía sin repasar".to_string()
    } else {
        format!(
            "Toca repasarla: su intervalo de {} días ya venció",
            state.interval
        )
    }
}

fn recommendation(priority: Priority, question_type: &QuestionType) -> String {
    let focus = match question_type {
        QuestionType::MultipleChoice => "revisa por qué cada opción descartada es incorrecta",
        QuestionType::ShortAnswer => "escribe la respuesta de memoria antes de comprobarla",
        QuestionType::OpenQuestion => "esboza la respuesta completa y compárala con la solución",
        QuestionType::TrueFalse => "justifica la afirmación con tus propias palabras",
        QuestionType::Other(_) => "vuelve al material del que salió la pregunta",
    };
    match priority {
        Priority::Alta => format!("Dedícale tiempo hoy: {}", focus),
        Priority::Media => format!("Inclúyela en tu próximo repaso: {}", focus),
        Priority::Baja => format!("Un repaso rápido basta: {}", focus),
    }
}
