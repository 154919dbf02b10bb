//! Storage for the error bank
//!
//! One JSON document holds every exam record, kept canonical on disk:
//! ```text
//! {data_dir}/
//! └── exams.json    # Array of exam records
//! ```
//! Loading tolerates any vintage: the raw array goes through
//! [`crate::exams::normalize`] before deserialization, so the rest of the
//! crate only ever sees canonical records. Saving always writes the
//! canonical shape back.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::exams::models::{ExamRecord, Question};
use crate::exams::normalize::normalize_records;

use super::algorithm::{apply_outcome, resolve};
use super::models::{BankStats, ReviewOutcome, ReviewState, ReviewStatus, SchedulerConfig};
use super::session::{self, SessionCandidate, StudySession};

#[derive(Error, Debug)]
pub enum ReviewStorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Question not found: {0}")]
    QuestionNotFound(String),

    #[error("Question has no error entry: {0}")]
    NotTracked(String),

    #[error("Question already resolved: {0}")]
    AlreadyResolved(String),

    #[error("Data directory not found")]
    DataDirNotFound,
}

pub type Result<T> = std::result::Result<T, ReviewStorageError>;

/// Storage manager for the error bank
pub struct ReviewStorage {
    data_dir: PathBuf,
}

impl ReviewStorage {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn default_data_dir() -> Result<PathBuf> {
        dirs::data_local_dir()
            .map(|p| p.join("repaso"))
            .ok_or(ReviewStorageError::DataDirNotFound)
    }

    fn exams_path(&self) -> PathBuf {
        self.data_dir.join("exams.json")
    }

    /// Initialize the storage directory
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;

        let exams_path = self.exams_path();
        if !exams_path.exists() {
            let empty: Vec<ExamRecord> = Vec::new();
            fs::write(&exams_path, serde_json::to_string_pretty(&empty)?)?;
        }

        Ok(())
    }

    // ==================== Exam Operations ====================

    /// Load every exam record, canonicalized.
    ///
    /// A missing file is an empty bank. Per-record drift never fails the
    /// load; only an unreadable file or non-array document does.
    pub fn load_exams(&self) -> Result<Vec<ExamRecord>> {
        let exams_path = self.exams_path();
        if !exams_path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&exams_path)?;
        let raw: Vec<Value> = serde_json::from_str(&content)?;
        let canonical = normalize_records(raw);

        canonical
            .into_iter()
            .map(|record| serde_json::from_value(record).map_err(Into::into))
            .collect()
    }

    /// Write the canonical collection back
    pub fn save_exams(&self, exams: &[ExamRecord]) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        fs::write(self.exams_path(), serde_json::to_string_pretty(exams)?)?;
        Ok(())
    }

    /// Insert or replace a single exam record by id
    pub fn upsert_exam(&self, exam: &ExamRecord) -> Result<()> {
        let mut exams = self.load_exams()?;
        match exams.iter_mut().find(|e| e.id == exam.id) {
            Some(existing) => *existing = exam.clone(),
            None => exams.push(exam.clone()),
        }
        self.save_exams(&exams)
    }

    // ==================== Review Operations ====================

    /// Record the graded outcome for a question and persist the new state.
    ///
    /// One load-update-save per call; a multi-threaded host must serialize
    /// calls against the same bank. On a failed save nothing has been
    /// written and the call can simply be retried.
    pub fn record_outcome(
        &self,
        question_id: &str,
        outcome: ReviewOutcome,
    ) -> Result<ReviewState> {
        let mut exams = self.load_exams()?;
        let now = Utc::now();

        let question = find_question_mut(&mut exams, question_id)
            .ok_or_else(|| ReviewStorageError::QuestionNotFound(question_id.to_string()))?;

        let current = match (&question.review_state, outcome) {
            (Some(state), _) => state.clone(),
            // An error entry opens the first time a question is failed
            (None, ReviewOutcome::Incorrect) => ReviewState::new(),
            (None, ReviewOutcome::Correct { .. }) => {
                return Err(ReviewStorageError::NotTracked(question_id.to_string()));
            }
        };

        let next = if current.status == ReviewStatus::Resolved {
            match outcome {
                // A fresh failure opens a new logical entry; the resolved
                // one stays behind as history
                ReviewOutcome::Incorrect => {
                    question.review_history.push(current);
                    apply_outcome(&ReviewState::new(), outcome, now)
                }
                ReviewOutcome::Correct { .. } => {
                    return Err(ReviewStorageError::AlreadyResolved(question_id.to_string()));
                }
            }
        } else {
            apply_outcome(&current, outcome, now)
        };

        question.review_state = Some(next.clone());
        self.save_exams(&exams)?;

        log::debug!(
            "recorded outcome for question {}: status {:?}, interval {}d",
            question_id,
            next.status,
            next.interval
        );

        Ok(next)
    }

    /// Close a question's error entry. Unknown ids and already-resolved
    /// entries come back as distinct errors so the caller can tell the
    /// learner what happened; nothing is written in either case.
    pub fn mark_resolved(&self, question_id: &str) -> Result<ReviewState> {
        let mut exams = self.load_exams()?;

        let question = find_question_mut(&mut exams, question_id)
            .ok_or_else(|| ReviewStorageError::QuestionNotFound(question_id.to_string()))?;

        let current = question
            .review_state
            .clone()
            .ok_or_else(|| ReviewStorageError::NotTracked(question_id.to_string()))?;

        if current.status == ReviewStatus::Resolved {
            return Err(ReviewStorageError::AlreadyResolved(question_id.to_string()));
        }

        let next = resolve(&current);
        question.review_state = Some(next.clone());
        self.save_exams(&exams)?;

        log::info!("question {} marked resolved", question_id);
        Ok(next)
    }

    // ==================== Session Operations ====================

    /// The pool of due, unresolved questions across the whole bank
    pub fn due_candidates(&self) -> Result<Vec<SessionCandidate>> {
        let exams = self.load_exams()?;
        Ok(collect_candidates(&exams, Utc::now()))
    }

    /// Compose a study session of at most `max_size` items
    pub fn compose_session(
        &self,
        max_size: usize,
        config: &SchedulerConfig,
    ) -> Result<StudySession> {
        let now = Utc::now();
        let exams = self.load_exams()?;
        let candidates = collect_candidates(&exams, now);
        let composed = session::compose_session(candidates, max_size, config, now);

        log::debug!(
            "composed session: {} of {} due items (requested {})",
            composed.items.len(),
            composed.pool_size,
            max_size
        );

        Ok(composed)
    }

    /// Bank-wide totals for the overview screen
    pub fn bank_stats(&self) -> Result<BankStats> {
        let exams = self.load_exams()?;
        let now = Utc::now();

        let mut stats = BankStats::default();
        for exam in &exams {
            for question in tracked_questions(exam) {
                let Some(state) = &question.review_state else {
                    continue;
                };
                stats.total_errors += 1;
                match state.status {
                    ReviewStatus::NewError => stats.new_errors += 1,
                    ReviewStatus::InReinforcement => stats.in_reinforcement += 1,
                    ReviewStatus::Resolved => stats.resolved += 1,
                }
                if state.is_due(now) {
                    stats.due += 1;
                }
            }
        }

        Ok(stats)
    }
}

/// Questions carrying review bookkeeping, without double-counting the
/// graded snapshots that mirror a live question
fn tracked_questions(exam: &ExamRecord) -> impl Iterator<Item = &Question> {
    let live_ids: HashSet<&str> = exam.questions.iter().map(|q| q.id.as_str()).collect();
    let graded = exam
        .result
        .iter()
        .flat_map(|r| r.resultados.iter())
        .filter(move |q| !live_ids.contains(q.id.as_str()));
    exam.questions.iter().chain(graded)
}

fn collect_candidates(exams: &[ExamRecord], now: DateTime<Utc>) -> Vec<SessionCandidate> {
    let mut candidates = Vec::new();
    for exam in exams {
        for question in tracked_questions(exam) {
            let Some(state) = &question.review_state else {
                continue;
            };
            if state.is_due(now) {
                candidates.push(SessionCandidate {
                    exam_id: exam.id.clone(),
                    question_id: question.id.clone(),
                    question_type: question.question_type.clone(),
                    text: question.text.clone(),
                    state: state.clone(),
                });
            }
        }
    }
    candidates
}

/// Find a question by id, preferring the live `questions` list over the
/// graded snapshots in `result`
fn find_question_mut<'a>(
    exams: &'a mut [ExamRecord],
    question_id: &str,
) -> Option<&'a mut Question> {
    let in_live = exams
        .iter()
        .any(|e| e.questions.iter().any(|q| q.id == question_id));

    if in_live {
        exams
            .iter_mut()
            .flat_map(|e| e.questions.iter_mut())
            .find(|q| q.id == question_id)
    } else {
        exams
            .iter_mut()
            .filter_map(|e| e.result.as_mut())
            .flat_map(|r| r.resultados.iter_mut())
            .find(|q| q.id == question_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn storage() -> (TempDir, ReviewStorage) {
        let dir = TempDir::new().unwrap();
        let storage = ReviewStorage::new(dir.path().to_path_buf());
        (dir, storage)
    }

    fn write_raw(storage: &ReviewStorage, raw: Value) {
        fs::create_dir_all(&storage.data_dir).unwrap();
        fs::write(storage.exams_path(), serde_json::to_string(&raw).unwrap()).unwrap();
    }

    fn legacy_bank() -> Value {
        json!([{
            "id": "exam-1",
            "folderPath": "Curso\\Tema1",
            "questions": [{
                "id": "q-1",
                "type": "multiple",
                "text": "¿Cuál es la capital de Francia?",
                "options": ["París", "Lyon", "Marsella"],
                "userAnswer": "Lyon",
                "reviewState": { "interval": 0.5 }
            }]
        }])
    }

    #[test]
    fn test_missing_file_is_empty_bank() {
        let (_dir, storage) = storage();
        assert!(storage.load_exams().unwrap().is_empty());
    }

    #[test]
    fn test_load_canonicalizes_legacy_records() {
        let (_dir, storage) = storage();
        write_raw(&storage, legacy_bank());

        let exams = storage.load_exams().unwrap();
        assert_eq!(exams.len(), 1);
        assert_eq!(exams[0].folder_path.as_deref(), Some("Curso/Tema1"));

        let question = &exams[0].questions[0];
        assert_eq!(
            question.question_type,
            crate::exams::models::QuestionType::MultipleChoice
        );
        let state = question.review_state.as_ref().unwrap();
        assert_eq!(state.interval, 1);
        assert_eq!(state.easiness, 2.5);
        assert_eq!(state.status, ReviewStatus::NewError);
    }

    #[test]
    fn test_two_failures_reach_reinforcement() {
        let (_dir, storage) = storage();
        write_raw(&storage, legacy_bank());

        storage.record_outcome("q-1", ReviewOutcome::Incorrect).unwrap();
        let state = storage.record_outcome("q-1", ReviewOutcome::Incorrect).unwrap();

        assert_eq!(state.status, ReviewStatus::InReinforcement);
        assert_eq!(state.times_failed, 2);
        assert_eq!(state.interval, 1);

        // The update survived the round trip to disk
        let exams = storage.load_exams().unwrap();
        let persisted = exams[0].questions[0].review_state.as_ref().unwrap();
        assert_eq!(persisted.times_failed, 2);
        assert_eq!(persisted.status, ReviewStatus::InReinforcement);
    }

    #[test]
    fn test_outcome_for_unknown_question() {
        let (_dir, storage) = storage();
        write_raw(&storage, legacy_bank());

        let err = storage
            .record_outcome("nope", ReviewOutcome::Incorrect)
            .unwrap_err();
        assert!(matches!(err, ReviewStorageError::QuestionNotFound(_)));
    }

    #[test]
    fn test_correct_outcome_needs_an_entry() {
        let (_dir, storage) = storage();
        write_raw(
            &storage,
            json!([{
                "id": "exam-1",
                "questions": [{ "id": "q-1", "type": "corta", "text": "x" }]
            }]),
        );

        let err = storage
            .record_outcome("q-1", ReviewOutcome::Correct { grade: None })
            .unwrap_err();
        assert!(matches!(err, ReviewStorageError::NotTracked(_)));
    }

    #[test]
    fn test_first_failure_opens_entry() {
        let (_dir, storage) = storage();
        write_raw(
            &storage,
            json!([{
                "id": "exam-1",
                "questions": [{ "id": "q-1", "type": "corta", "text": "x" }]
            }]),
        );

        let state = storage.record_outcome("q-1", ReviewOutcome::Incorrect).unwrap();
        assert_eq!(state.status, ReviewStatus::NewError);
        assert_eq!(state.times_failed, 1);
        assert_eq!(state.interval, 1);
    }

    #[test]
    fn test_mark_resolved_then_again_is_distinct_error() {
        let (_dir, storage) = storage();
        write_raw(&storage, legacy_bank());

        let resolved = storage.mark_resolved("q-1").unwrap();
        assert_eq!(resolved.status, ReviewStatus::Resolved);

        let err = storage.mark_resolved("q-1").unwrap_err();
        assert!(matches!(err, ReviewStorageError::AlreadyResolved(_)));

        let err = storage.mark_resolved("ghost").unwrap_err();
        assert!(matches!(err, ReviewStorageError::QuestionNotFound(_)));
    }

    #[test]
    fn test_failure_after_resolve_opens_fresh_entry() {
        let (_dir, storage) = storage();
        write_raw(&storage, legacy_bank());

        storage.record_outcome("q-1", ReviewOutcome::Incorrect).unwrap();
        storage.record_outcome("q-1", ReviewOutcome::Incorrect).unwrap();
        storage.mark_resolved("q-1").unwrap();

        let state = storage.record_outcome("q-1", ReviewOutcome::Incorrect).unwrap();

        // Fresh entry, first failure
        assert_eq!(state.status, ReviewStatus::NewError);
        assert_eq!(state.times_failed, 1);

        // The resolved entry is history now, not gone
        let exams = storage.load_exams().unwrap();
        let question = &exams[0].questions[0];
        assert_eq!(question.review_history.len(), 1);
        assert_eq!(question.review_history[0].status, ReviewStatus::Resolved);
        assert_eq!(question.review_history[0].times_failed, 2);
    }

    #[test]
    fn test_resolved_questions_leave_the_pool() {
        let (_dir, storage) = storage();
        write_raw(&storage, legacy_bank());

        assert_eq!(storage.due_candidates().unwrap().len(), 1);
        storage.mark_resolved("q-1").unwrap();
        assert!(storage.due_candidates().unwrap().is_empty());
    }

    #[test]
    fn test_compose_session_end_to_end() {
        let (_dir, storage) = storage();
        write_raw(
            &storage,
            json!([{
                "id": "exam-1",
                "questions": [
                    {
                        "id": "q-often",
                        "type": "multiple",
                        "text": "a",
                        "userAnswer": "x",
                        "reviewState": { "timesFailed": 5, "status": "en_refuerzo" }
                    },
                    {
                        "id": "q-new",
                        "type": "corta",
                        "text": "b",
                        "userAnswer": "y"
                    }
                ]
            }]),
        );

        let session = storage
            .compose_session(1, &SchedulerConfig::default())
            .unwrap();
        assert_eq!(session.items.len(), 1);
        assert_eq!(session.pool_size, 2);
        // The frequent failure outranks the new error
        assert_eq!(session.items[0].question_id, "q-often");
        assert!(!session.items[0].rationale.is_empty());
        assert!(!session.items[0].recommendation.is_empty());
    }

    #[test]
    fn test_empty_bank_composes_empty_session() {
        let (_dir, storage) = storage();
        let session = storage
            .compose_session(10, &SchedulerConfig::default())
            .unwrap();
        assert!(session.items.is_empty());
        assert_eq!(session.pool_size, 0);
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let (_dir, storage) = storage();
        write_raw(&storage, legacy_bank());

        let exams = storage.load_exams().unwrap();
        storage.save_exams(&exams).unwrap();

        let reloaded = storage.load_exams().unwrap();
        assert_eq!(
            serde_json::to_value(&exams).unwrap(),
            serde_json::to_value(&reloaded).unwrap()
        );
    }

    #[test]
    fn test_upsert_exam() {
        let (_dir, storage) = storage();
        storage.init().unwrap();

        let mut exam = ExamRecord::new(Some("Curso/Tema2".to_string()), None);
        storage.upsert_exam(&exam).unwrap();
        assert_eq!(storage.load_exams().unwrap().len(), 1);

        exam.title = Some("Parcial".to_string());
        storage.upsert_exam(&exam).unwrap();

        let exams = storage.load_exams().unwrap();
        assert_eq!(exams.len(), 1);
        assert_eq!(exams[0].title.as_deref(), Some("Parcial"));
    }

    #[test]
    fn test_bank_stats() {
        let (_dir, storage) = storage();
        write_raw(
            &storage,
            json!([{
                "id": "exam-1",
                "questions": [
                    { "id": "a", "type": "corta", "text": "a", "userAnswer": "x" },
                    {
                        "id": "b",
                        "type": "corta",
                        "text": "b",
                        "reviewState": { "status": "in_reinforcement", "timesFailed": 2 }
                    },
                    {
                        "id": "c",
                        "type": "corta",
                        "text": "c",
                        "reviewState": { "status": "resolved", "timesFailed": 1 }
                    }
                ]
            }]),
        );

        let stats = storage.bank_stats().unwrap();
        assert_eq!(stats.total_errors, 3);
        assert_eq!(stats.new_errors, 1);
        assert_eq!(stats.in_reinforcement, 1);
        assert_eq!(stats.resolved, 1);
        // The resolved entry is not due
        assert_eq!(stats.due, 2);
    }

    #[test]
    fn test_graded_snapshot_fallback_for_legacy_records() {
        // Old vintages only wrote the graded result list
        let (_dir, storage) = storage();
        write_raw(
            &storage,
            json!([{
                "id": "exam-1",
                "result": {
                    "results": [{ "type": "desarrollo", "text": "explica X" }]
                }
            }]),
        );

        let candidates = storage.due_candidates().unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].question_id, "exam-1#q0");

        let state = storage
            .record_outcome("exam-1#q0", ReviewOutcome::Incorrect)
            .unwrap();
        assert_eq!(state.times_failed, 1);
    }
}
