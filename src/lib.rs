//! Error bank and spaced repetition core for exam practice
//!
//! The surrounding application records which exam questions a learner
//! got wrong; this crate keeps that error bank canonical across producer
//! versions, schedules re-practice with an SM-2 style algorithm, and
//! composes bounded study sessions. Grading, document handling and all
//! presentation live outside.

pub mod exams;
pub mod review;

pub use exams::{normalize_records, ExamRecord, ExamResult, Question, QuestionType};
pub use review::{
    Priority, ReviewOutcome, ReviewState, ReviewStatus, ReviewStorage, ReviewStorageError,
    SchedulerConfig, StudySession,
};
