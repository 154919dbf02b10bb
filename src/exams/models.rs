//! Data models for exam records and their questions
//!
//! These are the canonical shapes. Persisted data may predate them;
//! everything goes through [`crate::exams::normalize`] before being
//! deserialized into these types, so the serde defaults here only cover
//! fields the normalizer leaves absent on purpose.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::review::models::ReviewState;

/// A persisted exam attempt: the questions as asked, the graded result,
/// and the review bookkeeping attached at exam granularity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamRecord {
    #[serde(default)]
    pub id: String,
    /// Forward-slash path of the folder the exam lives in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ExamResult>,
    /// Aggregate review state for the whole exam
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_state: Option<ReviewState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ExamRecord {
    pub fn new(folder_path: Option<String>, title: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            folder_path,
            title,
            questions: Vec::new(),
            result: None,
            review_state: None,
            created_at: Some(Utc::now()),
        }
    }
}

/// Graded outcome of an exam, with a snapshot of each question as graded
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
    #[serde(default)]
    pub resultados: Vec<Question>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

/// Kind of question
///
/// Unknown kinds survive load and save verbatim; downstream code treats
/// them as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    ShortAnswer,
    OpenQuestion,
    TrueFalse,
    #[serde(untagged)]
    Other(String),
}

impl Default for QuestionType {
    fn default() -> Self {
        Self::OpenQuestion
    }
}

/// A single exam question, with the learner's answer and the review
/// bookkeeping attached at question granularity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub question_type: QuestionType,
    #[serde(default)]
    pub text: String,
    /// Present only for multiple choice
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// Answers are opaque to the core; the grading collaborator owns
    /// their shape
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_answer: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_state: Option<ReviewState>,
    /// Superseded entries, kept when a fresh failure reopens a resolved
    /// question
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub review_history: Vec<ReviewState>,
}

impl Question {
    pub fn new(question_type: QuestionType, text: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            question_type,
            text,
            options: None,
            correct_answer: None,
            user_answer: None,
            review_state: None,
            review_history: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_type_canonical_names() {
        let t: QuestionType = serde_json::from_value(serde_json::json!("multiple_choice")).unwrap();
        assert_eq!(t, QuestionType::MultipleChoice);
        assert_eq!(
            serde_json::to_value(QuestionType::TrueFalse).unwrap(),
            serde_json::json!("true_false")
        );
    }

    #[test]
    fn test_question_type_unknown_round_trips() {
        let t: QuestionType = serde_json::from_value(serde_json::json!("matching")).unwrap();
        assert_eq!(t, QuestionType::Other("matching".to_string()));
        assert_eq!(
            serde_json::to_value(&t).unwrap(),
            serde_json::json!("matching")
        );
    }

    #[test]
    fn test_minimal_legacy_question_deserializes() {
        // Vintages that wrote nothing but text still load
        let q: Question = serde_json::from_value(serde_json::json!({"text": "¿2+2?"})).unwrap();
        assert_eq!(q.text, "¿2+2?");
        assert!(q.review_state.is_none());
        assert!(q.review_history.is_empty());
    }
}
