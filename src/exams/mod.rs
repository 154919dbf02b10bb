//! Exam records and their canonical schema
//!
//! This module provides:
//! - Canonical data models for exams, questions and graded results
//! - Normalization of legacy record vintages into the canonical schema

pub mod models;
pub mod normalize;

pub use models::*;
pub use normalize::{normalize_record, normalize_records, RepairStats};
