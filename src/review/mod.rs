//! Spaced repetition over the exam error bank
//!
//! This module provides:
//! - Per-question review state tracking (SM-2 style)
//! - Outcome updates, due-ness and priority tiering
//! - Bounded, tiered study session composition with statistics
//! - File-backed storage for the error bank

pub mod algorithm;
pub mod models;
pub mod session;
pub mod storage;

pub use models::*;
pub use session::{SessionCandidate, SessionItem, SessionStats, StudySession};
pub use storage::{ReviewStorage, ReviewStorageError};
