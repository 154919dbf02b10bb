//! Canonicalization of persisted exam records
//!
//! Records on disk come from several producer versions: Windows path
//! separators, Spanish question-type names, fractional or string-typed
//! intervals, review fields that only some vintages wrote. Every repair
//! lives here, field by field, so no consumer ever branches on vintage.
//!
//! The transformation is idempotent (canonical input comes back equal),
//! total (a field that cannot be repaired falls back to its documented
//! default; a record is never dropped), and per-record (the result does
//! not depend on collection order).

use chrono::DateTime;
use serde_json::{json, Map, Value};

/// Canonical replacement for every question-type spelling the producers
/// ever wrote. Canonical and unknown values pass through unchanged.
const TYPE_ALIASES: &[(&str, &str)] = &[
    ("multiple", "multiple_choice"),
    ("corta", "short_answer"),
    ("respuesta_corta", "short_answer"),
    ("desarrollo", "open_question"),
    ("abierta", "open_question"),
    ("verdadero-falso", "true_false"),
    ("verdadero_falso", "true_false"),
];

/// Legacy spellings of `folderPath`
const PATH_KEY_ALIASES: &[&str] = &["folder_path", "carpeta", "ruta"];

/// Review status is a closed set, unlike question types: anything not in
/// it is corruption and falls back to `new_error`
const STATUS_ALIASES: &[(&str, &str)] = &[
    ("nuevo", "new_error"),
    ("en_refuerzo", "in_reinforcement"),
    ("refuerzo", "in_reinforcement"),
    ("resuelto", "resolved"),
];

const CANONICAL_STATUSES: &[&str] = &["new_error", "in_reinforcement", "resolved"];

const DEFAULT_STATUS: &str = "new_error";
const DEFAULT_EASINESS: f64 = 2.5;
const MIN_EASINESS: f64 = 1.3;

/// Counts of repairs applied to a collection. Diagnostic only; not part
/// of the normalization contract.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RepairStats {
    pub keys_renamed: usize,
    pub paths_fixed: usize,
    pub types_mapped: usize,
    pub intervals_clamped: usize,
    pub values_coerced: usize,
    pub fields_defaulted: usize,
    pub states_created: usize,
}

impl RepairStats {
    pub fn total(&self) -> usize {
        self.keys_renamed
            + self.paths_fixed
            + self.types_mapped
            + self.intervals_clamped
            + self.values_coerced
            + self.fields_defaulted
            + self.states_created
    }
}

/// Normalize a whole collection, preserving order and count
pub fn normalize_records(records: Vec<Value>) -> Vec<Value> {
    let mut stats = RepairStats::default();
    let records: Vec<Value> = records
        .into_iter()
        .map(|mut record| {
            normalize_record(&mut record, &mut stats);
            record
        })
        .collect();

    if stats.total() > 0 {
        log::debug!(
            "normalized {} exam records, {} repairs: {:?}",
            records.len(),
            stats.total(),
            stats
        );
    }

    records
}

/// Normalize a single record in place
pub fn normalize_record(record: &mut Value, stats: &mut RepairStats) {
    let Some(obj) = record.as_object_mut() else {
        // Not an object at all; nothing we can canonicalize
        return;
    };

    drop_unless_string(obj, "id", stats);
    rename_path_keys(obj, stats);
    normalize_folder_path(obj, stats);
    drop_unless_string(obj, "title", stats);
    drop_invalid_datetime(obj, "createdAt", stats);
    coerce_interval_field(obj, stats);

    if let Some(state) = obj.get_mut("reviewState") {
        normalize_review_state(state, stats);
    }

    let exam_id = obj
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    ensure_array(obj, "questions", stats);
    let mut question_ids = Vec::new();
    if let Some(questions) = obj.get_mut("questions").and_then(Value::as_array_mut) {
        for (index, question) in questions.iter_mut().enumerate() {
            normalize_question(question, &exam_id, index, None, false, stats);
            question_ids.push(
                question
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            );
        }
    }

    if let Some(result) = obj.get_mut("result").and_then(Value::as_object_mut) {
        // Some vintages called the graded list `results`
        if !result.contains_key("resultados") {
            if let Some(list) = result.remove("results") {
                result.insert("resultados".to_string(), list);
                stats.keys_renamed += 1;
            }
        }
        ensure_array(result, "resultados", stats);
        if let Some(graded) = result.get_mut("resultados").and_then(Value::as_array_mut) {
            for (index, question) in graded.iter_mut().enumerate() {
                // Graded entries are snapshots of the live questions and
                // share their ids when the vintage wrote none
                let fallback_id = question_ids.get(index).map(String::as_str);
                normalize_question(question, &exam_id, index, fallback_id, true, stats);
            }
        }
    }
}

fn normalize_question(
    question: &mut Value,
    exam_id: &str,
    index: usize,
    fallback_id: Option<&str>,
    in_result: bool,
    stats: &mut RepairStats,
) {
    let Some(obj) = question.as_object_mut() else {
        return;
    };

    if let Some(raw) = obj.get("type").and_then(Value::as_str) {
        if let Some(canonical) = canonical_type(raw) {
            obj.insert("type".to_string(), Value::String(canonical.to_string()));
            stats.types_mapped += 1;
        }
    } else if obj.get("type").map_or(false, |v| !v.is_null()) {
        // Non-string type is unrepairable; the documented default applies
        obj.remove("type");
        stats.values_coerced += 1;
    }

    drop_unless_string(obj, "text", stats);
    coerce_options(obj, stats);
    coerce_interval_field(obj, stats);

    drop_unless_string(obj, "id", stats);
    if field_missing(obj, "id") {
        let id = match fallback_id.filter(|id| !id.is_empty()) {
            Some(id) => Some(id.to_string()),
            // Stable synthetic id: derived from the owning exam and the
            // question's position, so repeated runs agree
            None if !exam_id.is_empty() => Some(format!("{}#q{}", exam_id, index)),
            None => None,
        };
        if let Some(id) = id {
            obj.insert("id".to_string(), Value::String(id));
            stats.fields_defaulted += 1;
        }
    }

    // Every scored question carries a review state
    let scored = in_result || obj.get("userAnswer").map_or(false, |v| !v.is_null());
    if scored && field_missing(obj, "reviewState") {
        obj.insert("reviewState".to_string(), default_review_state());
        stats.states_created += 1;
    }

    if let Some(state) = obj.get_mut("reviewState") {
        normalize_review_state(state, stats);
    }
    if let Some(history) = obj.get_mut("reviewHistory").and_then(Value::as_array_mut) {
        for state in history.iter_mut() {
            normalize_review_state(state, stats);
        }
    }
}

fn normalize_review_state(state: &mut Value, stats: &mut RepairStats) {
    let Some(obj) = state.as_object_mut() else {
        return;
    };

    coerce_easiness(obj, stats);
    coerce_counter(obj, "repetitions", stats);
    coerce_counter(obj, "timesFailed", stats);
    coerce_interval_field(obj, stats);
    normalize_status(obj, stats);
    drop_invalid_datetime(obj, "lastReviewedAt", stats);

    for (key, default) in [
        ("easiness", json!(DEFAULT_EASINESS)),
        ("repetitions", json!(0)),
        ("interval", json!(1)),
        ("status", json!(DEFAULT_STATUS)),
        ("timesFailed", json!(0)),
    ] {
        if field_missing(obj, key) {
            obj.insert(key.to_string(), default);
            stats.fields_defaulted += 1;
        }
    }
}

fn default_review_state() -> Value {
    json!({
        "easiness": DEFAULT_EASINESS,
        "repetitions": 0,
        "interval": 1,
        "status": DEFAULT_STATUS,
        "timesFailed": 0,
    })
}

// ===== Field repairs =====

fn rename_path_keys(obj: &mut Map<String, Value>, stats: &mut RepairStats) {
    for alias in PATH_KEY_ALIASES {
        if obj.contains_key(*alias) && !obj.contains_key("folderPath") {
            if let Some(value) = obj.remove(*alias) {
                obj.insert("folderPath".to_string(), value);
                stats.keys_renamed += 1;
            }
        }
    }
}

fn normalize_folder_path(obj: &mut Map<String, Value>, stats: &mut RepairStats) {
    match obj.get("folderPath") {
        Some(Value::String(path)) => {
            if path.contains('\\') {
                let fixed = path.replace('\\', "/");
                obj.insert("folderPath".to_string(), Value::String(fixed));
                stats.paths_fixed += 1;
            }
        }
        Some(Value::Null) | None => {}
        Some(_) => {
            // A path that is not a string is unrepairable; absent is the
            // documented fallback
            obj.remove("folderPath");
            stats.values_coerced += 1;
        }
    }
}

fn canonical_type(raw: &str) -> Option<&'static str> {
    TYPE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == raw)
        .map(|(_, canonical)| *canonical)
}

/// Parse any `interval` value as a number, round to nearest, floor at 1.
/// Non-parseable values coerce to 1.
fn coerce_interval(value: &Value) -> i64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => (v.round() as i64).max(1),
        _ => 1,
    }
}

fn coerce_interval_field(obj: &mut Map<String, Value>, stats: &mut RepairStats) {
    let Some(value) = obj.get("interval") else {
        return;
    };
    if value.is_null() {
        return;
    }
    let coerced = coerce_interval(value);
    if value.as_i64() != Some(coerced) {
        obj.insert("interval".to_string(), Value::from(coerced));
        stats.intervals_clamped += 1;
    }
}

fn coerce_easiness(obj: &mut Map<String, Value>, stats: &mut RepairStats) {
    let Some(value) = obj.get("easiness") else {
        return;
    };
    if value.is_null() {
        return;
    }
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    let coerced = match parsed {
        Some(v) if v.is_finite() => v.max(MIN_EASINESS),
        _ => DEFAULT_EASINESS,
    };
    if value.as_f64() != Some(coerced) {
        obj.insert("easiness".to_string(), json!(coerced));
        stats.values_coerced += 1;
    }
}

/// Non-negative integer counters (`repetitions`, `timesFailed`)
fn coerce_counter(obj: &mut Map<String, Value>, key: &str, stats: &mut RepairStats) {
    let Some(value) = obj.get(key) else {
        return;
    };
    if value.is_null() {
        return;
    }
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    let coerced = match parsed {
        Some(v) if v.is_finite() => (v.round() as i64).max(0),
        _ => 0,
    };
    if value.as_i64() != Some(coerced) {
        obj.insert(key.to_string(), Value::from(coerced));
        stats.values_coerced += 1;
    }
}

fn normalize_status(obj: &mut Map<String, Value>, stats: &mut RepairStats) {
    let Some(value) = obj.get("status") else {
        return;
    };
    if value.is_null() {
        return;
    }
    let canonical = match value.as_str() {
        Some(s) if CANONICAL_STATUSES.contains(&s) => return,
        Some(s) => STATUS_ALIASES
            .iter()
            .find(|(alias, _)| *alias == s)
            .map(|(_, canonical)| *canonical)
            .unwrap_or(DEFAULT_STATUS),
        None => DEFAULT_STATUS,
    };
    obj.insert("status".to_string(), Value::String(canonical.to_string()));
    stats.values_coerced += 1;
}

fn coerce_options(obj: &mut Map<String, Value>, stats: &mut RepairStats) {
    let Some(value) = obj.get_mut("options") else {
        return;
    };
    match value {
        Value::Null => {}
        Value::Array(items) => {
            for item in items.iter_mut() {
                if !item.is_string() {
                    // Keep the data, as text
                    let text = match item {
                        Value::Number(n) => n.to_string(),
                        Value::Bool(b) => b.to_string(),
                        ref other => other.to_string(),
                    };
                    *item = Value::String(text);
                    stats.values_coerced += 1;
                }
            }
        }
        _ => {
            obj.remove("options");
            stats.values_coerced += 1;
        }
    }
}

fn drop_unless_string(obj: &mut Map<String, Value>, key: &str, stats: &mut RepairStats) {
    if let Some(value) = obj.get(key) {
        if !value.is_string() && !value.is_null() {
            let replacement = match value {
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            };
            match replacement {
                Some(text) => {
                    obj.insert(key.to_string(), Value::String(text));
                }
                None => {
                    obj.remove(key);
                }
            }
            stats.values_coerced += 1;
        }
    }
}

/// Timestamps that do not parse as RFC 3339 fall back to "never"
fn drop_invalid_datetime(obj: &mut Map<String, Value>, key: &str, stats: &mut RepairStats) {
    let Some(value) = obj.get(key) else {
        return;
    };
    let valid = match value {
        Value::Null => true,
        Value::String(s) => DateTime::parse_from_rfc3339(s).is_ok(),
        _ => false,
    };
    if !valid {
        obj.remove(key);
        stats.values_coerced += 1;
    }
}

fn ensure_array(obj: &mut Map<String, Value>, key: &str, stats: &mut RepairStats) {
    if let Some(value) = obj.get(key) {
        if !value.is_array() && !value.is_null() {
            obj.insert(key.to_string(), Value::Array(Vec::new()));
            stats.values_coerced += 1;
        }
    }
}

fn field_missing(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).map_or(true, Value::is_null)
}
