//! Sync payload DTOs and batch validation.
//!
//! Items are deserialized one at a time from raw JSON so a malformed session
//! cannot abort validation of its siblings; every problem across the batch is
//! collected into one `ValidationReport`. Persistence is strict
//! all-or-nothing: a single invalid item fails the entire batch.

use chrono::{DateTime, Utc};
use labs_core::error::ValidationReport;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /sync/pair`. Sessions stay raw here; see `validate_items`.
#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    pub sessions: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPayload {
    /// Client-generated idempotency identifier.
    pub local_db_id: i64,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub score: i32,
    #[serde(default)]
    pub failures: Vec<FailurePayload>,
    #[serde(default)]
    pub telemetry: Vec<TelemetryPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailurePayload {
    pub concept: String,
    #[serde(default = "default_severity")]
    pub severity: String,
    pub ai_feedback: String,
    pub timestamp: DateTime<Utc>,
}

fn default_severity() -> String {
    "medium".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryPayload {
    pub force: f64,
    pub timestamp: DateTime<Utc>,
}

/// Shape- and semantics-check every item independently.
///
/// Returns the successfully parsed items (paired with their batch index) and
/// the accumulated error report. Callers enforce the strict strategy: any
/// error in the report fails the whole batch.
pub fn validate_items(items: &[Value]) -> (Vec<(usize, SessionPayload)>, ValidationReport) {
    let mut report = ValidationReport::default();
    let mut parsed = Vec::with_capacity(items.len());
    let mut seen_local_ids: Vec<i64> = Vec::new();

    for (index, item) in items.iter().enumerate() {
        let session: SessionPayload = match serde_json::from_value(item.clone()) {
            Ok(s) => s,
            Err(e) => {
                report.push(index, "session", e.to_string());
                continue;
            }
        };

        if session.score < 0 {
            report.push(index, "score", "must be non-negative");
        }

        if let Some(end) = session.end_time {
            if end < session.start_time {
                report.push(index, "end_time", "must not precede start_time");
            }
        }

        for (j, sample) in session.telemetry.iter().enumerate() {
            if !sample.force.is_finite() {
                report.push(index, format!("telemetry[{j}].force"), "must be a finite number");
            }
        }

        for (j, failure) in session.failures.iter().enumerate() {
            if failure.concept.trim().is_empty() {
                report.push(index, format!("failures[{j}].concept"), "must not be empty");
            }
        }

        if seen_local_ids.contains(&session.local_db_id) {
            report.push(index, "local_db_id", "duplicated within this batch");
        } else {
            seen_local_ids.push(session.local_db_id);
        }

        parsed.push((index, session));
    }

    (parsed, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_item(local_db_id: i64) -> Value {
        json!({
            "local_db_id": local_db_id,
            "start_time": "2026-02-17T15:00:00Z",
            "end_time": "2026-02-17T15:20:00Z",
            "score": 840,
            "failures": [
                {
                    "concept": "Boyle's Law",
                    "ai_feedback": "Pressure and volume are inversely related.",
                    "timestamp": "2026-02-17T15:05:00Z"
                }
            ],
            "telemetry": [
                { "force": 12.5, "timestamp": "2026-02-17T15:01:00Z" },
                { "force": 14.0, "timestamp": "2026-02-17T15:02:00Z" }
            ]
        })
    }

    #[test]
    fn test_valid_batch_parses_clean() {
        let items = vec![valid_item(1), valid_item(2)];
        let (parsed, report) = validate_items(&items);
        assert!(report.is_empty(), "unexpected errors: {report}");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].1.failures.len(), 1);
        assert_eq!(parsed[0].1.telemetry.len(), 2);
    }

    #[test]
    fn test_bad_item_does_not_abort_siblings() {
        let items = vec![
            json!({ "start_time": "2026-02-17T15:00:00Z" }), // no local_db_id
            valid_item(2),
            json!({ "local_db_id": 3, "start_time": "not a date" }),
        ];
        let (parsed, report) = validate_items(&items);
        // the good middle item still parsed
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].0, 1);
        // both bad items reported
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].index, 0);
        assert_eq!(report.errors[1].index, 2);
    }

    #[test]
    fn test_duplicate_local_id_within_batch_flags_later_item() {
        let items = vec![valid_item(7), valid_item(7)];
        let (_, report) = validate_items(&items);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].index, 1);
        assert_eq!(report.errors[0].field, "local_db_id");
    }

    #[test]
    fn test_semantic_checks_collected_per_field() {
        let mut item = valid_item(1);
        item["score"] = json!(-5);
        item["end_time"] = json!("2026-02-17T14:00:00Z");
        let (_, report) = validate_items(&[item]);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors.iter().any(|e| e.field == "score"));
        assert!(report.errors.iter().any(|e| e.field == "end_time"));
    }

    #[test]
    fn test_end_before_start_rejected() {
        let mut item = valid_item(1);
        item["end_time"] = json!("2026-02-17T14:00:00Z");
        let (_, report) = validate_items(&[item]);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].field, "end_time");
    }

    #[test]
    fn test_severity_defaults_to_medium() {
        let (parsed, report) = validate_items(&[valid_item(1)]);
        assert!(report.is_empty());
        assert_eq!(parsed[0].1.failures[0].severity, "medium");
    }

    #[test]
    fn test_empty_concept_rejected() {
        let mut item = valid_item(1);
        item["failures"][0]["concept"] = json!("   ");
        let (_, report) = validate_items(&[item]);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].field, "failures[0].concept");
    }
}
