use serde::Serialize;
use thiserror::Error;

/// One field-level problem in a sync batch, addressed by item index.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub index: usize,
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(index: usize, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            index,
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Every problem found across a whole batch. Validation never stops at the
/// first bad item; the report carries all of them.
#[derive(Debug, Clone, Serialize, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<FieldError>,
}

impl ValidationReport {
    pub fn push(&mut self, index: usize, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(index, field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} validation error(s)", self.errors.len())?;
        for e in &self.errors {
            write!(f, "; [{}].{}: {}", e.index, e.field, e.message)?;
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum LabsError {
    #[error("Validation failed: {0}")]
    Validation(ValidationReport),

    #[error("Missing or malformed credentials")]
    Unauthenticated,

    #[error("Caller is not allowed to perform this operation")]
    Forbidden,

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Upstream AI endpoint unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl LabsError {
    /// Single-field convenience constructor for validation failures that are
    /// not tied to a batch item.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut report = ValidationReport::default();
        report.push(0, field, message);
        LabsError::Validation(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_collects_all_errors() {
        let mut report = ValidationReport::default();
        report.push(0, "score", "must be non-negative");
        report.push(2, "local_db_id", "already paired");
        assert_eq!(report.errors.len(), 2);
        let text = report.to_string();
        assert!(text.contains("[0].score"));
        assert!(text.contains("[2].local_db_id"));
    }

    #[test]
    fn test_report_serializes_per_item() {
        let mut report = ValidationReport::default();
        report.push(1, "force", "must be a finite number");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["errors"][0]["index"], 1);
        assert_eq!(json["errors"][0]["field"], "force");
    }
}
