//! Session report generation.
//!
//! Turns raw telemetry into behavioral signals (average, peak, stability
//! index), folds in the per-concept failure counts, and sends one structured
//! prompt to the chat backend. The upstream reply is passed through to the
//! caller unmodified.

use std::collections::BTreeMap;

use chrono::Utc;
use labs_core::ai::{AiError, ChatBackend};
use labs_core::config::ReportConfig;
use labs_core::error::LabsError;
use labs_ingest::store::{SessionOverview, SessionStore};
use uuid::Uuid;

/// Behavioral signals extracted from a session's force telemetry.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySignals {
    pub avg_force: f64,
    pub peak_force: f64,
    /// Mean absolute deviation of the most recent window from the overall
    /// average. High deviation means chaotic play.
    pub stability_index: f64,
    pub behavior: Behavior,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Stable,
    Erratic,
}

impl std::fmt::Display for Behavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Behavior::Stable => write!(f, "Stable"),
            Behavior::Erratic => write!(f, "Erratic"),
        }
    }
}

/// Compute the signals for a force series ordered by recording time.
/// Returns `None` when there is no telemetry at all.
pub fn analyze_forces(forces: &[f64], config: &ReportConfig) -> Option<TelemetrySignals> {
    if forces.is_empty() {
        return None;
    }

    let avg_force = forces.iter().sum::<f64>() / forces.len() as f64;
    let peak_force = forces.iter().cloned().fold(f64::MIN, f64::max);

    let window = forces.len().min(config.recent_window.max(1));
    let recent = &forces[forces.len() - window..];
    let stability_index =
        recent.iter().map(|f| (f - avg_force).abs()).sum::<f64>() / window as f64;

    let behavior = if stability_index < config.stability_threshold {
        Behavior::Stable
    } else {
        Behavior::Erratic
    };

    Some(TelemetrySignals {
        avg_force,
        peak_force,
        stability_index,
        behavior,
    })
}

/// Count failures per concept, ordered by concept name for a deterministic
/// prompt.
pub fn failure_map(concepts: &[String]) -> BTreeMap<String, usize> {
    let mut map = BTreeMap::new();
    for concept in concepts {
        *map.entry(concept.clone()).or_insert(0) += 1;
    }
    map
}

/// Assemble the (system, user) prompt pair with the fixed JSON response
/// contract.
pub fn build_prompt(
    overview: &SessionOverview,
    signals: &TelemetrySignals,
    failures: &BTreeMap<String, usize>,
) -> (String, String) {
    let system = "You are a Principal Chemical Engineer and Learning Psychology Specialist at \
                  Learning Labs. Your task is to turn physics telemetry into a technical \
                  mentoring roadmap. You must respond strictly in JSON format."
        .to_string();

    let failure_lines: Vec<String> = failures
        .iter()
        .map(|(concept, count)| format!("{concept}: {count}"))
        .collect();

    let user = format!(
        "TELEMETRY ANALYSIS - SESSION {session_id}\n\
         - Student: {student}\n\
         - Session score: {score}\n\
         - Average pressure: {avg:.2} atm\n\
         - Peak pressure: {peak:.2} atm\n\
         - Mechanical behavior: {behavior}\n\
         - Critical failures by concept: {{{failures}}}\n\
         \n\
         REQUIRED JSON STRUCTURE:\n\
         {{\n\
         \x20 \"executive_summary\": \"high-level behavioral analysis\",\n\
         \x20 \"technical_strengths\": [\"list\", \"of\", \"wins\"],\n\
         \x20 \"critical_weaknesses\": [\"list\", \"of\", \"red\", \"areas\"],\n\
         \x20 \"learning_path\": [\"steps\", \"toward\", \"mastery\"],\n\
         \x20 \"ai_score\": 0\n\
         }}",
        session_id = overview.session_id,
        student = overview.student,
        score = overview.score,
        avg = signals.avg_force,
        peak = signals.peak_force,
        behavior = signals.behavior,
        failures = failure_lines.join(", "),
    );

    (system, user)
}

fn map_ai_error(e: AiError) -> LabsError {
    match e {
        AiError::Api { code, message } => {
            LabsError::UpstreamUnavailable(format!("upstream returned {code}: {message}"))
        }
        AiError::Http(e) => LabsError::UpstreamUnavailable(e.to_string()),
        other => LabsError::Internal(anyhow::anyhow!(other)),
    }
}

/// Build and issue one feedback request for a paired session.
///
/// Fails with `InsufficientData` before any outbound call when the session is
/// unknown or has no telemetry; a non-success upstream status becomes
/// `UpstreamUnavailable` and is not retried.
pub async fn generate_report(
    store: &dyn SessionStore,
    ai: &dyn ChatBackend,
    config: &ReportConfig,
    session_id: Uuid,
) -> Result<serde_json::Value, LabsError> {
    let overview = store
        .session_overview(session_id)
        .await?
        .ok_or_else(|| LabsError::InsufficientData("unknown session".to_string()))?;

    let signals = analyze_forces(&overview.forces, config)
        .ok_or_else(|| LabsError::InsufficientData("no telemetry recorded for this session".to_string()))?;

    let failures = failure_map(&overview.failure_concepts);
    let (system, user) = build_prompt(&overview, &signals, &failures);

    tracing::debug!(%session_id, behavior = %signals.behavior, "Requesting session report");

    let report = ai.complete(&system, &user).await.map_err(map_ai_error)?;

    Ok(serde_json::json!({
        "session_id": session_id,
        "report": report,
        "meta": {
            "generated_at": Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION"),
        }
    }))
}
