//! Real-time tutoring: one structured explanation per failed concept.

use chrono::Utc;
use labs_core::ai::{AiError, ChatBackend};
use labs_core::error::LabsError;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct TutorRequest {
    #[serde(default = "unknown_concept")]
    pub concept: String,
    #[serde(default, rename = "currentPhysics")]
    pub current_physics: PhysicsContext,
    #[serde(default)]
    pub history: Vec<Value>,
}

fn unknown_concept() -> String {
    "Unknown Concept".to_string()
}

#[derive(Debug, Deserialize, Default)]
pub struct PhysicsContext {
    pub temp: Option<f64>,
    pub pressure: Option<f64>,
}

/// System prompt with the fixed JSON response contract. The frontend splits
/// statistics and concepts apart, so free-form text is not acceptable.
pub fn build_tutor_prompt(req: &TutorRequest) -> String {
    format!(
        "You are the AI core of Learning Labs. Your goal is deep teaching. \
         You must respond EXCLUSIVELY in JSON format with this structure: \
         {{ \"concept_explanation\": \"...\", \"technical_tip\": \"...\", \
         \"pedagogical_tag\": \"...\", \"severity_analysis\": \"...\" }}. \
         Context: the student failed at {concept}. \
         Reactor physics: temp {temp:?} K, pressure {pressure:?} atm. \
         Previous error history: {history}.",
        concept = req.concept,
        temp = req.current_physics.temp,
        pressure = req.current_physics.pressure,
        history = serde_json::to_string(&req.history).unwrap_or_else(|_| "[]".to_string()),
    )
}

/// One outbound call, structured reply passed through.
pub async fn explain_failure(
    ai: &dyn ChatBackend,
    req: &TutorRequest,
) -> Result<Value, LabsError> {
    let system = build_tutor_prompt(req);

    let content = ai
        .complete(&system, "Analyze my mistake and help me improve.")
        .await
        .map_err(|e| match e {
            AiError::Api { code, message } => {
                LabsError::UpstreamUnavailable(format!("upstream returned {code}: {message}"))
            }
            AiError::Http(e) => LabsError::UpstreamUnavailable(e.to_string()),
            other => LabsError::Internal(anyhow::anyhow!(other)),
        })?;

    Ok(serde_json::json!({
        "data": content,
        "server_timestamp": Utc::now().to_rfc3339(),
        "status": "success",
    }))
}
