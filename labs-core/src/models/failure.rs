use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A pedagogical error event where the AI tutor intervened.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PedagogicalFailure {
    pub id: Uuid,
    pub session_id: Uuid,
    pub concept: String,
    pub severity: String,
    pub ai_feedback: String,
    pub occurred_at: DateTime<Utc>,
}
