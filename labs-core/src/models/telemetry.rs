use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One physics-engine force reading. Thousands per session.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TelemetrySample {
    pub id: i64,
    pub session_id: Uuid,
    pub force: f64,
    pub recorded_at: DateTime<Utc>,
}
