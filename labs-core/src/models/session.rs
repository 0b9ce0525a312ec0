use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One recorded play-through of the molecular forge simulation. Immutable
/// once paired.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GameSession {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Client-generated idempotency identifier, globally unique.
    pub local_db_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub score: i32,
    pub created_at: DateTime<Utc>,
}
