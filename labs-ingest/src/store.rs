//! Storage gateway for paired sessions.
//!
//! `SessionStore` is the seam between the ingestion/report logic and the
//! database: `PgSessionStore` is the real PostgreSQL implementation,
//! `InMemorySessionStore` is a fake with the same atomicity and uniqueness
//! semantics so orchestration can be tested without a live database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use labs_core::error::LabsError;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::payload::{FailurePayload, SessionPayload, TelemetryPayload};

/// Everything the report builder needs about one paired session.
#[derive(Debug, Clone)]
pub struct SessionOverview {
    pub session_id: Uuid,
    pub student: String,
    pub score: i32,
    /// Forces ordered by recording time.
    pub forces: Vec<f64>,
    pub failure_concepts: Vec<String>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Which of the given idempotency identifiers are already paired.
    /// Advisory only; the unique constraint is the race-free guard.
    async fn existing_local_ids(&self, local_ids: &[i64]) -> Result<Vec<i64>, LabsError>;

    /// Persist a whole validated batch atomically: each session row plus all
    /// of its failure and telemetry rows, or nothing at all. Returns the
    /// number of sessions paired. A duplicate idempotency identifier maps to
    /// `LabsError::Validation`.
    async fn ingest_batch(&self, owner_id: Uuid, batch: &[SessionPayload])
        -> Result<u64, LabsError>;

    async fn session_overview(&self, session_id: Uuid)
        -> Result<Option<SessionOverview>, LabsError>;
}

// ============================================================================
// PostgreSQL implementation
// ============================================================================

pub struct PgSessionStore {
    pool: PgPool,
}

// Multi-row inserts stay well under the 65535 postgres bind limit.
const FAILURE_CHUNK: usize = 5_000;
const TELEMETRY_CHUNK: usize = 10_000;

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|d| d.code())
        .map(|c| c == "23505")
        .unwrap_or(false)
}

fn map_insert_error(e: sqlx::Error) -> LabsError {
    if is_unique_violation(&e) {
        LabsError::invalid("local_db_id", "session already paired with Learning Labs")
    } else {
        LabsError::Storage(e)
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn existing_local_ids(&self, local_ids: &[i64]) -> Result<Vec<i64>, LabsError> {
        let rows: Vec<i64> = sqlx::query_scalar(
            "SELECT local_db_id FROM game_sessions WHERE local_db_id = ANY($1)",
        )
        .bind(local_ids.to_vec())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn ingest_batch(
        &self,
        owner_id: Uuid,
        batch: &[SessionPayload],
    ) -> Result<u64, LabsError> {
        let mut tx = self.pool.begin().await?;

        for session in batch {
            let session_id = Uuid::new_v4();

            sqlx::query(
                r#"
                INSERT INTO game_sessions (id, user_id, local_db_id, start_time, end_time, score)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(session_id)
            .bind(owner_id)
            .bind(session.local_db_id)
            .bind(session.start_time)
            .bind(session.end_time)
            .bind(session.score)
            .execute(&mut *tx)
            .await
            .map_err(map_insert_error)?;

            for chunk in session.failures.chunks(FAILURE_CHUNK) {
                let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
                    "INSERT INTO pedagogical_failures \
                     (id, session_id, concept, severity, ai_feedback, occurred_at) ",
                );
                qb.push_values(chunk, |mut b, f| {
                    b.push_bind(Uuid::new_v4())
                        .push_bind(session_id)
                        .push_bind(&f.concept)
                        .push_bind(&f.severity)
                        .push_bind(&f.ai_feedback)
                        .push_bind(f.timestamp);
                });
                qb.build().execute(&mut *tx).await.map_err(map_insert_error)?;
            }

            for chunk in session.telemetry.chunks(TELEMETRY_CHUNK) {
                let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
                    "INSERT INTO telemetry_samples (session_id, force, recorded_at) ",
                );
                qb.push_values(chunk, |mut b, t| {
                    b.push_bind(session_id)
                        .push_bind(t.force)
                        .push_bind(t.timestamp);
                });
                qb.build().execute(&mut *tx).await.map_err(map_insert_error)?;
            }
        }

        tx.commit().await?;
        Ok(batch.len() as u64)
    }

    async fn session_overview(
        &self,
        session_id: Uuid,
    ) -> Result<Option<SessionOverview>, LabsError> {
        let header: Option<(String, i32)> = sqlx::query_as(
            r#"
            SELECT u.username, s.score
            FROM game_sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        let (student, score) = match header {
            Some(h) => h,
            None => return Ok(None),
        };

        let forces: Vec<f64> = sqlx::query_scalar(
            "SELECT force FROM telemetry_samples WHERE session_id = $1 ORDER BY recorded_at, id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        let failure_concepts: Vec<String> = sqlx::query_scalar(
            "SELECT concept FROM pedagogical_failures WHERE session_id = $1 ORDER BY occurred_at",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(SessionOverview {
            session_id,
            student,
            score,
            forces,
            failure_concepts,
        }))
    }
}

// ============================================================================
// In-memory fake
// ============================================================================

#[derive(Debug, Clone)]
struct StoredSession {
    id: Uuid,
    #[allow(dead_code)]
    owner_id: Uuid,
    local_db_id: i64,
    score: i32,
    failures: Vec<FailurePayload>,
    telemetry: Vec<TelemetryPayload>,
}

/// In-memory `SessionStore` with the same uniqueness and all-or-nothing
/// behavior as the PostgreSQL implementation.
pub struct InMemorySessionStore {
    student: String,
    inner: Mutex<HashMap<i64, StoredSession>>,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self {
            student: "student".to_string(),
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_student(student: impl Into<String>) -> Self {
        Self {
            student: student.into(),
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn session_count(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn session_id_for_local(&self, local_db_id: i64) -> Option<Uuid> {
        self.inner.lock().unwrap().get(&local_db_id).map(|s| s.id)
    }

    pub fn row_counts_for_local(&self, local_db_id: i64) -> Option<(usize, usize)> {
        self.inner
            .lock()
            .unwrap()
            .get(&local_db_id)
            .map(|s| (s.failures.len(), s.telemetry.len()))
    }

    /// Seed one paired session directly, bypassing validation. Test helper
    /// for report-builder scenarios.
    pub fn seed_session(
        &self,
        local_db_id: i64,
        score: i32,
        forces: &[f64],
        failure_concepts: &[&str],
    ) -> Uuid {
        let now: DateTime<Utc> = Utc::now();
        let stored = StoredSession {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            local_db_id,
            score,
            failures: failure_concepts
                .iter()
                .map(|c| FailurePayload {
                    concept: c.to_string(),
                    severity: "medium".to_string(),
                    ai_feedback: String::new(),
                    timestamp: now,
                })
                .collect(),
            telemetry: forces
                .iter()
                .map(|f| TelemetryPayload {
                    force: *f,
                    timestamp: now,
                })
                .collect(),
        };
        let id = stored.id;
        self.inner.lock().unwrap().insert(local_db_id, stored);
        id
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn existing_local_ids(&self, local_ids: &[i64]) -> Result<Vec<i64>, LabsError> {
        let inner = self.inner.lock().unwrap();
        Ok(local_ids
            .iter()
            .copied()
            .filter(|id| inner.contains_key(id))
            .collect())
    }

    async fn ingest_batch(
        &self,
        owner_id: Uuid,
        batch: &[SessionPayload],
    ) -> Result<u64, LabsError> {
        let mut inner = self.inner.lock().unwrap();

        // Stage first so a duplicate anywhere leaves the store untouched.
        let mut staged: Vec<StoredSession> = Vec::with_capacity(batch.len());
        for session in batch {
            let collides_existing = inner.contains_key(&session.local_db_id);
            let collides_staged = staged.iter().any(|s| s.local_db_id == session.local_db_id);
            if collides_existing || collides_staged {
                return Err(LabsError::invalid(
                    "local_db_id",
                    "session already paired with Learning Labs",
                ));
            }
            staged.push(StoredSession {
                id: Uuid::new_v4(),
                owner_id,
                local_db_id: session.local_db_id,
                score: session.score,
                failures: session.failures.clone(),
                telemetry: session.telemetry.clone(),
            });
        }

        let count = staged.len() as u64;
        for s in staged {
            inner.insert(s.local_db_id, s);
        }
        Ok(count)
    }

    async fn session_overview(
        &self,
        session_id: Uuid,
    ) -> Result<Option<SessionOverview>, LabsError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.values().find(|s| s.id == session_id).map(|s| {
            SessionOverview {
                session_id: s.id,
                student: self.student.clone(),
                score: s.score,
                forces: s.telemetry.iter().map(|t| t.force).collect(),
                failure_concepts: s.failures.iter().map(|f| f.concept.clone()).collect(),
            }
        }))
    }
}
