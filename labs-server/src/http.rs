//! Learning Labs HTTP REST API
//!
//! Axum-based HTTP server exposing session pairing, report generation, the
//! real-time tutor, and the simulated reactor status.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a
//! pure inner function. The inner functions are directly testable without
//! axum dispatch machinery.
//!
//! Endpoints:
//! - GET  /health                        — health check with DB status
//! - GET  /status                        — simulated reactor/lesson payload
//! - POST /sync/pair                     — bulk session ingestion (auth)
//! - POST /reports/generate/:session_id  — AI session report
//! - POST /tutor                         — AI tutoring for a failed concept

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use labs_core::ai::ChatBackend;
use labs_core::error::LabsError;
use labs_core::LabsConfig;
use labs_ingest::store::SessionStore;
use labs_ingest::SyncRequest;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::auth;
use crate::subsystems::{reports, status, tutor};

/// Shared state for all HTTP handlers
pub struct HttpState {
    pub pool: PgPool,
    pub config: LabsConfig,
    pub store: Arc<dyn SessionStore>,
    pub ai: Arc<dyn ChatBackend>,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/sync/pair", post(sync_handler))
        .route("/reports/generate/:session_id", post(report_handler))
        .route("/tutor", post(tutor_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Learning Labs HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Error → status mapping
// ============================================================================

/// Translate a component-level error into (status, body). Storage and
/// internal details are logged here and replaced by a generic message.
pub fn error_response(e: LabsError) -> (StatusCode, serde_json::Value) {
    match e {
        LabsError::Validation(report) => (
            StatusCode::BAD_REQUEST,
            serde_json::json!({
                "status": "error",
                "error": "validation failed",
                "errors": report.errors,
            }),
        ),
        LabsError::Unauthenticated => (
            StatusCode::UNAUTHORIZED,
            serde_json::json!({
                "status": "error",
                "error": "missing or malformed credentials",
            }),
        ),
        LabsError::Forbidden => (
            StatusCode::FORBIDDEN,
            serde_json::json!({
                "status": "error",
                "error": "unknown API token",
            }),
        ),
        LabsError::InsufficientData(message) => (
            StatusCode::BAD_REQUEST,
            serde_json::json!({
                "status": "error",
                "error": message,
            }),
        ),
        LabsError::UpstreamUnavailable(detail) => {
            tracing::error!(detail = %detail, "Upstream AI endpoint unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                serde_json::json!({
                    "status": "error",
                    "error": "AI engine temporarily offline",
                }),
            )
        }
        LabsError::Storage(e) => {
            tracing::error!(error = %e, "Storage failure");
            internal_error_body()
        }
        LabsError::Config(e) => {
            tracing::error!(error = %e, "Config failure");
            internal_error_body()
        }
        LabsError::Internal(e) => {
            tracing::error!(error = %e, "Unexpected failure");
            internal_error_body()
        }
    }
}

fn internal_error_body() -> (StatusCode, serde_json::Value) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        serde_json::json!({
            "status": "error",
            "error": "internal processing failure",
        }),
    )
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner health check — queries DB and returns (status_code, json_body).
pub async fn health_inner(pool: &PgPool) -> (StatusCode, serde_json::Value) {
    match labs_core::db::health_check(pool).await {
        Ok(pg_ver) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "postgresql": pg_ver,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "error": e.to_string(),
            }),
        ),
    }
}

/// Inner sync — validates and ingests a batch for an authenticated owner.
pub async fn sync_inner(
    store: &dyn SessionStore,
    owner_id: Uuid,
    req: SyncRequest,
) -> (StatusCode, serde_json::Value) {
    match labs_ingest::ingest_sessions(store, owner_id, &req.sessions).await {
        Ok(paired) => (
            StatusCode::CREATED,
            serde_json::json!({
                "status": "ok",
                "paired": paired,
            }),
        ),
        Err(e) => error_response(e),
    }
}

/// Inner report — aggregates a session and issues one AI call.
pub async fn report_inner(
    store: &dyn SessionStore,
    ai: &dyn ChatBackend,
    config: &LabsConfig,
    session_id: Uuid,
) -> (StatusCode, serde_json::Value) {
    match reports::generate_report(store, ai, &config.report, session_id).await {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => error_response(e),
    }
}

/// Inner tutor — one structured AI explanation.
pub async fn tutor_inner(
    ai: &dyn ChatBackend,
    req: tutor::TutorRequest,
) -> (StatusCode, serde_json::Value) {
    match tutor::explain_failure(ai, &req).await {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => error_response(e),
    }
}

/// Inner status — pure simulation, always 200.
pub fn status_inner(query: status::StatusQuery) -> (StatusCode, serde_json::Value) {
    (StatusCode::OK, status::simulate(query.temp))
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.pool).await;
    (status, Json(body))
}

pub async fn status_handler(Query(query): Query<status::StatusQuery>) -> impl IntoResponse {
    let (status, body) = status_inner(query);
    (status, Json(body))
}

pub async fn sync_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Json(req): Json<SyncRequest>,
) -> impl IntoResponse {
    let user = match auth::authenticate(&state.pool, &headers).await {
        Ok(u) => u,
        Err(e) => {
            let (status, body) = error_response(e);
            return (status, Json(body));
        }
    };

    let (status, body) = sync_inner(state.store.as_ref(), user.id, req).await;
    (status, Json(body))
}

pub async fn report_handler(
    State(state): State<Arc<HttpState>>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) =
        report_inner(state.store.as_ref(), state.ai.as_ref(), &state.config, session_id).await;
    (status, Json(body))
}

pub async fn tutor_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<tutor::TutorRequest>,
) -> impl IntoResponse {
    let (status, body) = tutor_inner(state.ai.as_ref(), req).await;
    (status, Json(body))
}

// ============================================================================
// Unit Tests — call inner functions directly
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use labs_core::error::ValidationReport;
    use labs_ingest::store::InMemorySessionStore;
    use serde_json::json;

    #[test]
    fn test_validation_maps_to_400_with_per_item_errors() {
        let mut report = ValidationReport::default();
        report.push(2, "local_db_id", "session already paired with Learning Labs");
        let (status, body) = error_response(LabsError::Validation(report));

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["index"], 2);
        assert_eq!(body["errors"][0]["field"], "local_db_id");
    }

    #[test]
    fn test_auth_errors_map_to_401_and_403() {
        let (status, _) = error_response(LabsError::Unauthenticated);
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = error_response(LabsError::Forbidden);
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_insufficient_data_maps_to_400() {
        let (status, body) =
            error_response(LabsError::InsufficientData("no telemetry".to_string()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "no telemetry");
    }

    #[test]
    fn test_upstream_unavailable_maps_to_503_generic_message() {
        let (status, body) =
            error_response(LabsError::UpstreamUnavailable("503 from deepseek".to_string()));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        // detail is logged, not leaked
        assert_eq!(body["error"], "AI engine temporarily offline");
    }

    #[test]
    fn test_internal_errors_map_to_500_generic_message() {
        let (status, body) = error_response(LabsError::Internal(anyhow::anyhow!("boom")));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal processing failure");

        let (status, _) = error_response(LabsError::Storage(sqlx::Error::PoolClosed));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_sync_inner_returns_201_with_pairing_count() {
        let store = InMemorySessionStore::new();
        let req: SyncRequest = serde_json::from_value(json!({
            "sessions": [{
                "local_db_id": 1,
                "start_time": "2026-02-17T15:00:00Z",
                "score": 10,
                "failures": [],
                "telemetry": [
                    { "force": 11.0, "timestamp": "2026-02-17T15:01:00Z" }
                ]
            }]
        }))
        .unwrap();

        let (status, body) = sync_inner(&store, Uuid::new_v4(), req).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["paired"], 1);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_sync_inner_rejects_invalid_batch_with_field_errors() {
        let store = InMemorySessionStore::new();
        let req: SyncRequest = serde_json::from_value(json!({
            "sessions": [{ "score": -1 }]
        }))
        .unwrap();

        let (status, body) = sync_inner(&store, Uuid::new_v4(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation failed");
        assert!(body["errors"].as_array().unwrap().len() >= 1);
        assert_eq!(store.session_count(), 0);
    }

    #[test]
    fn test_status_inner_always_200() {
        let (status, body) = status_inner(status::StatusQuery { temp: 300.0 });
        assert_eq!(status, StatusCode::OK);
        assert!(body["temp"].is_number());
    }
}
