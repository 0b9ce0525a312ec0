//! Bearer-token caller identification for the sync surface.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use labs_core::error::LabsError;
use labs_core::models::User;
use sqlx::PgPool;

/// Pull the bearer token out of the Authorization header.
/// Missing or malformed header → `Unauthenticated`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, LabsError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(LabsError::Unauthenticated)?;

    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(LabsError::Unauthenticated),
    }
}

/// Resolve the caller from their API token. Unknown token → `Forbidden`.
pub async fn authenticate(pool: &PgPool, headers: &HeaderMap) -> Result<User, LabsError> {
    let token = bearer_token(headers)?;

    let user: Option<User> = sqlx::query_as(
        "SELECT id, username, api_token, created_at FROM users WHERE api_token = $1",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    user.ok_or(LabsError::Forbidden)
}
