use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use sqlx::{Row, SqlitePool};

use crate::db::hash_token;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// The authenticated user acting on a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: i64,
    pub username: String,
    pub is_staff: bool,
}

/// Returns the token of an `Authorization: Bearer <token>` header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Looks up the user whose stored token hash matches `token`.
pub async fn resolve_principal(db: &SqlitePool, token: &str) -> AppResult<Option<Principal>> {
    let row = sqlx::query("SELECT id, username, is_staff FROM users WHERE token_hash = ?1")
        .bind(hash_token(token))
        .fetch_optional(db)
        .await?;
    match row {
        Some(r) => Ok(Some(Principal {
            id: r.try_get("id")?,
            username: r.try_get("username")?,
            is_staff: r.try_get("is_staff")?,
        })),
        None => Ok(None),
    }
}

/// Requires a valid bearer token; rejects with 401 otherwise.
impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("Authentication credentials were not provided.".into()))?;
        resolve_principal(&state.db, token)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid token.".into()))
    }
}
