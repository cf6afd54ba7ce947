//! HTTP handlers and the bearer-auth middleware.

pub mod auth;
pub mod sync;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use jottery_core::time::fmt_ts;

use crate::error::ApiError;
use crate::AppState;

/// The authenticated client, injected into request extensions by
/// [`auth_middleware`].
#[derive(Debug, Clone, Copy)]
pub struct AuthedClient(pub Uuid);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for AuthedClient
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthedClient>()
            .copied()
            .ok_or(ApiError::Unauthorized)
    }
}

/// SHA-256 hex digest of a presented API key; only this form is ever
/// stored or compared.
pub fn hash_api_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Bearer authentication for every sync endpoint.
///
/// Hash the presented key, look it up; a hit refreshes `last_seen_at`,
/// a miss is 401, an inactive client is 403.
pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;
    let api_key = header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthorized)?;

    let hashed = hash_api_key(api_key);
    let row: Option<(String, i64)> =
        sqlx::query_as("SELECT id, is_active FROM clients WHERE api_key_hash = ?")
            .bind(&hashed)
            .fetch_optional(&state.pool)
            .await?;

    let (client_id, is_active) = row.ok_or(ApiError::Unauthorized)?;
    if is_active == 0 {
        return Err(ApiError::Forbidden);
    }
    let client_id = Uuid::parse_str(&client_id)
        .map_err(|e| ApiError::Internal(format!("Corrupt client id: {e}")))?;

    sqlx::query("UPDATE clients SET last_seen_at = ? WHERE id = ?")
        .bind(fmt_ts(Utc::now()))
        .bind(client_id.to_string())
        .execute(&state.pool)
        .await?;

    request.extensions_mut().insert(AuthedClient(client_id));
    Ok(next.run(request).await)
}

/// Append a row to the diagnostic audit log. Best effort by design.
pub async fn record_operation(
    state: &AppState,
    client_id: Uuid,
    operation: &str,
    note_count: usize,
    detail: Option<String>,
) {
    let result = sqlx::query(
        "INSERT INTO sync_operations (client_id, operation, note_count, detail, created_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(client_id.to_string())
    .bind(operation)
    .bind(note_count as i64)
    .bind(detail)
    .bind(fmt_ts(Utc::now()))
    .execute(&state.pool)
    .await;

    if let Err(e) = result {
        tracing::warn!(
            subsystem = "server",
            component = "audit",
            error = %e,
            "Audit log write failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_api_key_is_hex_sha256() {
        let hash = hash_api_key("abc");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
