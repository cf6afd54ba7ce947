//! Client registration.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use rand::RngCore;
use tracing::info;
use uuid::Uuid;

use jottery_core::time::fmt_ts;
use jottery_core::{RegisterRequest, RegisterResponse};

use crate::api::hash_api_key;
use crate::error::ApiResult;
use crate::AppState;

/// `POST /api/v1/auth/register`
///
/// Issues a cryptographically random 32-byte API key (64 hex chars).
/// Only the SHA-256 hash is stored; the plaintext key is returned exactly
/// once and is unrecoverable afterwards.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let client_id = Uuid::new_v4();
    let api_key = generate_api_key();
    let hashed = hash_api_key(&api_key);
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO clients (id, api_key_hash, device_name, device_type, created_at, \
         last_seen_at, is_active) VALUES (?, ?, ?, ?, ?, ?, 1)",
    )
    .bind(client_id.to_string())
    .bind(&hashed)
    .bind(&req.device_name)
    .bind(req.device_type.to_string())
    .bind(fmt_ts(now))
    .bind(fmt_ts(now))
    .execute(&state.pool)
    .await?;

    info!(
        subsystem = "server",
        component = "auth",
        op = "register",
        client_id = %client_id,
        device_type = %req.device_type,
        "Registered new client"
    );

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            api_key,
            client_id,
            created_at: now,
        }),
    ))
}

fn generate_api_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_key_shape() {
        let key = generate_api_key();
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, generate_api_key());
    }
}
