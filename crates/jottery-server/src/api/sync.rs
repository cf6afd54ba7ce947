//! Sync endpoints: status, push, pull, delete.
//!
//! The server stores exactly what clients send (envelope JSON for content
//! and tags, opaque bytes for blobs) and arbitrates ordering with a
//! per-note `server_version` counter and a `server_modified_at` stamp it
//! sets on every accepted write.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use base64::Engine;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

use jottery_core::time::{fmt_ts, parse_opt_ts, parse_ts};
use jottery_core::{
    AttachmentRef, Envelope, PullRequest, PullResponse, PushAccepted, PushRejected, PushRequest,
    PushResponse, SyncBlob, SyncDeletion, SyncStatusResponse, WireNote,
};

use crate::api::{record_operation, AuthedClient};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Reason returned when a push loses to the stored copy.
const REJECT_STALE: &str = "Server version is newer";

const NOTE_COLUMNS: &str = "id, created_at, modified_at, server_modified_at, content, tags, \
     attachments, pinned, deleted, deleted_at, version, server_version, word_wrap, \
     syntax_language";

fn row_to_wire(row: &SqliteRow) -> Result<WireNote, ApiError> {
    let id: String = row.try_get("id")?;
    let content: String = row.try_get("content")?;
    let tags: String = row.try_get("tags")?;
    let attachments: String = row.try_get("attachments")?;
    let word_wrap: Option<i64> = row.try_get("word_wrap")?;

    let parse = |s: &str| parse_ts(s).map_err(|e| ApiError::Internal(e.to_string()));

    Ok(WireNote {
        id: Uuid::parse_str(&id).map_err(|e| ApiError::Internal(e.to_string()))?,
        created_at: parse(&row.try_get::<String, _>("created_at")?)?,
        modified_at: parse(&row.try_get::<String, _>("modified_at")?)?,
        content: Envelope::from_json(&content).map_err(|e| ApiError::Internal(e.to_string()))?,
        tags: Envelope::from_json(&tags).map_err(|e| ApiError::Internal(e.to_string()))?,
        attachments: serde_json::from_str::<Vec<AttachmentRef>>(&attachments)?,
        pinned: row.try_get::<i64, _>("pinned")? != 0,
        deleted: row.try_get::<i64, _>("deleted")? != 0,
        deleted_at: parse_opt_ts(row.try_get("deleted_at")?)
            .map_err(|e| ApiError::Internal(e.to_string()))?,
        version: row.try_get("version")?,
        word_wrap: word_wrap.map(|w| w != 0),
        syntax_language: row.try_get("syntax_language")?,
        server_version: Some(row.try_get("server_version")?),
    })
}

/// `GET /api/v1/sync/status`
pub async fn get_status(
    State(state): State<AppState>,
    AuthedClient(client_id): AuthedClient,
) -> ApiResult<Json<SyncStatusResponse>> {
    let note_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notes WHERE client_id = ?")
        .bind(client_id.to_string())
        .fetch_one(&state.pool)
        .await?;

    let last_modified: Option<String> =
        sqlx::query_scalar("SELECT MAX(server_modified_at) FROM notes WHERE client_id = ?")
            .bind(client_id.to_string())
            .fetch_one(&state.pool)
            .await?;
    let server_last_modified = match last_modified {
        Some(ts) => parse_ts(&ts).map_err(|e| ApiError::Internal(e.to_string()))?,
        None => Utc::now(),
    };

    Ok(Json(SyncStatusResponse {
        client_id,
        server_last_modified,
        note_count,
        last_synced_at: None,
    }))
}

/// Outcome of one note inside a push body.
enum PushDecision {
    Accepted { server_version: i64 },
    Rejected { server_modified_at: DateTime<Utc> },
}

/// Decide and apply one pushed note inside its own transaction, so the
/// version counter increments under the same write lock that stores the
/// fields. Concurrent pushes for the same `(client_id, id)` serialize
/// here; the loser sees the winner's row.
async fn apply_push_note(
    state: &AppState,
    client_id: Uuid,
    note: &WireNote,
    now: DateTime<Utc>,
) -> Result<PushDecision, ApiError> {
    let mut tx = state.pool.begin().await?;

    let existing: Option<(String, String, i64)> = sqlx::query_as(
        "SELECT modified_at, server_modified_at, server_version FROM notes \
         WHERE client_id = ? AND id = ?",
    )
    .bind(client_id.to_string())
    .bind(note.id.to_string())
    .fetch_optional(&mut *tx)
    .await?;

    let decision = match existing {
        None => {
            insert_or_replace_note(&mut tx, client_id, note, now, 1).await?;
            PushDecision::Accepted { server_version: 1 }
        }
        Some((modified_at, server_modified_at, server_version)) => {
            let stored_modified =
                parse_ts(&modified_at).map_err(|e| ApiError::Internal(e.to_string()))?;
            let stored_server_modified =
                parse_ts(&server_modified_at).map_err(|e| ApiError::Internal(e.to_string()))?;

            if note.modified_at == stored_modified {
                // Identical replay; idempotent no-op.
                PushDecision::Accepted { server_version }
            } else if note.modified_at > stored_server_modified {
                let next = server_version + 1;
                insert_or_replace_note(&mut tx, client_id, note, now, next).await?;
                PushDecision::Accepted {
                    server_version: next,
                }
            } else {
                PushDecision::Rejected {
                    server_modified_at: stored_server_modified,
                }
            }
        }
    };

    tx.commit().await?;
    Ok(decision)
}

async fn insert_or_replace_note(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    client_id: Uuid,
    note: &WireNote,
    now: DateTime<Utc>,
    server_version: i64,
) -> Result<(), ApiError> {
    sqlx::query(&format!(
        "INSERT OR REPLACE INTO notes (client_id, {NOTE_COLUMNS}) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(client_id.to_string())
    .bind(note.id.to_string())
    .bind(fmt_ts(note.created_at))
    .bind(fmt_ts(note.modified_at))
    .bind(fmt_ts(now))
    .bind(note.content.to_json().map_err(|e| ApiError::Internal(e.to_string()))?)
    .bind(note.tags.to_json().map_err(|e| ApiError::Internal(e.to_string()))?)
    .bind(serde_json::to_string(&note.attachments)?)
    .bind(note.pinned as i64)
    .bind(note.deleted as i64)
    .bind(note.deleted_at.map(fmt_ts))
    .bind(note.version)
    .bind(server_version)
    .bind(note.word_wrap.map(|w| w as i64))
    .bind(&note.syntax_language)
    .execute(&mut **tx)
    .await?;

    // Attachment metadata rides along with the note it belongs to.
    for reference in &note.attachments {
        sqlx::query(
            "INSERT OR REPLACE INTO attachments_meta \
             (id, client_id, note_id, filename, mime_type, size, blob_id, thumbnail_id, \
              created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(reference.id.to_string())
        .bind(client_id.to_string())
        .bind(note.id.to_string())
        .bind(
            reference
                .filename
                .to_json()
                .map_err(|e| ApiError::Internal(e.to_string()))?,
        )
        .bind(&reference.mime_type)
        .bind(reference.size)
        .bind(reference.blob_id.to_string())
        .bind(reference.thumbnail_id.map(|id| id.to_string()))
        .bind(fmt_ts(now))
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// `POST /api/v1/sync/push`
pub async fn push(
    State(state): State<AppState>,
    AuthedClient(client_id): AuthedClient,
    Json(req): Json<PushRequest>,
) -> ApiResult<Json<PushResponse>> {
    info!(
        subsystem = "server",
        component = "push",
        client_id = %client_id,
        note_count = req.notes.len(),
        blob_count = req.attachments.len(),
        "Push received"
    );

    let now = Utc::now();
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    let errors = Vec::new();

    for note in &req.notes {
        match apply_push_note(&state, client_id, note, now).await? {
            PushDecision::Accepted { server_version } => {
                accepted.push(PushAccepted {
                    id: note.id,
                    server_version,
                    synced_at: now,
                });
                debug!(
                    subsystem = "server",
                    component = "push",
                    note_id = %note.id,
                    server_version,
                    "Note accepted"
                );
            }
            PushDecision::Rejected { server_modified_at } => {
                rejected.push(PushRejected {
                    id: note.id,
                    reason: REJECT_STALE.to_string(),
                    server_modified_at,
                });
                debug!(
                    subsystem = "server",
                    component = "push",
                    note_id = %note.id,
                    "Note rejected as stale"
                );
            }
        }
    }

    // Blob writes sit outside the note transactions: they are idempotent
    // by id and never rejected.
    for blob in &req.attachments {
        let data = base64::engine::general_purpose::STANDARD
            .decode(&blob.data)
            .map_err(|e| ApiError::BadRequest(format!("Invalid base64 attachment: {e}")))?;
        sqlx::query(
            "INSERT OR REPLACE INTO attachments_data (id, client_id, data, created_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(blob.id.to_string())
        .bind(client_id.to_string())
        .bind(data)
        .bind(fmt_ts(now))
        .execute(&state.pool)
        .await?;
    }

    record_operation(&state, client_id, "push", req.notes.len(), None).await;

    Ok(Json(PushResponse {
        accepted,
        rejected,
        errors,
    }))
}

/// `POST /api/v1/sync/pull`
pub async fn pull(
    State(state): State<AppState>,
    AuthedClient(client_id): AuthedClient,
    Json(req): Json<PullRequest>,
) -> ApiResult<Json<PullResponse>> {
    debug!(
        subsystem = "server",
        component = "pull",
        client_id = %client_id,
        known = req.known_note_ids.len(),
        "Pull received"
    );

    let since = req.last_sync_at.map(fmt_ts);

    let rows = match &since {
        Some(ts) => {
            sqlx::query(&format!(
                "SELECT {NOTE_COLUMNS} FROM notes \
                 WHERE client_id = ? AND deleted = 0 AND server_modified_at > ? \
                 ORDER BY server_modified_at"
            ))
            .bind(client_id.to_string())
            .bind(ts)
            .fetch_all(&state.pool)
            .await?
        }
        None => {
            sqlx::query(&format!(
                "SELECT {NOTE_COLUMNS} FROM notes \
                 WHERE client_id = ? AND deleted = 0 ORDER BY server_modified_at"
            ))
            .bind(client_id.to_string())
            .fetch_all(&state.pool)
            .await?
        }
    };
    let notes = rows
        .iter()
        .map(row_to_wire)
        .collect::<Result<Vec<_>, _>>()?;

    let deletion_rows = match &since {
        Some(ts) => {
            sqlx::query(
                "SELECT id, deleted_at, server_modified_at FROM notes \
                 WHERE client_id = ? AND deleted = 1 AND server_modified_at > ?",
            )
            .bind(client_id.to_string())
            .bind(ts)
            .fetch_all(&state.pool)
            .await?
        }
        None => {
            sqlx::query(
                "SELECT id, deleted_at, server_modified_at FROM notes \
                 WHERE client_id = ? AND deleted = 1",
            )
            .bind(client_id.to_string())
            .fetch_all(&state.pool)
            .await?
        }
    };
    let mut deletions = Vec::new();
    for row in &deletion_rows {
        let id: String = row.try_get("id")?;
        let deleted_at: Option<String> = row.try_get("deleted_at")?;
        let fallback: String = row.try_get("server_modified_at")?;
        deletions.push(SyncDeletion {
            id: Uuid::parse_str(&id).map_err(|e| ApiError::Internal(e.to_string()))?,
            deleted_at: parse_ts(deleted_at.as_deref().unwrap_or(fallback.as_str()))
                .map_err(|e| ApiError::Internal(e.to_string()))?,
        });
    }

    // Blobs only for notes the client does not already hold; known notes
    // are assumed to have fetched their blobs when they first arrived.
    let mut attachments = Vec::new();
    for note in notes.iter().filter(|n| !req.known_note_ids.contains(&n.id)) {
        for reference in &note.attachments {
            for blob_id in std::iter::once(reference.blob_id).chain(reference.thumbnail_id) {
                let data: Option<Vec<u8>> = sqlx::query_scalar(
                    "SELECT data FROM attachments_data WHERE id = ? AND client_id = ?",
                )
                .bind(blob_id.to_string())
                .bind(client_id.to_string())
                .fetch_optional(&state.pool)
                .await?;
                if let Some(data) = data {
                    attachments.push(SyncBlob {
                        id: blob_id,
                        data: base64::engine::general_purpose::STANDARD.encode(data),
                    });
                }
            }
        }
    }

    record_operation(&state, client_id, "pull", notes.len(), None).await;

    info!(
        subsystem = "server",
        component = "pull",
        client_id = %client_id,
        note_count = notes.len(),
        blob_count = attachments.len(),
        "Pull response ready"
    );

    Ok(Json(PullResponse {
        notes,
        deletions,
        attachments,
        synced_at: Utc::now(),
    }))
}

/// `DELETE /api/v1/sync/notes/:id`
///
/// Hard delete with attachment cascade. Admin-style escape hatch; the
/// supported deletion path is a pushed soft-delete, which pulls convey as
/// tombstones. No tombstone exists for a row removed here.
pub async fn delete_note(
    State(state): State<AppState>,
    AuthedClient(client_id): AuthedClient,
    Path(note_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let attachments: Option<String> =
        sqlx::query_scalar("SELECT attachments FROM notes WHERE client_id = ? AND id = ?")
            .bind(client_id.to_string())
            .bind(note_id.to_string())
            .fetch_optional(&state.pool)
            .await?;

    if let Some(attachments) = attachments {
        let references: Vec<AttachmentRef> = serde_json::from_str(&attachments)?;
        for reference in &references {
            for blob_id in std::iter::once(reference.blob_id).chain(reference.thumbnail_id) {
                sqlx::query("DELETE FROM attachments_data WHERE id = ? AND client_id = ?")
                    .bind(blob_id.to_string())
                    .bind(client_id.to_string())
                    .execute(&state.pool)
                    .await?;
            }
        }
        sqlx::query("DELETE FROM attachments_meta WHERE note_id = ? AND client_id = ?")
            .bind(note_id.to_string())
            .bind(client_id.to_string())
            .execute(&state.pool)
            .await?;
        sqlx::query("DELETE FROM notes WHERE client_id = ? AND id = ?")
            .bind(client_id.to_string())
            .bind(note_id.to_string())
            .execute(&state.pool)
            .await?;

        info!(
            subsystem = "server",
            component = "sync",
            op = "delete_note",
            client_id = %client_id,
            note_id = %note_id,
            "Note hard-deleted"
        );
    }

    record_operation(&state, client_id, "delete", 1, Some(note_id.to_string())).await;
    Ok(StatusCode::NO_CONTENT)
}
