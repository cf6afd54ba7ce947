//! Integration tests for the sync server HTTP API.
//!
//! Each test boots the real router on an ephemeral listener with its own
//! temporary database and drives it over HTTP.

use chrono::{Duration, Utc};
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use jottery_core::{
    Envelope, PullRequest, PullResponse, PushRequest, PushResponse, RegisterResponse,
    SyncStatusResponse, WireNote,
};
use jottery_server::{app, db, AppState, Config};

struct TestServer {
    base_url: String,
    pool: SqlitePool,
    _dir: tempfile::TempDir,
}

async fn spawn_server() -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let database_url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("server.db").display()
    );
    let pool = db::init_pool(&database_url).await.unwrap();
    let config = Config {
        database_url,
        port: 0,
        max_payload_size: 10 * 1024 * 1024,
    };
    let router = app(AppState { pool: pool.clone() }, &config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestServer {
        base_url: format!("http://{addr}"),
        pool,
        _dir: dir,
    }
}

async fn register(server: &TestServer) -> RegisterResponse {
    let resp = reqwest::Client::new()
        .post(format!("{}/api/v1/auth/register", server.base_url))
        .json(&serde_json::json!({"deviceName": "test rig", "deviceType": "cli"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    resp.json().await.unwrap()
}

fn wire_note(id: Uuid, modified_offset_secs: i64) -> WireNote {
    let base = Utc::now();
    WireNote {
        id,
        created_at: base - Duration::hours(1),
        modified_at: base + Duration::seconds(modified_offset_secs),
        content: Envelope::new("Y2lwaGVydGV4dA==".into(), "bm9uY2U=".into()),
        tags: Envelope::new("dGFncw==".into(), "bm9uY2Uy".into()),
        attachments: vec![],
        pinned: false,
        deleted: false,
        deleted_at: None,
        version: 1,
        word_wrap: Some(true),
        syntax_language: Some("plain".into()),
        server_version: None,
    }
}

async fn push(server: &TestServer, api_key: &str, req: &PushRequest) -> PushResponse {
    let resp = reqwest::Client::new()
        .post(format!("{}/api/v1/sync/push", server.base_url))
        .bearer_auth(api_key)
        .json(req)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    resp.json().await.unwrap()
}

async fn pull(server: &TestServer, api_key: &str, req: &PullRequest) -> PullResponse {
    let resp = reqwest::Client::new()
        .post(format!("{}/api/v1/sync/pull", server.base_url))
        .bearer_auth(api_key)
        .json(req)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn test_health_needs_no_auth() {
    let server = spawn_server().await;
    let resp = reqwest::get(format!("{}/health", server.base_url))
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_register_issues_64_hex_key_once() {
    let server = spawn_server().await;
    let reg = register(&server).await;
    assert_eq!(reg.api_key.len(), 64);
    assert!(reg.api_key.chars().all(|c| c.is_ascii_hexdigit()));

    // Only the hash is stored.
    let stored: String = sqlx::query_scalar("SELECT api_key_hash FROM clients WHERE id = ?")
        .bind(reg.client_id.to_string())
        .fetch_one(&server.pool)
        .await
        .unwrap();
    assert_ne!(stored, reg.api_key);
    assert_eq!(stored.len(), 64);
}

#[tokio::test]
async fn test_missing_bearer_is_401() {
    let server = spawn_server().await;
    let resp = reqwest::Client::new()
        .get(format!("{}/api/v1/sync/status", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn test_unknown_key_is_401() {
    let server = spawn_server().await;
    let resp = reqwest::Client::new()
        .get(format!("{}/api/v1/sync/status", server.base_url))
        .bearer_auth("0".repeat(64))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn test_inactive_client_is_403() {
    let server = spawn_server().await;
    let reg = register(&server).await;
    sqlx::query("UPDATE clients SET is_active = 0 WHERE id = ?")
        .bind(reg.client_id.to_string())
        .execute(&server.pool)
        .await
        .unwrap();

    let resp = reqwest::Client::new()
        .get(format!("{}/api/v1/sync/status", server.base_url))
        .bearer_auth(&reg.api_key)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn test_status_reports_note_count() {
    let server = spawn_server().await;
    let reg = register(&server).await;

    let note = wire_note(Uuid::new_v4(), 0);
    push(
        &server,
        &reg.api_key,
        &PushRequest {
            notes: vec![note],
            attachments: vec![],
        },
    )
    .await;

    let resp = reqwest::Client::new()
        .get(format!("{}/api/v1/sync/status", server.base_url))
        .bearer_auth(&reg.api_key)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let status: SyncStatusResponse = resp.json().await.unwrap();
    assert_eq!(status.note_count, 1);
    assert_eq!(status.client_id, reg.client_id);
}

#[tokio::test]
async fn test_push_inserts_with_server_version_1() {
    let server = spawn_server().await;
    let reg = register(&server).await;
    let note = wire_note(Uuid::new_v4(), 0);

    let resp = push(
        &server,
        &reg.api_key,
        &PushRequest {
            notes: vec![note.clone()],
            attachments: vec![],
        },
    )
    .await;
    assert_eq!(resp.accepted.len(), 1);
    assert!(resp.rejected.is_empty());
    assert_eq!(resp.accepted[0].id, note.id);
    assert_eq!(resp.accepted[0].server_version, 1);
}

#[tokio::test]
async fn test_push_is_idempotent() {
    let server = spawn_server().await;
    let reg = register(&server).await;
    let note = wire_note(Uuid::new_v4(), 0);
    let body = PushRequest {
        notes: vec![note.clone()],
        attachments: vec![],
    };

    let first = push(&server, &reg.api_key, &body).await;
    let second = push(&server, &reg.api_key, &body).await;

    // Identical payloads produce the same response shape and final state.
    assert_eq!(first.accepted.len(), 1);
    assert_eq!(second.accepted.len(), 1);
    assert_eq!(second.accepted[0].server_version, 1);

    let version: i64 =
        sqlx::query_scalar("SELECT server_version FROM notes WHERE id = ?")
            .bind(note.id.to_string())
            .fetch_one(&server.pool)
            .await
            .unwrap();
    assert_eq!(version, 1);
}

#[tokio::test]
async fn test_push_newer_edit_bumps_server_version() {
    let server = spawn_server().await;
    let reg = register(&server).await;
    let id = Uuid::new_v4();

    push(
        &server,
        &reg.api_key,
        &PushRequest {
            notes: vec![wire_note(id, -5)],
            attachments: vec![],
        },
    )
    .await;

    // An edit stamped after the server's write is accepted.
    let resp = push(
        &server,
        &reg.api_key,
        &PushRequest {
            notes: vec![wire_note(id, 5)],
            attachments: vec![],
        },
    )
    .await;
    assert_eq!(resp.accepted.len(), 1);
    assert_eq!(resp.accepted[0].server_version, 2);
}

#[tokio::test]
async fn test_push_stale_edit_is_rejected() {
    let server = spawn_server().await;
    let reg = register(&server).await;
    let id = Uuid::new_v4();

    push(
        &server,
        &reg.api_key,
        &PushRequest {
            notes: vec![wire_note(id, 0)],
            attachments: vec![],
        },
    )
    .await;

    // A different edit whose modifiedAt predates the server's write loses.
    let resp = push(
        &server,
        &reg.api_key,
        &PushRequest {
            notes: vec![wire_note(id, -3600)],
            attachments: vec![],
        },
    )
    .await;
    assert!(resp.accepted.is_empty());
    assert_eq!(resp.rejected.len(), 1);
    assert_eq!(resp.rejected[0].reason, "Server version is newer");
}

#[tokio::test]
async fn test_pull_returns_notes_and_is_monotone() {
    let server = spawn_server().await;
    let reg = register(&server).await;
    let note = wire_note(Uuid::new_v4(), 0);
    push(
        &server,
        &reg.api_key,
        &PushRequest {
            notes: vec![note.clone()],
            attachments: vec![],
        },
    )
    .await;

    let first = pull(
        &server,
        &reg.api_key,
        &PullRequest {
            last_sync_at: None,
            known_note_ids: vec![],
        },
    )
    .await;
    assert_eq!(first.notes.len(), 1);
    assert_eq!(first.notes[0].id, note.id);
    assert_eq!(first.notes[0].server_version, Some(1));

    // No intervening writes: a pull from the first syncedAt is empty.
    let second = pull(
        &server,
        &reg.api_key,
        &PullRequest {
            last_sync_at: Some(first.synced_at),
            known_note_ids: vec![note.id],
        },
    )
    .await;
    assert!(second.notes.is_empty());
    assert!(second.deletions.is_empty());
}

#[tokio::test]
async fn test_pull_conveys_soft_deletes_as_deletions() {
    let server = spawn_server().await;
    let reg = register(&server).await;
    let id = Uuid::new_v4();
    push(
        &server,
        &reg.api_key,
        &PushRequest {
            notes: vec![wire_note(id, 0)],
            attachments: vec![],
        },
    )
    .await;

    let baseline = pull(
        &server,
        &reg.api_key,
        &PullRequest {
            last_sync_at: None,
            known_note_ids: vec![],
        },
    )
    .await;

    let mut tombstone = wire_note(id, 10);
    tombstone.deleted = true;
    tombstone.deleted_at = Some(Utc::now());
    push(
        &server,
        &reg.api_key,
        &PushRequest {
            notes: vec![tombstone],
            attachments: vec![],
        },
    )
    .await;

    let after = pull(
        &server,
        &reg.api_key,
        &PullRequest {
            last_sync_at: Some(baseline.synced_at),
            known_note_ids: vec![id],
        },
    )
    .await;
    assert!(after.notes.is_empty());
    assert_eq!(after.deletions.len(), 1);
    assert_eq!(after.deletions[0].id, id);
}

#[tokio::test]
async fn test_clients_are_isolated() {
    let server = spawn_server().await;
    let reg_a = register(&server).await;
    let reg_b = register(&server).await;

    push(
        &server,
        &reg_a.api_key,
        &PushRequest {
            notes: vec![wire_note(Uuid::new_v4(), 0)],
            attachments: vec![],
        },
    )
    .await;

    let other = pull(
        &server,
        &reg_b.api_key,
        &PullRequest {
            last_sync_at: None,
            known_note_ids: vec![],
        },
    )
    .await;
    assert!(other.notes.is_empty());
}

#[tokio::test]
async fn test_delete_note_hard_deletes_with_204() {
    let server = spawn_server().await;
    let reg = register(&server).await;
    let id = Uuid::new_v4();
    push(
        &server,
        &reg.api_key,
        &PushRequest {
            notes: vec![wire_note(id, 0)],
            attachments: vec![],
        },
    )
    .await;

    let resp = reqwest::Client::new()
        .delete(format!("{}/api/v1/sync/notes/{id}", server.base_url))
        .bearer_auth(&reg.api_key)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 204);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notes WHERE id = ?")
        .bind(id.to_string())
        .fetch_one(&server.pool)
        .await
        .unwrap();
    assert_eq!(count, 0);

    // Repeat deletes stay 204.
    let resp = reqwest::Client::new()
        .delete(format!("{}/api/v1/sync/notes/{id}", server.base_url))
        .bearer_auth(&reg.api_key)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 204);
}

#[tokio::test]
async fn test_push_records_audit_rows() {
    let server = spawn_server().await;
    let reg = register(&server).await;
    push(
        &server,
        &reg.api_key,
        &PushRequest {
            notes: vec![wire_note(Uuid::new_v4(), 0)],
            attachments: vec![],
        },
    )
    .await;

    let ops: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sync_operations WHERE client_id = ? AND operation = 'push'",
    )
    .bind(reg.client_id.to_string())
    .fetch_one(&server.pool)
    .await
    .unwrap();
    assert_eq!(ops, 1);
}
