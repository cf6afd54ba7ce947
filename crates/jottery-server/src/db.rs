//! Server database: pool creation and ordered migrations.
//!
//! One SQLite file holds every registered client's opaque rows. The server
//! never holds a key; note content, tags and blobs are stored exactly as
//! the clients sent them.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

use jottery_core::defaults::BUSY_TIMEOUT_SECS;

/// Migration 1: clients, notes, attachment tables, audit log.
const MIGRATION_0001: &str = r#"
CREATE TABLE IF NOT EXISTS clients (
    id           TEXT PRIMARY KEY,
    api_key_hash TEXT NOT NULL UNIQUE,
    device_name  TEXT NOT NULL,
    device_type  TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    last_seen_at TEXT NOT NULL,
    is_active    INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS notes (
    id                 TEXT NOT NULL,
    client_id          TEXT NOT NULL REFERENCES clients(id),
    created_at         TEXT NOT NULL,
    modified_at        TEXT NOT NULL,
    server_modified_at TEXT NOT NULL,
    content            TEXT NOT NULL,
    tags               TEXT NOT NULL,
    attachments        TEXT NOT NULL DEFAULT '[]',
    pinned             INTEGER NOT NULL DEFAULT 0,
    deleted            INTEGER NOT NULL DEFAULT 0,
    deleted_at         TEXT,
    version            INTEGER NOT NULL DEFAULT 1,
    server_version     INTEGER NOT NULL DEFAULT 1,
    word_wrap          INTEGER,
    syntax_language    TEXT,
    PRIMARY KEY (client_id, id)
);

CREATE INDEX IF NOT EXISTS idx_notes_client_server_modified
    ON notes(client_id, server_modified_at);
CREATE INDEX IF NOT EXISTS idx_notes_client_deleted
    ON notes(client_id, deleted);

CREATE TABLE IF NOT EXISTS attachments_meta (
    id           TEXT PRIMARY KEY,
    client_id    TEXT NOT NULL,
    note_id      TEXT NOT NULL,
    filename     TEXT NOT NULL,
    mime_type    TEXT NOT NULL,
    size         INTEGER NOT NULL,
    blob_id      TEXT NOT NULL,
    thumbnail_id TEXT,
    created_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_attachments_meta_note ON attachments_meta(note_id);

CREATE TABLE IF NOT EXISTS attachments_data (
    id         TEXT PRIMARY KEY,
    client_id  TEXT NOT NULL,
    data       BLOB NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sync_operations (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    client_id  TEXT NOT NULL,
    operation  TEXT NOT NULL,
    note_count INTEGER NOT NULL DEFAULT 0,
    detail     TEXT,
    created_at TEXT NOT NULL
);
"#;

const MIGRATIONS: &[&str] = &[MIGRATION_0001];

/// Schema version this build writes.
pub const SCHEMA_VERSION: i64 = MIGRATIONS.len() as i64;

/// Open the server database and bring the schema current.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;

    info!(
        subsystem = "server",
        component = "db",
        op = "init",
        database_url,
        "Server database ready"
    );
    Ok(pool)
}

/// In-memory database for tests.
pub async fn init_memory_pool() -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .in_memory(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    migrate(&pool).await?;
    Ok(pool)
}

async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let found: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await?;

    for (idx, sql) in MIGRATIONS.iter().enumerate().skip(found as usize) {
        let target = (idx + 1) as i64;
        let mut tx = pool.begin().await?;
        sqlx::raw_sql(sql).execute(&mut *tx).await?;
        sqlx::query(&format!("PRAGMA user_version = {target}"))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        info!(
            subsystem = "server",
            component = "db",
            op = "migrate",
            version = target,
            "Applied server migration"
        );
    }
    Ok(())
}
