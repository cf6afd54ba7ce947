//! Store schema and ordered forward migrations.
//!
//! The current schema version lives in `PRAGMA user_version`. Opening a
//! store at an older version applies the missing migrations in order;
//! opening one at a newer version fails with `SchemaTooNew` so an old
//! build never scribbles over a format it does not understand.

use sqlx::sqlite::SqlitePool;
use tracing::{debug, info};

use jottery_core::{Error, Result};

/// Migration 1: notes, attachment blobs, settings, encryption metadata.
const MIGRATION_0001: &str = r#"
CREATE TABLE IF NOT EXISTS notes (
    id              TEXT PRIMARY KEY,
    created_at      TEXT NOT NULL,
    modified_at     TEXT NOT NULL,
    synced_at       TEXT,
    content         TEXT NOT NULL,
    tags            TEXT NOT NULL,
    attachments     TEXT NOT NULL DEFAULT '[]',
    pinned          INTEGER NOT NULL DEFAULT 0,
    deleted         INTEGER NOT NULL DEFAULT 0,
    deleted_at      TEXT,
    sync_hash       TEXT,
    version         INTEGER NOT NULL DEFAULT 1,
    word_wrap       INTEGER NOT NULL DEFAULT 1,
    syntax_language TEXT NOT NULL DEFAULT 'plain'
);

CREATE INDEX IF NOT EXISTS idx_notes_modified_at ON notes(modified_at);
CREATE INDEX IF NOT EXISTS idx_notes_deleted ON notes(deleted);
CREATE INDEX IF NOT EXISTS idx_notes_pinned ON notes(pinned);
CREATE INDEX IF NOT EXISTS idx_notes_deleted_modified ON notes(deleted, modified_at);

CREATE TABLE IF NOT EXISTS attachment_blobs (
    id         TEXT PRIMARY KEY,
    data       TEXT NOT NULL,
    size       INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS thumbnail_blobs (
    id         TEXT PRIMARY KEY,
    data       TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS settings (
    id   INTEGER PRIMARY KEY CHECK (id = 1),
    data TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS encryption_metadata (
    id         INTEGER PRIMARY KEY CHECK (id = 1),
    salt       TEXT NOT NULL,
    iterations INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    algorithm  TEXT NOT NULL
);
"#;

/// Migration 2: sync repositories. Additive; must succeed on stores that
/// never initialized encryption.
const MIGRATION_0002: &str = r#"
CREATE TABLE IF NOT EXISTS sync_metadata (
    id                 INTEGER PRIMARY KEY CHECK (id = 1),
    last_sync_at       TEXT,
    last_push_at       TEXT,
    last_pull_at       TEXT,
    api_key            TEXT,
    client_id          TEXT,
    sync_enabled       INTEGER NOT NULL DEFAULT 0,
    sync_endpoint      TEXT,
    auto_sync_interval INTEGER NOT NULL DEFAULT 5
);

CREATE TABLE IF NOT EXISTS note_sync_state (
    note_id        TEXT PRIMARY KEY,
    synced_at      TEXT,
    sync_hash      TEXT,
    server_version INTEGER NOT NULL DEFAULT 0,
    status         TEXT NOT NULL,
    error_message  TEXT
);

CREATE INDEX IF NOT EXISTS idx_note_sync_status ON note_sync_state(status);
"#;

/// Ordered forward migrations; index + 1 is the schema version they produce.
const MIGRATIONS: &[&str] = &[MIGRATION_0001, MIGRATION_0002];

/// Schema version this build writes and understands.
pub const SCHEMA_VERSION: i64 = MIGRATIONS.len() as i64;

/// Read the store's current schema version.
pub async fn current_version(pool: &SqlitePool) -> Result<i64> {
    let version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
        .map_err(Error::Database)?;
    Ok(version)
}

/// Bring the store up to [`SCHEMA_VERSION`].
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    let found = current_version(pool).await?;
    if found > SCHEMA_VERSION {
        return Err(Error::SchemaTooNew {
            found,
            supported: SCHEMA_VERSION,
        });
    }
    if found == SCHEMA_VERSION {
        debug!(
            subsystem = "store",
            component = "schema",
            version = found,
            "Schema is current"
        );
        return Ok(());
    }

    for (idx, sql) in MIGRATIONS.iter().enumerate().skip(found as usize) {
        let target = (idx + 1) as i64;
        let mut tx = pool.begin().await.map_err(Error::Database)?;
        sqlx::raw_sql(sql)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        // PRAGMA does not accept bind parameters.
        sqlx::query(&format!("PRAGMA user_version = {target}"))
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        tx.commit().await.map_err(Error::Database)?;
        info!(
            subsystem = "store",
            component = "schema",
            op = "migrate",
            version = target,
            "Applied store migration"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::create_memory_pool;

    #[tokio::test]
    async fn test_migrate_fresh_store() {
        let pool = create_memory_pool().await.unwrap();
        migrate(&pool).await.unwrap();
        assert_eq!(current_version(&pool).await.unwrap(), SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let pool = create_memory_pool().await.unwrap();
        migrate(&pool).await.unwrap();
        migrate(&pool).await.unwrap();
        assert_eq!(current_version(&pool).await.unwrap(), SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_newer_store_is_rejected() {
        let pool = create_memory_pool().await.unwrap();
        sqlx::query("PRAGMA user_version = 99")
            .execute(&pool)
            .await
            .unwrap();
        let err = migrate(&pool).await.unwrap_err();
        assert!(matches!(
            err,
            Error::SchemaTooNew {
                found: 99,
                supported: SCHEMA_VERSION
            }
        ));
    }

    #[tokio::test]
    async fn test_partial_store_upgrades_forward() {
        let pool = create_memory_pool().await.unwrap();
        // Simulate a store created before the sync tables existed, with
        // encryption never initialized.
        let mut tx = pool.begin().await.unwrap();
        sqlx::raw_sql(MIGRATION_0001).execute(&mut *tx).await.unwrap();
        sqlx::query("PRAGMA user_version = 1")
            .execute(&mut *tx)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        migrate(&pool).await.unwrap();
        assert_eq!(current_version(&pool).await.unwrap(), SCHEMA_VERSION);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM note_sync_state")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
