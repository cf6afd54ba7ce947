//! Sync metadata repository implementation: the global singleton plus the
//! per-note sub-keyed records.

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use jottery_core::time::{fmt_ts, parse_opt_ts};
use jottery_core::{
    ApiKey, Error, NoteSyncState, Result, SyncMetadata, SyncMetadataPatch, SyncStatus, SyncStore,
};

/// SQLite implementation of [`SyncStore`].
///
/// The `ApiKey` tagged value is encoded at this boundary: NULL for absent,
/// envelope JSON for the steady state, and the `IMPORT:`-prefixed
/// plaintext for a pending credential import.
pub struct SqliteSyncStore {
    pool: SqlitePool,
}

impl SqliteSyncStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_global(row: &SqliteRow) -> Result<SyncMetadata> {
        let client_id: Option<String> = row.try_get("client_id")?;
        Ok(SyncMetadata {
            last_sync_at: parse_opt_ts(row.try_get("last_sync_at")?)?,
            last_push_at: parse_opt_ts(row.try_get("last_push_at")?)?,
            last_pull_at: parse_opt_ts(row.try_get("last_pull_at")?)?,
            api_key: ApiKey::from_stored(row.try_get("api_key")?)?,
            client_id: client_id
                .map(|s| Uuid::parse_str(&s))
                .transpose()
                .map_err(|e| Error::Serialization(e.to_string()))?,
            sync_enabled: row.try_get::<i64, _>("sync_enabled")? != 0,
            sync_endpoint: row.try_get("sync_endpoint")?,
            auto_sync_interval: row.try_get("auto_sync_interval")?,
        })
    }

    async fn write_global(&self, meta: &SyncMetadata) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO sync_metadata \
             (id, last_sync_at, last_push_at, last_pull_at, api_key, client_id, \
              sync_enabled, sync_endpoint, auto_sync_interval) \
             VALUES (1, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(meta.last_sync_at.map(fmt_ts))
        .bind(meta.last_push_at.map(fmt_ts))
        .bind(meta.last_pull_at.map(fmt_ts))
        .bind(meta.api_key.to_stored()?)
        .bind(meta.client_id.map(|id| id.to_string()))
        .bind(meta.sync_enabled as i64)
        .bind(&meta.sync_endpoint)
        .bind(meta.auto_sync_interval)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    fn row_to_note_state(row: &SqliteRow) -> Result<NoteSyncState> {
        let note_id: String = row.try_get("note_id")?;
        let status: String = row.try_get("status")?;
        Ok(NoteSyncState {
            note_id: Uuid::parse_str(&note_id).map_err(|e| Error::Serialization(e.to_string()))?,
            synced_at: parse_opt_ts(row.try_get("synced_at")?)?,
            sync_hash: row.try_get("sync_hash")?,
            server_version: row.try_get("server_version")?,
            status: status.parse::<SyncStatus>().unwrap_or(SyncStatus::Pending),
            error_message: row.try_get("error_message")?,
        })
    }
}

#[async_trait]
impl SyncStore for SqliteSyncStore {
    async fn get_global(&self) -> Result<Option<SyncMetadata>> {
        let row = sqlx::query(
            "SELECT last_sync_at, last_push_at, last_pull_at, api_key, client_id, \
                    sync_enabled, sync_endpoint, auto_sync_interval \
             FROM sync_metadata WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.as_ref().map(Self::row_to_global).transpose()
    }

    async fn patch_global(&self, patch: SyncMetadataPatch) -> Result<SyncMetadata> {
        let current = self.get_global().await?.unwrap_or_default();
        let merged = patch.apply(current);
        self.write_global(&merged).await?;
        Ok(merged)
    }

    async fn get_note_state(&self, note_id: Uuid) -> Result<Option<NoteSyncState>> {
        let row = sqlx::query(
            "SELECT note_id, synced_at, sync_hash, server_version, status, error_message \
             FROM note_sync_state WHERE note_id = ?",
        )
        .bind(note_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.as_ref().map(Self::row_to_note_state).transpose()
    }

    async fn upsert_note_state(&self, state: &NoteSyncState) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO note_sync_state \
             (note_id, synced_at, sync_hash, server_version, status, error_message) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(state.note_id.to_string())
        .bind(state.synced_at.map(fmt_ts))
        .bind(&state.sync_hash)
        .bind(state.server_version)
        .bind(state.status.to_string())
        .bind(&state.error_message)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn mark_status(
        &self,
        note_id: Uuid,
        status: SyncStatus,
        error_message: Option<String>,
    ) -> Result<()> {
        let mut state = self
            .get_note_state(note_id)
            .await?
            .unwrap_or_else(|| NoteSyncState::pending(note_id));
        state.status = status;
        state.error_message = error_message;
        self.upsert_note_state(&state).await
    }

    async fn list_pending(&self) -> Result<Vec<Uuid>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT note_id FROM note_sync_state WHERE status = 'pending'")
                .fetch_all(&self.pool)
                .await
                .map_err(Error::Database)?;
        ids.into_iter()
            .map(|s| Uuid::parse_str(&s).map_err(|e| Error::Serialization(e.to_string())))
            .collect()
    }

    async fn count_conflicts(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM note_sync_state WHERE status = 'conflict'",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(count)
    }

    async fn delete_note_state(&self, note_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM note_sync_state WHERE note_id = ?")
            .bind(note_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        sqlx::query("DELETE FROM sync_metadata WHERE id = 1")
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        sqlx::query("DELETE FROM note_sync_state")
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }
}
