//! Attachment blob repository implementation.
//!
//! Blobs arrive already encrypted; this store holds envelopes keyed by
//! attachment id, with a parallel family for thumbnails. Overwrites are
//! safe: blobs are content-addressed by id and integrity is enforced by
//! AES-GCM on read.

use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use jottery_core::time::fmt_ts;
use jottery_core::{AttachmentStore, Envelope, Error, Result};

/// SQLite implementation of [`AttachmentStore`].
pub struct SqliteAttachmentStore {
    pool: SqlitePool,
}

impl SqliteAttachmentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Decoded ciphertext length, recorded for storage accounting.
    fn envelope_size(envelope: &Envelope) -> i64 {
        base64::engine::general_purpose::STANDARD
            .decode(&envelope.ciphertext)
            .map(|b| b.len() as i64)
            .unwrap_or(0)
    }

    async fn put(&self, table: &str, id: Uuid, blob: &Envelope, with_size: bool) -> Result<()> {
        let sql = if with_size {
            format!(
                "INSERT OR REPLACE INTO {table} (id, data, size, created_at) VALUES (?, ?, ?, ?)"
            )
        } else {
            format!("INSERT OR REPLACE INTO {table} (id, data, created_at) VALUES (?, ?, ?)")
        };
        let mut query = sqlx::query(&sql).bind(id.to_string()).bind(blob.to_json()?);
        if with_size {
            query = query.bind(Self::envelope_size(blob));
        }
        query
            .bind(fmt_ts(Utc::now()))
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn get(&self, table: &str, id: Uuid) -> Result<Option<Envelope>> {
        let data: Option<String> =
            sqlx::query_scalar(&format!("SELECT data FROM {table} WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?;
        data.map(|d| Envelope::from_json(&d)).transpose()
    }

    async fn delete(&self, table: &str, id: Uuid) -> Result<()> {
        sqlx::query(&format!("DELETE FROM {table} WHERE id = ?"))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}

#[async_trait]
impl AttachmentStore for SqliteAttachmentStore {
    async fn put_blob(&self, id: Uuid, blob: &Envelope) -> Result<()> {
        self.put("attachment_blobs", id, blob, true).await
    }

    async fn get_blob(&self, id: Uuid) -> Result<Option<Envelope>> {
        self.get("attachment_blobs", id).await
    }

    async fn delete_blob(&self, id: Uuid) -> Result<()> {
        self.delete("attachment_blobs", id).await
    }

    async fn put_thumbnail(&self, id: Uuid, blob: &Envelope) -> Result<()> {
        self.put("thumbnail_blobs", id, blob, false).await
    }

    async fn get_thumbnail(&self, id: Uuid) -> Result<Option<Envelope>> {
        self.get("thumbnail_blobs", id).await
    }

    async fn delete_thumbnail(&self, id: Uuid) -> Result<()> {
        self.delete("thumbnail_blobs", id).await
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attachment_blobs")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(count)
    }

    async fn total_size(&self) -> Result<i64> {
        let size: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(size), 0) FROM attachment_blobs")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(size)
    }
}
