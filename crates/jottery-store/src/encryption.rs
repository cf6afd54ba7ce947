//! Encryption metadata repository implementation.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

use jottery_core::time::{fmt_ts, parse_ts};
use jottery_core::{
    EncryptionAlgorithm, EncryptionMetadata, EncryptionStore, Error, Result,
};

/// SQLite implementation of [`EncryptionStore`].
///
/// Write-once under normal operation; `overwrite` exists solely for the
/// credential-import path and `delete` for a full-store wipe.
pub struct SqliteEncryptionStore {
    pool: SqlitePool,
}

impl SqliteEncryptionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn write(&self, meta: &EncryptionMetadata) -> Result<()> {
        meta.validate()?;
        sqlx::query(
            "INSERT OR REPLACE INTO encryption_metadata \
             (id, salt, iterations, created_at, algorithm) VALUES (1, ?, ?, ?, ?)",
        )
        .bind(&meta.salt)
        .bind(meta.iterations as i64)
        .bind(fmt_ts(meta.created_at))
        .bind(meta.algorithm.to_string())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}

#[async_trait]
impl EncryptionStore for SqliteEncryptionStore {
    async fn get(&self) -> Result<Option<EncryptionMetadata>> {
        let row = sqlx::query(
            "SELECT salt, iterations, created_at, algorithm FROM encryption_metadata WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            None => Ok(None),
            Some(row) => {
                let algorithm: String = row.try_get("algorithm")?;
                Ok(Some(EncryptionMetadata {
                    salt: row.try_get("salt")?,
                    iterations: row.try_get::<i64, _>("iterations")? as u32,
                    created_at: parse_ts(&row.try_get::<String, _>("created_at")?)?,
                    algorithm: algorithm
                        .parse::<EncryptionAlgorithm>()
                        .unwrap_or_default(),
                }))
            }
        }
    }

    async fn init(&self, meta: &EncryptionMetadata) -> Result<()> {
        if self.get().await?.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        self.write(meta).await
    }

    async fn overwrite(&self, meta: &EncryptionMetadata) -> Result<()> {
        self.write(meta).await
    }

    async fn delete(&self) -> Result<()> {
        sqlx::query("DELETE FROM encryption_metadata WHERE id = 1")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}
