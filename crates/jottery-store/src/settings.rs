//! Settings repository implementation.
//!
//! The singleton settings row stores the whole document as JSON; merging
//! a patch is read-modify-write on the deserialized value.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;

use jottery_core::{Error, Result, SettingsPatch, SettingsStore, UserSettings};

/// SQLite implementation of [`SettingsStore`].
pub struct SqliteSettingsStore {
    pool: SqlitePool,
}

impl SqliteSettingsStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn read(&self) -> Result<Option<UserSettings>> {
        let data: Option<String> = sqlx::query_scalar("SELECT data FROM settings WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        data.map(|d| serde_json::from_str(&d).map_err(Error::from))
            .transpose()
    }

    async fn write(&self, settings: &UserSettings) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO settings (id, data) VALUES (1, ?)")
            .bind(serde_json::to_string(settings)?)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn get(&self) -> Result<UserSettings> {
        Ok(self.read().await?.unwrap_or_default())
    }

    async fn update(&self, patch: SettingsPatch) -> Result<UserSettings> {
        let merged = patch.apply(self.get().await?);
        merged.validate()?;
        self.write(&merged).await?;
        Ok(merged)
    }

    async fn reset(&self) -> Result<()> {
        sqlx::query("DELETE FROM settings WHERE id = 1")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.read().await?.is_some())
    }
}
