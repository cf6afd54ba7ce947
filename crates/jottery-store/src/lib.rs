//! # jottery-store
//!
//! SQLite-backed local store for Jottery. Exposes five typed repositories
//! over one connection pool:
//!
//! - [`SqliteNoteStore`]: note records (envelope payloads)
//! - [`SqliteAttachmentStore`]: encrypted attachment blobs and thumbnails
//! - [`SqliteSettingsStore`]: singleton user settings
//! - [`SqliteEncryptionStore`]: singleton key-derivation metadata
//! - [`SqliteSyncStore`]: global sync metadata and per-note sync state
//!
//! The store never sees a key: content, tags, filenames and blobs arrive
//! as opaque envelopes. Schema evolution runs ordered forward migrations
//! keyed off `PRAGMA user_version`; opening a store written by a newer
//! build is a hard error.

pub mod attachments;
pub mod encryption;
pub mod notes;
pub mod pool;
pub mod schema;
pub mod settings;
pub mod sync;

use std::path::Path;

use sqlx::sqlite::SqlitePool;
use tracing::info;

pub use jottery_core::{Error, Result};

pub use attachments::SqliteAttachmentStore;
pub use encryption::SqliteEncryptionStore;
pub use notes::SqliteNoteStore;
pub use pool::{create_memory_pool, create_pool, PoolConfig};
pub use schema::SCHEMA_VERSION;
pub use settings::SqliteSettingsStore;
pub use sync::SqliteSyncStore;

// Re-export core types so store consumers need one import.
pub use jottery_core::*;

/// Combined local store with all repositories.
pub struct Store {
    pool: SqlitePool,
    /// Note records.
    pub notes: SqliteNoteStore,
    /// Encrypted attachment blobs and thumbnails.
    pub attachments: SqliteAttachmentStore,
    /// Singleton user settings.
    pub settings: SqliteSettingsStore,
    /// Singleton encryption metadata.
    pub encryption: SqliteEncryptionStore,
    /// Global and per-note sync metadata.
    pub sync: SqliteSyncStore,
}

impl Store {
    fn from_pool(pool: SqlitePool) -> Self {
        Self {
            notes: SqliteNoteStore::new(pool.clone()),
            attachments: SqliteAttachmentStore::new(pool.clone()),
            settings: SqliteSettingsStore::new(pool.clone()),
            encryption: SqliteEncryptionStore::new(pool.clone()),
            sync: SqliteSyncStore::new(pool.clone()),
            pool,
        }
    }

    /// Open (or create) a file-backed store and bring its schema current.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = create_pool(path, PoolConfig::default()).await?;
        schema::migrate(&pool).await?;
        Ok(Self::from_pool(pool))
    }

    /// Open an in-memory store (tests).
    pub async fn in_memory() -> Result<Self> {
        let pool = create_memory_pool().await?;
        schema::migrate(&pool).await?;
        Ok(Self::from_pool(pool))
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Remove every row from every repository in one transaction.
    ///
    /// After a successful wipe no subsequent read reveals pre-wipe bytes;
    /// the caller is responsible for wiping the key manager as well.
    pub async fn wipe(&self) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        for table in [
            "notes",
            "attachment_blobs",
            "thumbnail_blobs",
            "settings",
            "encryption_metadata",
            "sync_metadata",
            "note_sync_state",
        ] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
        }
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "store",
            component = "store",
            op = "wipe",
            "Store wiped"
        );
        Ok(())
    }

    /// Reclaim space after purges.
    pub async fn vacuum(&self) -> Result<()> {
        sqlx::query("VACUUM")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}
