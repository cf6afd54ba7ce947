//! Repository traits for the local store.
//!
//! These traits define the contracts every backend must honor; the SQLite
//! implementations live in `jottery-store`. All content and tag payloads
//! cross these interfaces as opaque [`Envelope`]s; the encryption boundary
//! is the note service, not the store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::encryption::{EncryptionMetadata, Envelope};
use crate::models::note::NoteRecord;
use crate::models::settings::{SettingsPatch, UserSettings};
use crate::models::sync::{NoteSyncState, SyncMetadata, SyncMetadataPatch, SyncStatus};

/// Keyed container of note records.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Insert a record verbatim. The caller owns timestamp and version
    /// choices (`version >= 1`).
    async fn create(&self, note: &NoteRecord) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<NoteRecord>>;

    async fn get_by_ids(&self, ids: &[Uuid]) -> Result<Vec<NoteRecord>>;

    /// Every record, soft-deleted included, most recently modified first.
    async fn get_all(&self) -> Result<Vec<NoteRecord>>;

    /// Records with `deleted = false`, most recently modified first.
    async fn get_all_active(&self) -> Result<Vec<NoteRecord>>;

    async fn get_deleted(&self) -> Result<Vec<NoteRecord>>;

    /// Active records with `pinned = true`.
    async fn get_pinned(&self) -> Result<Vec<NoteRecord>>;

    /// Index-driven scan of records with `modified_at > ts`.
    async fn get_modified_after(&self, ts: DateTime<Utc>) -> Result<Vec<NoteRecord>>;

    /// Any single record, if one exists. Used by unlock verification.
    async fn first(&self) -> Result<Option<NoteRecord>>;

    /// Write updated fields, stamping `modified_at = now()` and bumping
    /// `version` by one before the write commits. Returns the stamped record.
    async fn update(&self, note: &NoteRecord) -> Result<NoteRecord>;

    /// Upsert a server-supplied record verbatim: no stamping, no version
    /// bump. Used when pull adopts a remote copy.
    async fn apply_remote(&self, note: &NoteRecord) -> Result<()>;

    /// Mark deleted, set `deleted_at = now()`, stamp and bump. Attachments
    /// are retained.
    async fn soft_delete(&self, id: Uuid) -> Result<()>;

    /// Clear the deletion flags, stamp and bump.
    async fn restore(&self, id: Uuid) -> Result<()>;

    /// Remove the row. Blob and sync-state cascade is orchestrated by the
    /// note service.
    async fn purge(&self, id: Uuid) -> Result<()>;

    /// Stamp `modified_at = now()` and bump `version` without changing
    /// any other field.
    async fn touch(&self, id: Uuid) -> Result<()>;

    /// Record a server acknowledgement without stamping.
    async fn set_synced_at(&self, id: Uuid, ts: DateTime<Utc>) -> Result<()>;

    async fn count_active(&self) -> Result<i64>;

    async fn count_deleted(&self) -> Result<i64>;
}

/// Keyed container of encrypted attachment blobs and thumbnails.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    async fn put_blob(&self, id: Uuid, blob: &Envelope) -> Result<()>;
    async fn get_blob(&self, id: Uuid) -> Result<Option<Envelope>>;
    async fn delete_blob(&self, id: Uuid) -> Result<()>;

    async fn put_thumbnail(&self, id: Uuid, blob: &Envelope) -> Result<()>;
    async fn get_thumbnail(&self, id: Uuid) -> Result<Option<Envelope>>;
    async fn delete_thumbnail(&self, id: Uuid) -> Result<()>;

    async fn count(&self) -> Result<i64>;

    /// Total stored ciphertext bytes across all blobs.
    async fn total_size(&self) -> Result<i64>;
}

/// Singleton user settings.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Current settings, or defaults when none were ever written.
    async fn get(&self) -> Result<UserSettings>;

    /// Merge a partial update and return the result.
    async fn update(&self, patch: SettingsPatch) -> Result<UserSettings>;

    async fn reset(&self) -> Result<()>;

    async fn exists(&self) -> Result<bool>;
}

/// Singleton encryption metadata.
#[async_trait]
pub trait EncryptionStore: Send + Sync {
    async fn get(&self) -> Result<Option<EncryptionMetadata>>;

    /// Write-once initialization; a second call without a wipe fails with
    /// `AlreadyInitialized`.
    async fn init(&self, meta: &EncryptionMetadata) -> Result<()>;

    /// Replace the metadata regardless of prior state. Credential-import
    /// path only; existing notes are untouched.
    async fn overwrite(&self, meta: &EncryptionMetadata) -> Result<()>;

    /// Remove the metadata. Only valid as part of a full-store wipe.
    async fn delete(&self) -> Result<()>;
}

/// Global sync metadata plus the per-note sub-keyed records.
#[async_trait]
pub trait SyncStore: Send + Sync {
    async fn get_global(&self) -> Result<Option<SyncMetadata>>;

    /// Merge a partial update onto the global record (creating it from
    /// defaults when absent) and return the result.
    async fn patch_global(&self, patch: SyncMetadataPatch) -> Result<SyncMetadata>;

    async fn get_note_state(&self, note_id: Uuid) -> Result<Option<NoteSyncState>>;

    async fn upsert_note_state(&self, state: &NoteSyncState) -> Result<()>;

    /// Set only the status and error message, creating a pending record
    /// if none exists yet.
    async fn mark_status(
        &self,
        note_id: Uuid,
        status: SyncStatus,
        error_message: Option<String>,
    ) -> Result<()>;

    async fn list_pending(&self) -> Result<Vec<Uuid>>;

    async fn count_conflicts(&self) -> Result<i64>;

    async fn delete_note_state(&self, note_id: Uuid) -> Result<()>;

    /// Drop the global record and every per-note record (re-registration).
    async fn clear_all(&self) -> Result<()>;
}
