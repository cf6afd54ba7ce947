//! The note service: encrypt-on-write, decrypt-on-read orchestration over
//! the local store.
//!
//! Every operation that accepts or returns content, tags or attachment
//! bytes crosses the encryption boundary here; the store below only ever
//! sees envelopes. Every mutation routes through the notes repository so
//! version/modifiedAt stamping happens exactly once, and marks the note
//! `Pending` for the sync engine.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use jottery_core::{
    AttachmentRef, DecryptedNote, Error, NoteRecord, Result, SortOrder, SyncStatus,
    SyntaxLanguage,
};
use jottery_crypto::{cipher, DerivedKey, KeyManager};
use jottery_store::{AttachmentStore, NoteStore, SettingsStore, Store, SyncStore};

use crate::tags::normalize_tags;

/// Inputs for creating a note. Timestamps are honored only by the import
/// path; everything else gets `now()`.
#[derive(Debug, Clone, Default)]
pub struct CreateNote {
    pub content: String,
    pub tags: Vec<String>,
    pub pinned: bool,
    pub word_wrap: Option<bool>,
    pub syntax_language: Option<SyntaxLanguage>,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

/// Partial update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateNote {
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub attachments: Option<Vec<AttachmentRef>>,
    pub pinned: Option<bool>,
    pub word_wrap: Option<bool>,
    pub syntax_language: Option<SyntaxLanguage>,
}

/// Encrypt-on-write / decrypt-on-read note operations.
pub struct NoteService {
    store: Arc<Store>,
    keys: KeyManager,
    /// Decrypted-note cache; cleared whenever the key is locked away.
    cache: Mutex<HashMap<Uuid, DecryptedNote>>,
}

impl NoteService {
    pub fn new(store: Arc<Store>, keys: KeyManager) -> Self {
        Self {
            store,
            keys,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Drop all decrypted plaintext. Called on lock.
    pub fn clear_cache(&self) {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Number of decrypted notes currently cached. Probe for lock tests.
    pub fn cached_len(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn cache_put(&self, note: DecryptedNote) -> DecryptedNote {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.insert(note.id, note.clone());
        note
    }

    fn cache_remove(&self, id: Uuid) {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }

    fn decrypt_record(record: &NoteRecord, key: &DerivedKey) -> Result<DecryptedNote> {
        let content = cipher::decrypt_text(&record.content, key)?;
        let tags_json = cipher::decrypt_text(&record.tags, key)?;
        let tags: Vec<String> = serde_json::from_str(&tags_json)?;
        Ok(DecryptedNote {
            id: record.id,
            created_at: record.created_at,
            modified_at: record.modified_at,
            synced_at: record.synced_at,
            content,
            tags,
            attachments: record.attachments.clone(),
            pinned: record.pinned,
            deleted: record.deleted,
            deleted_at: record.deleted_at,
            version: record.version,
            word_wrap: record.word_wrap,
            syntax_language: record.syntax_language,
            decrypted_at: Utc::now(),
        })
    }

    /// Create a note with `version = 1`.
    pub async fn create(&self, req: CreateNote) -> Result<DecryptedNote> {
        let key = self.keys.master_key()?;
        let settings = self.store.settings.get().await?;

        let tags = normalize_tags(req.tags);
        let content = cipher::encrypt_text(&req.content, &key)?;
        let tags_env = cipher::encrypt_text(&serde_json::to_string(&tags)?, &key)?;
        let sync_hash = Some(cipher::fingerprint(&content.ciphertext));

        let now = Utc::now();
        let record = NoteRecord {
            id: cipher::new_id(),
            created_at: req.created_at.unwrap_or(now),
            modified_at: req.modified_at.unwrap_or(now),
            synced_at: None,
            content,
            tags: tags_env,
            attachments: Vec::new(),
            pinned: req.pinned,
            deleted: false,
            deleted_at: None,
            sync_hash,
            version: 1,
            word_wrap: req.word_wrap.unwrap_or(settings.word_wrap),
            syntax_language: req.syntax_language.unwrap_or(settings.syntax_language),
        };
        self.store.notes.create(&record).await?;
        self.store
            .sync
            .mark_status(record.id, SyncStatus::Pending, None)
            .await?;

        debug!(
            subsystem = "service",
            component = "notes",
            op = "create",
            note_id = %record.id,
            "Note created"
        );
        let decrypted = Self::decrypt_record(&record, &key)?;
        Ok(self.cache_put(decrypted))
    }

    /// Read a note, decrypting content and tags.
    ///
    /// The cache only skips the decryption work: a hit must match the
    /// stored record's version and modified stamp, so a copy adopted by
    /// sync is never served stale.
    pub async fn get(&self, id: Uuid) -> Result<DecryptedNote> {
        let key = self.keys.master_key()?;
        let record = self
            .store
            .notes
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("note {id}")))?;
        {
            let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(hit) = cache.get(&id) {
                if hit.version == record.version
                    && hit.modified_at.timestamp_micros() == record.modified_at.timestamp_micros()
                {
                    return Ok(hit.clone());
                }
            }
        }
        let decrypted = Self::decrypt_record(&record, &key)?;
        Ok(self.cache_put(decrypted))
    }

    /// Active notes, pinned first, then in the requested order.
    pub async fn list(&self, order: SortOrder) -> Result<Vec<DecryptedNote>> {
        let key = self.keys.master_key()?;
        let records = self.store.notes.get_all_active().await?;
        let mut notes = records
            .iter()
            .map(|r| Self::decrypt_record(r, &key))
            .collect::<Result<Vec<_>>>()?;
        sort_notes(&mut notes, order);
        Ok(notes)
    }

    /// Soft-deleted notes, most recently deleted first.
    pub async fn list_deleted(&self) -> Result<Vec<DecryptedNote>> {
        let key = self.keys.master_key()?;
        let records = self.store.notes.get_deleted().await?;
        let mut notes = records
            .iter()
            .map(|r| Self::decrypt_record(r, &key))
            .collect::<Result<Vec<_>>>()?;
        notes.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at));
        Ok(notes)
    }

    /// Notes carrying the given tag (case-insensitive), in the given order.
    pub async fn list_by_tag(&self, tag: &str, order: SortOrder) -> Result<Vec<DecryptedNote>> {
        let mut notes = self.list(order).await?;
        notes.retain(|n| crate::tags::contains_tag(&n.tags, tag));
        Ok(notes)
    }

    /// The distinct tag universe across active notes, for filtering and
    /// autocomplete. First-seen case wins; sorted case-insensitively.
    pub async fn all_tags(&self) -> Result<Vec<String>> {
        let notes = self.list(SortOrder::Recent).await?;
        let mut seen: HashSet<String> = HashSet::new();
        let mut tags: Vec<String> = Vec::new();
        for note in &notes {
            for tag in &note.tags {
                if seen.insert(tag.to_lowercase()) {
                    tags.push(tag.clone());
                }
            }
        }
        tags.sort_by_key(|t| t.to_lowercase());
        Ok(tags)
    }

    /// Apply a partial update. Removed attachments lose their blobs and
    /// thumbnails before the note row is rewritten.
    pub async fn update(&self, id: Uuid, req: UpdateNote) -> Result<DecryptedNote> {
        let key = self.keys.master_key()?;
        let mut record = self
            .store
            .notes
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("note {id}")))?;

        if let Some(content) = &req.content {
            record.content = cipher::encrypt_text(content, &key)?;
            record.sync_hash = Some(cipher::fingerprint(&record.content.ciphertext));
        }
        if let Some(tags) = req.tags {
            let tags = normalize_tags(tags);
            record.tags = cipher::encrypt_text(&serde_json::to_string(&tags)?, &key)?;
        }
        if let Some(new_attachments) = req.attachments {
            let kept: HashSet<Uuid> = new_attachments.iter().map(|a| a.id).collect();
            for removed in record.attachments.iter().filter(|a| !kept.contains(&a.id)) {
                self.store.attachments.delete_blob(removed.blob_id).await?;
                if let Some(thumb) = removed.thumbnail_id {
                    self.store.attachments.delete_thumbnail(thumb).await?;
                }
            }
            record.attachments = new_attachments;
        }
        if let Some(pinned) = req.pinned {
            record.pinned = pinned;
        }
        if let Some(word_wrap) = req.word_wrap {
            record.word_wrap = word_wrap;
        }
        if let Some(lang) = req.syntax_language {
            record.syntax_language = lang;
        }

        let stamped = self.store.notes.update(&record).await?;
        self.store
            .sync
            .mark_status(id, SyncStatus::Pending, None)
            .await?;
        let decrypted = Self::decrypt_record(&stamped, &key)?;
        Ok(self.cache_put(decrypted))
    }

    /// Flip the pinned flag; returns the new state.
    pub async fn toggle_pin(&self, id: Uuid) -> Result<bool> {
        let record = self
            .store
            .notes
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("note {id}")))?;
        let updated = self
            .update(
                id,
                UpdateNote {
                    pinned: Some(!record.pinned),
                    ..Default::default()
                },
            )
            .await?;
        Ok(updated.pinned)
    }

    /// Soft-delete: the row and its attachments are retained.
    pub async fn soft_delete(&self, id: Uuid) -> Result<()> {
        self.store.notes.soft_delete(id).await?;
        self.store
            .sync
            .mark_status(id, SyncStatus::Pending, None)
            .await?;
        self.cache_remove(id);
        Ok(())
    }

    /// Undo a soft delete.
    pub async fn restore(&self, id: Uuid) -> Result<()> {
        self.store.notes.restore(id).await?;
        self.store
            .sync
            .mark_status(id, SyncStatus::Pending, None)
            .await?;
        self.cache_remove(id);
        Ok(())
    }

    /// Permanently remove a note.
    ///
    /// Delete order is blobs, then the per-note sync record, then the note
    /// row, so a crash between steps never leaves a dangling attachment.
    /// Re-running is a no-op.
    pub async fn permanent_delete(&self, id: Uuid) -> Result<()> {
        let Some(record) = self.store.notes.get(id).await? else {
            return Ok(());
        };
        for attachment in &record.attachments {
            self.store.attachments.delete_blob(attachment.blob_id).await?;
            if let Some(thumb) = attachment.thumbnail_id {
                self.store.attachments.delete_thumbnail(thumb).await?;
            }
        }
        self.store.sync.delete_note_state(id).await?;
        self.store.notes.purge(id).await?;
        self.cache_remove(id);

        info!(
            subsystem = "service",
            component = "notes",
            op = "permanent_delete",
            note_id = %id,
            "Note purged"
        );
        Ok(())
    }

    /// Permanently delete soft-deleted notes older than the retention
    /// window. Returns how many were removed.
    pub async fn purge_old(&self) -> Result<usize> {
        let settings = self.store.settings.get().await?;
        let cutoff = Utc::now() - Duration::days(settings.purge_retention_days);
        let deleted = self.store.notes.get_deleted().await?;

        let mut purged = 0;
        for record in deleted {
            if let Some(deleted_at) = record.deleted_at {
                if deleted_at < cutoff {
                    self.permanent_delete(record.id).await?;
                    purged += 1;
                }
            }
        }
        if purged > 0 {
            info!(
                subsystem = "service",
                component = "notes",
                op = "purge_old",
                note_count = purged,
                "Purged expired notes"
            );
        }
        Ok(purged)
    }

    /// Encrypt and attach a file to a note.
    pub async fn add_attachment(
        &self,
        note_id: Uuid,
        filename: &str,
        mime_type: &str,
        data: &[u8],
        thumbnail: Option<&[u8]>,
    ) -> Result<AttachmentRef> {
        let key = self.keys.master_key()?;
        let record = self
            .store
            .notes
            .get(note_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("note {note_id}")))?;

        let blob_id = cipher::new_id();
        let blob = cipher::encrypt_bytes(data, &key)?;
        self.store.attachments.put_blob(blob_id, &blob).await?;

        let thumbnail_id = match thumbnail {
            Some(bytes) => {
                let id = cipher::new_id();
                let env = cipher::encrypt_bytes(bytes, &key)?;
                self.store.attachments.put_thumbnail(id, &env).await?;
                Some(id)
            }
            None => None,
        };

        let attachment = AttachmentRef {
            id: cipher::new_id(),
            filename: cipher::encrypt_text(filename, &key)?,
            mime_type: mime_type.to_string(),
            size: data.len() as i64,
            blob_id,
            thumbnail_id,
        };

        let mut attachments = record.attachments.clone();
        attachments.push(attachment.clone());
        self.update(
            note_id,
            UpdateNote {
                attachments: Some(attachments),
                ..Default::default()
            },
        )
        .await?;
        Ok(attachment)
    }

    /// Remove one attachment from a note, deleting its blobs.
    pub async fn remove_attachment(&self, note_id: Uuid, attachment_id: Uuid) -> Result<()> {
        let record = self
            .store
            .notes
            .get(note_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("note {note_id}")))?;
        let remaining: Vec<AttachmentRef> = record
            .attachments
            .into_iter()
            .filter(|a| a.id != attachment_id)
            .collect();
        self.update(
            note_id,
            UpdateNote {
                attachments: Some(remaining),
                ..Default::default()
            },
        )
        .await?;
        Ok(())
    }

    /// Decrypt an attachment's filename and bytes.
    pub async fn read_attachment(&self, attachment: &AttachmentRef) -> Result<(String, Vec<u8>)> {
        let key = self.keys.master_key()?;
        let blob = self
            .store
            .attachments
            .get_blob(attachment.blob_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("attachment blob {}", attachment.blob_id)))?;
        let data = cipher::decrypt_bytes(&blob, &key)?;
        let filename = cipher::decrypt_text(&attachment.filename, &key)?;
        Ok((filename, data))
    }
}

/// Sort a decrypted list: pinned before unpinned, then the selected order.
pub fn sort_notes(notes: &mut [DecryptedNote], order: SortOrder) {
    notes.sort_by(|a, b| {
        b.pinned.cmp(&a.pinned).then_with(|| match order {
            SortOrder::Recent => b.modified_at.cmp(&a.modified_at),
            SortOrder::Oldest => a.modified_at.cmp(&b.modified_at),
            SortOrder::Created => b.created_at.cmp(&a.created_at),
            SortOrder::Alpha => a
                .first_line()
                .to_lowercase()
                .cmp(&b.first_line().to_lowercase()),
        })
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decrypted(content: &str, pinned: bool, offset_secs: i64) -> DecryptedNote {
        let base = Utc::now();
        DecryptedNote {
            id: Uuid::new_v4(),
            created_at: base + Duration::seconds(offset_secs),
            modified_at: base + Duration::seconds(offset_secs),
            synced_at: None,
            content: content.to_string(),
            tags: vec![],
            attachments: vec![],
            pinned,
            deleted: false,
            deleted_at: None,
            version: 1,
            word_wrap: true,
            syntax_language: SyntaxLanguage::Plain,
            decrypted_at: base,
        }
    }

    #[test]
    fn test_sort_pinned_first() {
        let mut notes = vec![
            decrypted("b", false, 10),
            decrypted("a", true, 0),
            decrypted("c", false, 20),
        ];
        sort_notes(&mut notes, SortOrder::Recent);
        assert!(notes[0].pinned);
        assert_eq!(notes[1].content, "c");
        assert_eq!(notes[2].content, "b");
    }

    #[test]
    fn test_sort_alpha_case_folded_first_line() {
        let mut notes = vec![
            decrypted("zebra", false, 0),
            decrypted("Apple\nsecond line", false, 0),
            decrypted("mango", false, 0),
        ];
        sort_notes(&mut notes, SortOrder::Alpha);
        let lines: Vec<&str> = notes.iter().map(|n| n.first_line()).collect();
        assert_eq!(lines, vec!["Apple", "mango", "zebra"]);
    }

    #[test]
    fn test_sort_oldest() {
        let mut notes = vec![decrypted("new", false, 10), decrypted("old", false, 0)];
        sort_notes(&mut notes, SortOrder::Oldest);
        assert_eq!(notes[0].content, "old");
    }
}
