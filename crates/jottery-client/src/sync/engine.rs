//! Bidirectional synchronization engine.
//!
//! Per-note state machine: `synced → pending` on local mutation,
//! `pending → synced` on push-accept, `pending → conflict` on push-reject,
//! `conflict → synced` when a later pull adopts a newer server copy, and
//! `any → error` on transient failures.
//!
//! Conflict policy is Last-Write-Wins on `modifiedAt`; ties keep the local
//! copy. When the local copy survives a pull it is re-stamped so the next
//! push supersedes the server version.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use jottery_core::{
    ApiKey, DeviceType, Error, NoteSyncState, PullRequest, PushRequest, RegisterRequest, Result,
    SyncBlob, SyncCredentials, SyncMetadata, SyncMetadataPatch, SyncStatus, WireNote,
};
use jottery_crypto::{cipher, KeyManager};
use jottery_store::{
    AttachmentStore, EncryptionMetadata, EncryptionStore, NoteStore, Store, SyncStore,
};

use crate::sync::http::{normalize_endpoint, ApiClient};

/// Summary of one `sync_now` pass.
#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    /// Notes the server accepted.
    pub pushed: usize,
    /// Notes the server rejected as stale.
    pub rejected: usize,
    /// Notes adopted or created from the server.
    pub pulled: usize,
    /// Local notes kept over an older server copy.
    pub kept_local: usize,
    /// Server deletions applied locally.
    pub deleted: usize,
    /// Non-fatal issues encountered along the way.
    pub warnings: Vec<String>,
}

/// Client-side sync engine: registration, credential portability, push,
/// pull, and the merge in between.
pub struct SyncEngine {
    store: Arc<Store>,
    keys: KeyManager,
    in_flight: AtomicBool,
    /// Blob ids the server has acknowledged this session; keeps repeat
    /// pushes from re-uploading unchanged attachments.
    pushed_blobs: Mutex<HashSet<Uuid>>,
}

/// Clears the in-flight flag even on early return.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SyncEngine {
    pub fn new(store: Arc<Store>, keys: KeyManager) -> Self {
        Self {
            store,
            keys,
            in_flight: AtomicBool::new(false),
            pushed_blobs: Mutex::new(HashSet::new()),
        }
    }

    /// Register this device with a sync server.
    ///
    /// Returns the plaintext API key exactly once for user-visible
    /// display; only its encrypted envelope is persisted.
    pub async fn register(
        &self,
        endpoint: &str,
        device_name: &str,
        device_type: DeviceType,
    ) -> Result<String> {
        let key = self.keys.master_key()?;
        let endpoint = normalize_endpoint(endpoint);
        let client = ApiClient::new(&endpoint);

        let resp = client
            .register(&RegisterRequest {
                device_name: device_name.to_string(),
                device_type,
            })
            .await?;

        let envelope = cipher::encrypt_text(&resp.api_key, &key)?;
        self.store
            .sync
            .patch_global(SyncMetadataPatch {
                api_key: Some(ApiKey::Encrypted(envelope)),
                client_id: Some(Some(resp.client_id)),
                sync_endpoint: Some(Some(endpoint.clone())),
                sync_enabled: Some(true),
                auto_sync_interval: Some(jottery_core::defaults::AUTO_SYNC_INTERVAL_MINUTES),
                ..Default::default()
            })
            .await?;

        info!(
            subsystem = "sync",
            component = "engine",
            op = "register",
            client_id = %resp.client_id,
            endpoint = %endpoint,
            "Registered with sync server"
        );
        Ok(resp.api_key)
    }

    /// Export credentials for seeding another device.
    ///
    /// Carries the key-derivation salt: without it the second device could
    /// never derive the same data key from the same password.
    pub async fn export_credentials(&self) -> Result<String> {
        let key = self.keys.master_key()?;
        let global = self
            .store
            .sync
            .get_global()
            .await?
            .ok_or(Error::SyncDisabled)?;
        let endpoint = global.sync_endpoint.clone().ok_or(Error::SyncDisabled)?;
        let client_id = global.client_id.ok_or(Error::SyncDisabled)?;
        let api_key = match &global.api_key {
            ApiKey::Encrypted(envelope) => cipher::decrypt_text(envelope, &key)?,
            _ => return Err(Error::SyncDisabled),
        };
        let meta = self
            .store
            .encryption
            .get()
            .await?
            .ok_or(Error::NotInitialized)?;

        SyncCredentials {
            endpoint,
            client_id,
            api_key,
            salt: meta.salt,
        }
        .to_base64()
    }

    /// Import credentials exported from another device.
    ///
    /// Overwrites the encryption metadata with the imported salt (existing
    /// notes are untouched; the path assumes an empty or compatible
    /// store), stores the key behind the pending-import marker with sync
    /// disabled, and locks the app. The next successful unlock seals the
    /// key and re-enables sync; a wrong password leaves both as they are.
    pub async fn import_credentials(&self, encoded: &str) -> Result<()> {
        let creds = SyncCredentials::from_base64(encoded)?;

        self.store
            .encryption
            .overwrite(&EncryptionMetadata::from_imported_salt(creds.salt))
            .await?;
        self.store
            .sync
            .patch_global(SyncMetadataPatch {
                api_key: Some(ApiKey::PendingImport(creds.api_key)),
                client_id: Some(Some(creds.client_id)),
                sync_endpoint: Some(Some(normalize_endpoint(&creds.endpoint))),
                sync_enabled: Some(false),
                ..Default::default()
            })
            .await?;
        self.keys.lock();

        info!(
            subsystem = "sync",
            component = "engine",
            op = "import_credentials",
            "Credentials imported; unlock required to seal the key"
        );
        Ok(())
    }

    /// One bidirectional pass: push local changes, pull remote ones.
    ///
    /// Serialized against itself by a single in-flight flag; concurrent
    /// invocations fail fast with `SyncInProgress`.
    pub async fn sync_now(&self) -> Result<SyncOutcome> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::SyncInProgress);
        }
        let _guard = InFlightGuard(&self.in_flight);
        let started = Instant::now();

        let global = self
            .store
            .sync
            .get_global()
            .await?
            .ok_or(Error::SyncDisabled)?;
        if !global.sync_enabled {
            return Err(Error::SyncDisabled);
        }
        let endpoint = global.sync_endpoint.clone().ok_or(Error::SyncDisabled)?;
        let api_key = match &global.api_key {
            ApiKey::Encrypted(envelope) => {
                let key = self.keys.master_key()?;
                cipher::decrypt_text(envelope, &key)?
            }
            _ => return Err(Error::SyncDisabled),
        };
        let client = ApiClient::with_key(&endpoint, api_key);

        let mut outcome = SyncOutcome::default();

        // The status probe is advisory; a failure is a warning, not an abort.
        if let Err(e) = client.status().await {
            warn!(
                subsystem = "sync",
                component = "engine",
                op = "status",
                error = %e,
                "Status probe failed; continuing"
            );
            outcome.warnings.push(format!("status probe failed: {e}"));
        }

        self.push(&client, &global, &mut outcome).await?;
        let synced_at = self.pull(&client, &global, &mut outcome).await?;

        self.store
            .sync
            .patch_global(SyncMetadataPatch {
                last_sync_at: Some(Some(synced_at)),
                ..Default::default()
            })
            .await?;

        info!(
            subsystem = "sync",
            component = "engine",
            op = "sync_now",
            accepted_count = outcome.pushed,
            rejected_count = outcome.rejected,
            note_count = outcome.pulled,
            duration_ms = started.elapsed().as_millis() as u64,
            "Sync pass complete"
        );
        Ok(outcome)
    }

    /// Push every note modified since the last sync.
    async fn push(
        &self,
        client: &ApiClient,
        global: &SyncMetadata,
        outcome: &mut SyncOutcome,
    ) -> Result<()> {
        // One snapshot query; edits landing after this point belong to the
        // next cycle.
        let notes = match global.last_sync_at {
            Some(since) => self.store.notes.get_modified_after(since).await?,
            None => self.store.notes.get_all().await?,
        };
        if notes.is_empty() {
            debug!(
                subsystem = "sync",
                component = "push",
                "Nothing to push"
            );
            return Ok(());
        }

        // Collect referenced blobs the server has not seen this session,
        // deduplicated within the batch. Snapshot the session cache up
        // front; the guard must not live across awaits.
        let already_pushed: HashSet<Uuid> = self
            .pushed_blobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let mut batch: HashSet<Uuid> = HashSet::new();
        let mut attachments: Vec<SyncBlob> = Vec::new();
        for note in &notes {
            for reference in &note.attachments {
                for blob_id in std::iter::once(reference.blob_id).chain(reference.thumbnail_id) {
                    if already_pushed.contains(&blob_id) || !batch.insert(blob_id) {
                        continue;
                    }
                    let envelope = match blob_id == reference.blob_id {
                        true => self.store.attachments.get_blob(blob_id).await?,
                        false => self.store.attachments.get_thumbnail(blob_id).await?,
                    };
                    if let Some(envelope) = envelope {
                        attachments.push(SyncBlob::from_envelope(blob_id, &envelope)?);
                    }
                }
            }
        }

        let request = PushRequest {
            notes: notes.iter().map(WireNote::from).collect(),
            attachments,
        };

        let response = match client.push(&request).await {
            Ok(response) => response,
            Err(e) => {
                // A failed push taints every submitted note.
                for note in &notes {
                    self.store
                        .sync
                        .mark_status(note.id, SyncStatus::Error, Some(e.to_string()))
                        .await?;
                }
                return Err(e);
            }
        };

        for accepted in &response.accepted {
            let record = self.store.notes.get(accepted.id).await?;
            self.store
                .sync
                .upsert_note_state(&NoteSyncState {
                    note_id: accepted.id,
                    synced_at: Some(accepted.synced_at),
                    sync_hash: record.as_ref().and_then(|r| r.sync_hash.clone()),
                    server_version: accepted.server_version,
                    status: SyncStatus::Synced,
                    error_message: None,
                })
                .await?;
            self.store
                .notes
                .set_synced_at(accepted.id, accepted.synced_at)
                .await?;
        }
        for rejected in &response.rejected {
            self.store
                .sync
                .mark_status(
                    rejected.id,
                    SyncStatus::Conflict,
                    Some(rejected.reason.clone()),
                )
                .await?;
        }
        outcome.warnings.extend(response.errors.iter().cloned());
        outcome.pushed = response.accepted.len();
        outcome.rejected = response.rejected.len();

        {
            let mut pushed = self.pushed_blobs.lock().unwrap_or_else(|e| e.into_inner());
            pushed.extend(batch);
        }

        self.store
            .sync
            .patch_global(SyncMetadataPatch {
                last_push_at: Some(Some(Utc::now())),
                ..Default::default()
            })
            .await?;

        debug!(
            subsystem = "sync",
            component = "push",
            accepted_count = outcome.pushed,
            rejected_count = outcome.rejected,
            "Push complete"
        );
        Ok(())
    }

    /// Pull remote changes and merge with Last-Write-Wins.
    ///
    /// Returns the server's `syncedAt`, which becomes the next
    /// `last_sync_at` so pull stays monotone against the server clock.
    async fn pull(
        &self,
        client: &ApiClient,
        global: &SyncMetadata,
        outcome: &mut SyncOutcome,
    ) -> Result<chrono::DateTime<Utc>> {
        let known_note_ids: Vec<Uuid> = self
            .store
            .notes
            .get_all()
            .await?
            .iter()
            .map(|n| n.id)
            .collect();

        let response = client
            .pull(&PullRequest {
                last_sync_at: global.last_sync_at,
                known_note_ids,
            })
            .await?;

        // Blobs first so adopted notes never reference missing envelopes.
        for blob in response.attachments {
            let (id, envelope) = blob.into_envelope()?;
            self.store.attachments.put_blob(id, &envelope).await?;
        }

        for wire in response.notes {
            let server_version = wire.server_version.unwrap_or(0);
            let local = self.store.notes.get(wire.id).await?;
            match local {
                None => {
                    // New to this device; adopt verbatim, still encrypted.
                    let record = wire.into_record(Some(response.synced_at));
                    self.store.notes.apply_remote(&record).await?;
                    self.store
                        .sync
                        .upsert_note_state(&NoteSyncState {
                            note_id: record.id,
                            synced_at: Some(response.synced_at),
                            sync_hash: Some(cipher::fingerprint(&record.content.ciphertext)),
                            server_version,
                            status: SyncStatus::Synced,
                            error_message: None,
                        })
                        .await?;
                    outcome.pulled += 1;
                }
                Some(local) if wire.modified_at > local.modified_at => {
                    // Remote wins: replace every field, keep the id.
                    let record = wire.into_record(Some(response.synced_at));
                    self.store.notes.apply_remote(&record).await?;
                    self.store
                        .sync
                        .upsert_note_state(&NoteSyncState {
                            note_id: record.id,
                            synced_at: Some(response.synced_at),
                            sync_hash: Some(cipher::fingerprint(&record.content.ciphertext)),
                            server_version,
                            status: SyncStatus::Synced,
                            error_message: None,
                        })
                        .await?;
                    outcome.pulled += 1;
                }
                Some(local) if wire.modified_at == local.modified_at => {
                    // Same stamp, same bytes: typically our own push coming
                    // back. Acknowledge and move on.
                    self.store
                        .sync
                        .upsert_note_state(&NoteSyncState {
                            note_id: local.id,
                            synced_at: Some(response.synced_at),
                            sync_hash: local.sync_hash.clone(),
                            server_version,
                            status: SyncStatus::Synced,
                            error_message: None,
                        })
                        .await?;
                }
                Some(local) => {
                    // Local is strictly newer: keep it, and re-stamp so it
                    // re-enters the next push set and supersedes the
                    // server's copy.
                    self.store.notes.touch(local.id).await?;
                    self.store
                        .sync
                        .mark_status(local.id, SyncStatus::Pending, None)
                        .await?;
                    outcome.kept_local += 1;
                    debug!(
                        subsystem = "sync",
                        component = "pull",
                        note_id = %local.id,
                        "Kept local copy over older server version"
                    );
                }
            }
        }

        for deletion in response.deletions {
            if let Some(local) = self.store.notes.get(deletion.id).await? {
                if !local.deleted {
                    // Soft-delete only; local retention handles the purge.
                    self.store.notes.soft_delete(deletion.id).await?;
                    outcome.deleted += 1;
                }
            }
        }

        self.store
            .sync
            .patch_global(SyncMetadataPatch {
                last_pull_at: Some(Some(Utc::now())),
                ..Default::default()
            })
            .await?;

        debug!(
            subsystem = "sync",
            component = "pull",
            note_count = outcome.pulled,
            "Pull complete"
        );
        Ok(response.synced_at)
    }
}
