//! Store initialization, unlock/lock, and full wipe.
//!
//! Unlock verifies the password against the first stored note: if its
//! content decrypts, the password matches; otherwise the derived key is
//! discarded before the caller sees `IncorrectPassword`. With zero notes
//! there is nothing to verify against and the unlock is provisionally
//! accepted; the first write anchors the password.

use std::sync::Arc;

use tracing::{debug, info};

use jottery_core::{ApiKey, EncryptionMetadata, Error, Result, SyncMetadataPatch};
use jottery_crypto::{cipher, derive_key, KeyManager};
use jottery_store::{EncryptionStore, NoteStore, SettingsStore, Store, SyncStore};

/// Owns the unlock lifecycle for one local store.
pub struct Session {
    store: Arc<Store>,
    keys: KeyManager,
}

impl Session {
    pub fn new(store: Arc<Store>, keys: KeyManager) -> Self {
        Self { store, keys }
    }

    /// Whether encryption metadata exists.
    pub async fn is_initialized(&self) -> Result<bool> {
        Ok(self.store.encryption.get().await?.is_some())
    }

    pub fn is_locked(&self) -> bool {
        self.keys.is_locked()
    }

    /// First-time setup: generate a salt, persist metadata, derive and
    /// install the key.
    pub async fn initialize(&self, password: &str) -> Result<()> {
        if self.is_initialized().await? {
            return Err(Error::AlreadyInitialized);
        }
        let salt = cipher::generate_salt();
        let meta = EncryptionMetadata::new(&salt);
        self.store.encryption.init(&meta).await?;

        let key = derive_key(password, &salt, meta.iterations)?;
        self.keys.install(key)?;
        self.apply_auto_lock_setting().await?;

        info!(
            subsystem = "service",
            component = "session",
            op = "initialize",
            "Store initialized"
        );
        Ok(())
    }

    /// Rederive the key from the stored salt and verify it.
    pub async fn unlock(&self, password: &str) -> Result<()> {
        let meta = self
            .store
            .encryption
            .get()
            .await?
            .ok_or(Error::NotInitialized)?;
        let salt = meta.salt_bytes()?;
        let key = derive_key(password, &salt, meta.iterations)?;

        if let Some(note) = self.store.notes.first().await? {
            // Wrong password and corrupt ciphertext are indistinguishable;
            // either way the key is dropped (and zeroized) right here.
            if cipher::decrypt_text(&note.content, &key).is_err() {
                return Err(Error::IncorrectPassword);
            }
        }

        self.keys.install(key.clone())?;
        self.apply_auto_lock_setting().await?;

        // A credential import leaves the API key as plaintext behind a
        // sentinel; the first successful unlock seals it under the fresh
        // key and re-enables sync.
        if let Some(global) = self.store.sync.get_global().await? {
            if let ApiKey::PendingImport(plain) = global.api_key {
                let envelope = cipher::encrypt_text(&plain, &key)?;
                self.store
                    .sync
                    .patch_global(SyncMetadataPatch {
                        api_key: Some(ApiKey::Encrypted(envelope)),
                        sync_enabled: Some(true),
                        ..Default::default()
                    })
                    .await?;
                info!(
                    subsystem = "service",
                    component = "session",
                    op = "unlock",
                    "Imported credentials sealed"
                );
            }
        }

        debug!(
            subsystem = "service",
            component = "session",
            op = "unlock",
            "Store unlocked"
        );
        Ok(())
    }

    /// Zeroize the key.
    pub fn lock(&self) {
        self.keys.lock();
    }

    /// Destroy the store and render the key manager terminal.
    pub async fn wipe(&self) -> Result<()> {
        self.store.wipe().await?;
        self.keys.wipe();
        info!(
            subsystem = "service",
            component = "session",
            op = "wipe",
            "Store wiped and key manager retired"
        );
        Ok(())
    }

    async fn apply_auto_lock_setting(&self) -> Result<()> {
        let settings = self.store.settings.get().await?;
        self.keys.set_timeout(settings.auto_lock_minutes as u64);
        Ok(())
    }
}
