//! Client-side sync state: global metadata and the per-note status machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults::{self, IMPORT_SENTINEL};
use crate::error::{Error, Result};
use crate::models::encryption::Envelope;

/// The stored API key, as a tagged value.
///
/// Steady state is `Encrypted`; `PendingImport` exists only between a
/// credential import and the next successful unlock. The `IMPORT:` string
/// sentinel is a storage-encoding concern handled by [`ApiKey::to_stored`]
/// and [`ApiKey::from_stored`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiKey {
    Absent,
    Encrypted(Envelope),
    PendingImport(String),
}

impl ApiKey {
    pub fn is_absent(&self) -> bool {
        matches!(self, ApiKey::Absent)
    }

    /// Encode for the storage column: NULL, envelope JSON, or the
    /// sentinel-prefixed plaintext.
    pub fn to_stored(&self) -> Result<Option<String>> {
        Ok(match self {
            ApiKey::Absent => None,
            ApiKey::Encrypted(env) => Some(env.to_json()?),
            ApiKey::PendingImport(plain) => Some(format!("{IMPORT_SENTINEL}{plain}")),
        })
    }

    /// Decode from the storage column.
    pub fn from_stored(stored: Option<String>) -> Result<Self> {
        match stored {
            None => Ok(ApiKey::Absent),
            Some(s) => {
                if let Some(plain) = s.strip_prefix(IMPORT_SENTINEL) {
                    Ok(ApiKey::PendingImport(plain.to_string()))
                } else {
                    Ok(ApiKey::Encrypted(Envelope::from_json(&s)?))
                }
            }
        }
    }
}

/// Global sync configuration and bookkeeping, one per local store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncMetadata {
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_push_at: Option<DateTime<Utc>>,
    pub last_pull_at: Option<DateTime<Utc>>,
    pub api_key: ApiKey,
    pub client_id: Option<Uuid>,
    pub sync_enabled: bool,
    pub sync_endpoint: Option<String>,
    /// Minutes between automatic sync passes.
    pub auto_sync_interval: i64,
}

impl Default for SyncMetadata {
    fn default() -> Self {
        Self {
            last_sync_at: None,
            last_push_at: None,
            last_pull_at: None,
            api_key: ApiKey::Absent,
            client_id: None,
            sync_enabled: false,
            sync_endpoint: None,
            auto_sync_interval: defaults::AUTO_SYNC_INTERVAL_MINUTES,
        }
    }
}

/// Partial update for the global sync metadata; `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct SyncMetadataPatch {
    pub last_sync_at: Option<Option<DateTime<Utc>>>,
    pub last_push_at: Option<Option<DateTime<Utc>>>,
    pub last_pull_at: Option<Option<DateTime<Utc>>>,
    pub api_key: Option<ApiKey>,
    pub client_id: Option<Option<Uuid>>,
    pub sync_enabled: Option<bool>,
    pub sync_endpoint: Option<Option<String>>,
    pub auto_sync_interval: Option<i64>,
}

impl SyncMetadataPatch {
    /// Apply this patch on top of an existing metadata value.
    pub fn apply(self, mut meta: SyncMetadata) -> SyncMetadata {
        if let Some(v) = self.last_sync_at {
            meta.last_sync_at = v;
        }
        if let Some(v) = self.last_push_at {
            meta.last_push_at = v;
        }
        if let Some(v) = self.last_pull_at {
            meta.last_pull_at = v;
        }
        if let Some(v) = self.api_key {
            meta.api_key = v;
        }
        if let Some(v) = self.client_id {
            meta.client_id = v;
        }
        if let Some(v) = self.sync_enabled {
            meta.sync_enabled = v;
        }
        if let Some(v) = self.sync_endpoint {
            meta.sync_endpoint = v;
        }
        if let Some(v) = self.auto_sync_interval {
            meta.auto_sync_interval = v;
        }
        meta
    }
}

/// Per-note position in the sync status machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Synced,
    Pending,
    Conflict,
    Error,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Synced => "synced",
            Self::Pending => "pending",
            Self::Conflict => "conflict",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "synced" => Ok(Self::Synced),
            "pending" => Ok(Self::Pending),
            "conflict" => Ok(Self::Conflict),
            "error" => Ok(Self::Error),
            _ => Err(Error::invalid_field("sync_status")),
        }
    }
}

/// Per-note sync record. At most one exists for every locally-present,
/// non-purged note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteSyncState {
    pub note_id: Uuid,
    pub synced_at: Option<DateTime<Utc>>,
    /// Content fingerprint at the time of the last successful sync.
    pub sync_hash: Option<String>,
    /// Server version acknowledged at the last successful sync.
    pub server_version: i64,
    pub status: SyncStatus,
    pub error_message: Option<String>,
}

impl NoteSyncState {
    /// A fresh record for a note that has never synced.
    pub fn pending(note_id: Uuid) -> Self {
        Self {
            note_id,
            synced_at: None,
            sync_hash: None,
            server_version: 0,
            status: SyncStatus::Pending,
            error_message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_stored_absent() {
        assert_eq!(ApiKey::Absent.to_stored().unwrap(), None);
        assert_eq!(ApiKey::from_stored(None).unwrap(), ApiKey::Absent);
    }

    #[test]
    fn test_api_key_stored_import_sentinel() {
        let key = ApiKey::PendingImport("a".repeat(64));
        let stored = key.to_stored().unwrap().unwrap();
        assert!(stored.starts_with("IMPORT:"));
        assert_eq!(ApiKey::from_stored(Some(stored)).unwrap(), key);
    }

    #[test]
    fn test_api_key_stored_envelope() {
        let key = ApiKey::Encrypted(Envelope::new("Y3Q=".into(), "aXY=".into()));
        let stored = key.to_stored().unwrap().unwrap();
        assert!(!stored.starts_with("IMPORT:"));
        assert_eq!(ApiKey::from_stored(Some(stored)).unwrap(), key);
    }

    #[test]
    fn test_patch_merges_selected_fields() {
        let meta = SyncMetadata {
            sync_endpoint: Some("http://a".into()),
            sync_enabled: true,
            ..Default::default()
        };
        let patch = SyncMetadataPatch {
            sync_enabled: Some(false),
            auto_sync_interval: Some(10),
            ..Default::default()
        };
        let merged = patch.apply(meta.clone());
        assert!(!merged.sync_enabled);
        assert_eq!(merged.auto_sync_interval, 10);
        assert_eq!(merged.sync_endpoint, meta.sync_endpoint);
    }

    #[test]
    fn test_sync_status_roundtrip() {
        for s in [
            SyncStatus::Synced,
            SyncStatus::Pending,
            SyncStatus::Conflict,
            SyncStatus::Error,
        ] {
            assert_eq!(s.to_string().parse::<SyncStatus>().unwrap(), s);
        }
    }
}
