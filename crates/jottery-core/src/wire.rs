//! Wire protocol types shared by the sync engine and the server.
//!
//! JSON bodies with camelCase field names; timestamps are RFC 3339 with
//! offset; note and attachment ids are hyphenated UUIDs. Content, tags and
//! filenames travel as opaque [`Envelope`]s; the server never holds a key.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::encryption::Envelope;
use crate::models::note::{AttachmentRef, NoteRecord, SyntaxLanguage};

/// Device class reported at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Web,
    Cli,
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Web => write!(f, "web"),
            Self::Cli => write!(f, "cli"),
        }
    }
}

/// `POST /api/v1/auth/register` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub device_name: String,
    pub device_type: DeviceType,
}

/// `POST /api/v1/auth/register` response. The API key appears here exactly
/// once; no endpoint ever returns it again.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub api_key: String,
    pub client_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// `GET /api/v1/sync/status` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusResponse {
    pub client_id: Uuid,
    pub server_last_modified: DateTime<Utc>,
    pub note_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// A note on the wire. Pushed by clients and returned by pull.
///
/// `server_version` is populated only in pull responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireNote {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub content: Envelope,
    pub tags: Envelope,
    pub attachments: Vec<AttachmentRef>,
    pub pinned: bool,
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub version: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_wrap: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syntax_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_version: Option<i64>,
}

impl From<&NoteRecord> for WireNote {
    fn from(note: &NoteRecord) -> Self {
        Self {
            id: note.id,
            created_at: note.created_at,
            modified_at: note.modified_at,
            content: note.content.clone(),
            tags: note.tags.clone(),
            attachments: note.attachments.clone(),
            pinned: note.pinned,
            deleted: note.deleted,
            deleted_at: note.deleted_at,
            version: note.version,
            word_wrap: Some(note.word_wrap),
            syntax_language: Some(note.syntax_language.to_string()),
            server_version: None,
        }
    }
}

impl WireNote {
    /// Materialize as a local record, e.g. when pull adopts a server copy.
    pub fn into_record(self, synced_at: Option<DateTime<Utc>>) -> NoteRecord {
        NoteRecord {
            id: self.id,
            created_at: self.created_at,
            modified_at: self.modified_at,
            synced_at,
            content: self.content,
            tags: self.tags,
            attachments: self.attachments,
            pinned: self.pinned,
            deleted: self.deleted,
            deleted_at: self.deleted_at,
            sync_hash: None,
            version: self.version,
            word_wrap: self.word_wrap.unwrap_or(true),
            syntax_language: self
                .syntax_language
                .as_deref()
                .and_then(|s| s.parse::<SyntaxLanguage>().ok())
                .unwrap_or_default(),
        }
    }
}

/// An attachment blob in transit: base64 of the encrypted envelope bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncBlob {
    pub id: Uuid,
    pub data: String,
}

impl SyncBlob {
    /// Wrap a stored envelope for transport.
    pub fn from_envelope(id: Uuid, envelope: &Envelope) -> Result<Self> {
        let json = envelope.to_json()?;
        Ok(Self {
            id,
            data: base64::engine::general_purpose::STANDARD.encode(json.as_bytes()),
        })
    }

    /// Unwrap back into a stored envelope.
    pub fn into_envelope(self) -> Result<(Uuid, Envelope)> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&self.data)
            .map_err(|e| Error::Protocol(format!("Invalid attachment encoding: {e}")))?;
        let json = String::from_utf8(bytes)
            .map_err(|e| Error::Protocol(format!("Invalid attachment encoding: {e}")))?;
        Ok((self.id, Envelope::from_json(&json)?))
    }
}

/// `POST /api/v1/sync/push` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRequest {
    pub notes: Vec<WireNote>,
    pub attachments: Vec<SyncBlob>,
}

/// Per-note acceptance in a push response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushAccepted {
    pub id: Uuid,
    pub server_version: i64,
    pub synced_at: DateTime<Utc>,
}

/// Per-note rejection in a push response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRejected {
    pub id: Uuid,
    pub reason: String,
    pub server_modified_at: DateTime<Utc>,
}

/// `POST /api/v1/sync/push` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushResponse {
    pub accepted: Vec<PushAccepted>,
    pub rejected: Vec<PushRejected>,
    pub errors: Vec<String>,
}

/// `POST /api/v1/sync/pull` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,
    pub known_note_ids: Vec<Uuid>,
}

/// A server-side soft deletion conveyed by pull.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncDeletion {
    pub id: Uuid,
    pub deleted_at: DateTime<Utc>,
}

/// `POST /api/v1/sync/pull` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponse {
    pub notes: Vec<WireNote>,
    pub deletions: Vec<SyncDeletion>,
    pub attachments: Vec<SyncBlob>,
    pub synced_at: DateTime<Utc>,
}

/// Credential payload for seeding a second device.
///
/// Base64 of this JSON object with exactly these four keys. The salt is
/// what lets the second device derive the same data key from the same
/// password; unknown or missing keys are rejected on import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SyncCredentials {
    pub endpoint: String,
    pub client_id: Uuid,
    pub api_key: String,
    /// Base64-encoded key-derivation salt.
    pub salt: String,
}

impl SyncCredentials {
    /// Encode to the base64 JSON transfer string.
    pub fn to_base64(&self) -> Result<String> {
        let json = serde_json::to_string(self)?;
        Ok(base64::engine::general_purpose::STANDARD.encode(json.as_bytes()))
    }

    /// Decode and validate a transfer string.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|_| Error::invalid_field("credentials"))?;
        let json = String::from_utf8(bytes).map_err(|_| Error::invalid_field("credentials"))?;
        let creds: Self =
            serde_json::from_str(&json).map_err(|_| Error::invalid_field("credentials"))?;
        creds.validate()?;
        Ok(creds)
    }

    pub fn validate(&self) -> Result<()> {
        let mut fields = Vec::new();
        if self.endpoint.is_empty()
            || !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://"))
        {
            fields.push("endpoint".to_string());
        }
        if self.api_key.is_empty() {
            fields.push("apiKey".to_string());
        }
        if self.salt.is_empty()
            || base64::engine::general_purpose::STANDARD
                .decode(&self.salt)
                .is_err()
        {
            fields.push("salt".to_string());
        }
        if fields.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidInput { fields })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope() -> Envelope {
        Envelope::new("Y2lwaGVydGV4dA==".into(), "bm9uY2UxMjM0NTY=".into())
    }

    #[test]
    fn test_wire_note_camel_case() {
        let note = WireNote {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            modified_at: Utc::now(),
            content: envelope(),
            tags: envelope(),
            attachments: vec![],
            pinned: false,
            deleted: false,
            deleted_at: None,
            version: 1,
            word_wrap: Some(true),
            syntax_language: Some("plain".into()),
            server_version: None,
        };
        let json = serde_json::to_string(&note).unwrap();
        assert!(json.contains("createdAt"));
        assert!(json.contains("modifiedAt"));
        assert!(json.contains("wordWrap"));
        assert!(!json.contains("serverVersion")); // skipped when None
    }

    #[test]
    fn test_sync_blob_roundtrip() {
        let id = Uuid::new_v4();
        let blob = SyncBlob::from_envelope(id, &envelope()).unwrap();
        let (out_id, out_env) = blob.into_envelope().unwrap();
        assert_eq!(out_id, id);
        assert_eq!(out_env, envelope());
    }

    #[test]
    fn test_sync_blob_rejects_garbage() {
        let blob = SyncBlob {
            id: Uuid::new_v4(),
            data: "!!not base64!!".into(),
        };
        assert!(matches!(blob.into_envelope(), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_credentials_roundtrip() {
        let creds = SyncCredentials {
            endpoint: "https://sync.example.org".into(),
            client_id: Uuid::new_v4(),
            api_key: "ab".repeat(32),
            salt: base64::engine::general_purpose::STANDARD.encode([9u8; 32]),
        };
        let encoded = creds.to_base64().unwrap();
        assert_eq!(SyncCredentials::from_base64(&encoded).unwrap(), creds);
    }

    #[test]
    fn test_credentials_reject_unknown_keys() {
        let json = format!(
            r#"{{"endpoint":"https://s","clientId":"{}","apiKey":"k","salt":"{}","extra":1}}"#,
            Uuid::new_v4(),
            base64::engine::general_purpose::STANDARD.encode([1u8; 32]),
        );
        let encoded = base64::engine::general_purpose::STANDARD.encode(json.as_bytes());
        assert!(SyncCredentials::from_base64(&encoded).is_err());
    }

    #[test]
    fn test_credentials_reject_missing_keys() {
        let json = r#"{"endpoint":"https://s","apiKey":"k"}"#;
        let encoded = base64::engine::general_purpose::STANDARD.encode(json.as_bytes());
        assert!(SyncCredentials::from_base64(encoded.as_str()).is_err());
    }

    #[test]
    fn test_credentials_reject_bad_salt() {
        let creds = SyncCredentials {
            endpoint: "https://s".into(),
            client_id: Uuid::new_v4(),
            api_key: "k".into(),
            salt: "///not-valid///!".into(),
        };
        assert!(creds.validate().is_err());
    }

    #[test]
    fn test_record_wire_roundtrip() {
        let record = NoteRecord {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            modified_at: Utc::now(),
            synced_at: None,
            content: envelope(),
            tags: envelope(),
            attachments: vec![],
            pinned: true,
            deleted: false,
            deleted_at: None,
            sync_hash: None,
            version: 3,
            word_wrap: false,
            syntax_language: SyntaxLanguage::Markdown,
        };
        let wire = WireNote::from(&record);
        let back = wire.into_record(None);
        assert_eq!(back.id, record.id);
        assert_eq!(back.version, 3);
        assert!(!back.word_wrap);
        assert_eq!(back.syntax_language, SyntaxLanguage::Markdown);
        assert!(back.pinned);
    }
}
