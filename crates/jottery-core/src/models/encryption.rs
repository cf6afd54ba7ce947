//! Encryption envelope and key-derivation metadata.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::{Error, Result};

/// The pair produced by AES-256-GCM encryption of a payload.
///
/// Both fields are base64-encoded; the GCM authentication tag is appended
/// to the ciphertext as the algorithm defines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Base64-encoded ciphertext (tag appended).
    pub ciphertext: String,
    /// Base64-encoded 96-bit nonce.
    pub iv: String,
}

impl Envelope {
    pub fn new(ciphertext: String, iv: String) -> Self {
        Self { ciphertext, iv }
    }

    /// Serialize to the JSON form used by storage and the wire.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from the stored JSON form.
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

/// Encryption algorithm identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncryptionAlgorithm {
    #[serde(rename = "AES-256-GCM")]
    Aes256Gcm,
}

impl Default for EncryptionAlgorithm {
    fn default() -> Self {
        Self::Aes256Gcm
    }
}

impl std::fmt::Display for EncryptionAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Aes256Gcm => write!(f, "{}", defaults::ALGORITHM_TAG),
        }
    }
}

impl std::str::FromStr for EncryptionAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == defaults::ALGORITHM_TAG {
            Ok(Self::Aes256Gcm)
        } else {
            Err(Error::invalid_field("algorithm"))
        }
    }
}

/// Per-store key-derivation parameters.
///
/// Created once at initialization and immutable afterwards; a password
/// change would require a full re-encryption pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionMetadata {
    /// Base64-encoded 32-byte salt.
    pub salt: String,
    /// PBKDF2 iteration count.
    pub iterations: u32,
    pub created_at: DateTime<Utc>,
    pub algorithm: EncryptionAlgorithm,
}

impl EncryptionMetadata {
    /// Metadata for a fresh store with default parameters.
    pub fn new(salt: &[u8]) -> Self {
        Self {
            salt: base64::engine::general_purpose::STANDARD.encode(salt),
            iterations: defaults::PBKDF2_ITERATIONS,
            created_at: Utc::now(),
            algorithm: EncryptionAlgorithm::Aes256Gcm,
        }
    }

    /// Metadata carrying an externally supplied base64 salt (credential import).
    pub fn from_imported_salt(salt_b64: String) -> Self {
        Self {
            salt: salt_b64,
            iterations: defaults::PBKDF2_ITERATIONS,
            created_at: Utc::now(),
            algorithm: EncryptionAlgorithm::Aes256Gcm,
        }
    }

    /// Decode the stored salt.
    pub fn salt_bytes(&self) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.salt)
            .map_err(|_| Error::invalid_field("salt"))
    }

    pub fn validate(&self) -> Result<()> {
        let mut fields = Vec::new();
        if self.iterations < defaults::PBKDF2_MIN_ITERATIONS {
            fields.push("iterations".to_string());
        }
        if self.salt.is_empty() || self.salt_bytes().is_err() {
            fields.push("salt".to_string());
        }
        if fields.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidInput { fields })
        }
    }
}
