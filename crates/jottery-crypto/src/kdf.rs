//! Key derivation using PBKDF2-HMAC-SHA256.
//!
//! Derivation is deterministic for a given password, salt and iteration
//! count; that determinism is what lets a second device reconstruct the
//! same data key from an exported salt and the user's password.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use jottery_core::defaults::{KEY_LEN, PBKDF2_MIN_ITERATIONS};

use crate::error::{CryptoError, CryptoResult};

/// Key wrapper with automatic zeroization on drop.
///
/// Clones zeroize independently; the raw bytes never appear in Debug
/// output and are never serialized.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; KEY_LEN],
}

impl DerivedKey {
    /// Create a derived key from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { key: bytes }
    }

    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Derive a 256-bit key from a password.
///
/// The iteration count comes from stored encryption metadata; counts below
/// the floor are rejected rather than silently upgraded.
pub fn derive_key(password: &str, salt: &[u8], iterations: u32) -> CryptoResult<DerivedKey> {
    if salt.is_empty() {
        return Err(CryptoError::KeyDerivation("Empty salt".into()));
    }
    if iterations < PBKDF2_MIN_ITERATIONS {
        return Err(CryptoError::KeyDerivation(format!(
            "Iteration count {iterations} below minimum {PBKDF2_MIN_ITERATIONS}"
        )));
    }

    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);

    Ok(DerivedKey { key })
}
