//! AES-256-GCM envelope operations and random material.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use jottery_core::defaults::{NONCE_LEN, SALT_LEN};
use jottery_core::Envelope;

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::DerivedKey;

/// Generate cryptographically secure random bytes.
pub fn generate_random<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Generate a random key-derivation salt (32 bytes).
pub fn generate_salt() -> [u8; SALT_LEN] {
    generate_random()
}

/// Generate a random GCM nonce (12 bytes).
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    generate_random()
}

/// Allocate a fresh 128-bit identifier.
pub fn new_id() -> Uuid {
    Uuid::new_v4()
}

/// SHA-256 digest.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Base64 SHA-256 fingerprint of a text, used for content hashes.
pub fn fingerprint(text: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(sha256(text.as_bytes()))
}

/// Encrypt an opaque byte payload under a fresh random nonce.
///
/// The GCM authentication tag is appended to the ciphertext; both fields
/// of the returned envelope are base64.
pub fn encrypt_bytes(data: &[u8], key: &DerivedKey) -> CryptoResult<Envelope> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let nonce_bytes = generate_nonce();
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, data)
        .map_err(|_| CryptoError::Encryption("AES-GCM encryption failed".into()))?;

    let b64 = base64::engine::general_purpose::STANDARD;
    Ok(Envelope::new(b64.encode(ciphertext), b64.encode(nonce_bytes)))
}

/// Decrypt an envelope back into bytes.
///
/// Fails closed with the single opaque [`CryptoError::Decryption`] on any
/// failure: bad base64, short nonce, or tag mismatch.
pub fn decrypt_bytes(envelope: &Envelope, key: &DerivedKey) -> CryptoResult<Vec<u8>> {
    let b64 = base64::engine::general_purpose::STANDARD;
    let ciphertext = b64
        .decode(&envelope.ciphertext)
        .map_err(|_| CryptoError::Decryption)?;
    let nonce_bytes = b64.decode(&envelope.iv).map_err(|_| CryptoError::Decryption)?;
    if nonce_bytes.len() != NONCE_LEN {
        return Err(CryptoError::Decryption);
    }

    let cipher =
        Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::Decryption)?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext.as_ref())
        .map_err(|_| CryptoError::Decryption)
}

/// Encrypt a text payload.
pub fn encrypt_text(plaintext: &str, key: &DerivedKey) -> CryptoResult<Envelope> {
    encrypt_bytes(plaintext.as_bytes(), key)
}

/// Decrypt a text payload.
pub fn decrypt_text(envelope: &Envelope, key: &DerivedKey) -> CryptoResult<String> {
    let bytes = decrypt_bytes(envelope, key)?;
    String::from_utf8(bytes).map_err(|_| CryptoError::Decryption)
}
