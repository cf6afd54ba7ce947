//! # jottery-crypto
//!
//! The crypto envelope for Jottery: turn a password plus a salt into a
//! usable data key, and wrap/unwrap arbitrary byte or text payloads under
//! that key.
//!
//! - PBKDF2-HMAC-SHA256 key derivation ([`kdf`])
//! - AES-256-GCM content cipher over base64 envelopes ([`cipher`])
//! - Master key lifecycle with auto-lock ([`key_manager`])
//!
//! Decryption fails closed: a single opaque error covers both a wrong key
//! and corrupt ciphertext.

pub mod cipher;
pub mod error;
pub mod kdf;
pub mod key_manager;

pub use cipher::{
    decrypt_bytes, decrypt_text, encrypt_bytes, encrypt_text, fingerprint, generate_nonce,
    generate_salt, new_id, sha256,
};
pub use error::{CryptoError, CryptoResult};
pub use kdf::{derive_key, DerivedKey};
pub use key_manager::KeyManager;

#[cfg(test)]
mod tests {
    use super::*;

    // Password/salt derivation feeding the cipher end to end.
    #[test]
    fn test_derived_key_drives_envelope() {
        let salt = generate_salt();
        let key = derive_key("correct horse battery staple", &salt, 100_000).unwrap();
        let envelope = encrypt_text("hello", &key).unwrap();

        let same = derive_key("correct horse battery staple", &salt, 100_000).unwrap();
        assert_eq!(decrypt_text(&envelope, &same).unwrap(), "hello");

        let wrong = derive_key("wrong", &salt, 100_000).unwrap();
        assert!(decrypt_text(&envelope, &wrong).is_err());
    }
}
