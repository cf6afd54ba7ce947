//! Error types for cryptographic operations.

use thiserror::Error;

/// Cryptographic operation errors.
///
/// Decryption failures are deliberately a single unit variant: a wrong key
/// and a tampered ciphertext are indistinguishable to callers.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Key derivation failed.
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// Encryption failed.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed - wrong key or corrupted data.
    #[error("Decryption failed")]
    Decryption,

    /// No master key is available.
    #[error("Locked")]
    Locked,
}

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

impl From<CryptoError> for jottery_core::Error {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::KeyDerivation(msg) => jottery_core::Error::KeyDerivation(msg),
            CryptoError::Encryption(msg) => jottery_core::Error::Internal(msg),
            CryptoError::Decryption => jottery_core::Error::Decrypt,
            CryptoError::Locked => jottery_core::Error::Locked,
        }
    }
}
