//! Error types for Jottery.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using Jottery's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Jottery operations.
///
/// Crypto verification failures collapse into the single opaque [`Error::Decrypt`]
/// variant: callers cannot distinguish a wrong key from corrupt ciphertext.
#[derive(Error, Debug)]
pub enum Error {
    /// The store has no encryption metadata yet.
    #[error("Store is not initialized")]
    NotInitialized,

    /// Encryption metadata already exists.
    #[error("Store is already initialized")]
    AlreadyInitialized,

    /// Unlock verification failed.
    #[error("Incorrect password")]
    IncorrectPassword,

    /// No master key is available.
    #[error("Locked")]
    Locked,

    /// Bad or missing bearer credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed (inactive client).
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Decryption failed: authentication tag mismatch or malformed envelope.
    #[error("Decryption failed")]
    Decrypt,

    /// Key derivation failed.
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Version bumped under an optimistic update.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The storage backend is unavailable (lock timeout, closed pool).
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The store was written by a newer schema than this build supports.
    #[error("Store schema version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: i64, supported: i64 },

    /// Transport-level failure talking to the sync server.
    #[error("Network error: {0}")]
    Network(String),

    /// The sync server answered with a 5xx.
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The sync server answered with something we could not interpret.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A sync pass is already running.
    #[error("Sync already in progress")]
    SyncInProgress,

    /// Sync is not configured or disabled.
    #[error("Sync is disabled")]
    SyncDisabled,

    /// The server rejected a pushed note.
    #[error("Push rejected for note {note_id}: {reason}")]
    PushRejected { note_id: Uuid, reason: String },

    /// Invalid input, with the offending field names.
    #[error("Invalid input: {}", fields.join(", "))]
    InvalidInput { fields: Vec<String> },

    /// Database operation failed (wraps sqlx::Error).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for single-field validation failures.
    pub fn invalid_field(field: impl Into<String>) -> Self {
        Error::InvalidInput {
            fields: vec![field.into()],
        }
    }

    /// Whether a retry (manual or the next auto-sync tick) may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::Server { .. } | Error::StorageUnavailable(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_locked() {
        assert_eq!(Error::Locked.to_string(), "Locked");
    }

    #[test]
    fn test_display_schema_too_new() {
        let err = Error::SchemaTooNew {
            found: 7,
            supported: 2,
        };
        assert!(err.to_string().contains('7'));
        assert!(err.to_string().contains('2'));
    }

    #[test]
    fn test_display_invalid_input_joins_fields() {
        let err = Error::InvalidInput {
            fields: vec!["endpoint".into(), "salt".into()],
        };
        assert_eq!(err.to_string(), "Invalid input: endpoint, salt");
    }

    #[test]
    fn test_decrypt_error_is_opaque() {
        // The message must not hint at key vs ciphertext.
        let msg = Error::Decrypt.to_string();
        assert!(!msg.to_lowercase().contains("key"));
        assert!(!msg.to_lowercase().contains("cipher"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::Network("timeout".into()).is_retryable());
        assert!(Error::Server {
            status: 503,
            message: "busy".into()
        }
        .is_retryable());
        assert!(!Error::Locked.is_retryable());
        assert!(!Error::IncorrectPassword.is_retryable());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
