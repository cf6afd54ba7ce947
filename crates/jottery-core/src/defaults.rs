//! Centralized default constants for the Jottery system.
//!
//! **This module is the single source of truth** for all shared default
//! values. Crates reference these constants instead of defining their own
//! magic numbers.

// =============================================================================
// KEY DERIVATION
// =============================================================================

/// PBKDF2-HMAC-SHA256 iteration count used at store initialization.
///
/// Stored in encryption metadata; readers must honor whatever the store
/// carries, this is only the value written by a fresh init.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Minimum acceptable iteration count for imported or stored metadata.
pub const PBKDF2_MIN_ITERATIONS: u32 = 100_000;

/// Key derivation salt length in bytes.
pub const SALT_LEN: usize = 32;

/// Derived key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// AES-GCM nonce length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// Algorithm tag recorded in encryption metadata.
pub const ALGORITHM_TAG: &str = "AES-256-GCM";

// =============================================================================
// KEY LIFECYCLE
// =============================================================================

/// Minutes of inactivity before the master key is zeroized.
pub const AUTO_LOCK_MINUTES: u64 = 15;

/// Inclusive bounds for a user-configured auto-lock timeout.
pub const AUTO_LOCK_MIN_MINUTES: i64 = 1;
pub const AUTO_LOCK_MAX_MINUTES: i64 = 1440;

// =============================================================================
// SYNC
// =============================================================================

/// Minutes between automatic sync passes.
pub const AUTO_SYNC_INTERVAL_MINUTES: i64 = 5;

/// Days a soft-deleted note is retained before automatic purge.
pub const PURGE_RETENTION_DAYS: i64 = 30;

/// Length of a server-issued API key in hex characters (32 random bytes).
pub const API_KEY_HEX_LEN: usize = 64;

/// Storage prefix marking a plaintext API key awaiting re-encryption
/// after a credential import. Representation-level only; in-memory code
/// uses the `ApiKey` enum.
pub const IMPORT_SENTINEL: &str = "IMPORT:";

// =============================================================================
// SERVER
// =============================================================================

/// Default listen port for the sync server.
pub const SERVER_PORT: u16 = 3030;

/// Default maximum request payload size in bytes (10 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Default server database location.
pub const SERVER_DATABASE_URL: &str = "sqlite:jottery.db?mode=rwc";

/// Seconds a writer waits for the SQLite write lock before giving up.
pub const BUSY_TIMEOUT_SECS: u64 = 5;
