//! Structured logging schema and field name constants for Jottery.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized field names across
//! every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across a request. Format: UUIDv7 (time-ordered).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "server", "sync", "store", "crypto", "service"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "push", "pull", "key_manager", "pool", "auto_lock"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "register", "sync_now", "purge_old", "unlock"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Note UUID being operated on.
pub const NOTE_ID: &str = "note_id";

/// Registered client UUID.
pub const CLIENT_ID: &str = "client_id";

/// Attachment blob UUID.
pub const BLOB_ID: &str = "blob_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of notes touched by an operation.
pub const NOTE_COUNT: &str = "note_count";

/// Number of attachment blobs touched by an operation.
pub const BLOB_COUNT: &str = "blob_count";

/// Number of notes the server accepted in a push.
pub const ACCEPTED_COUNT: &str = "accepted_count";

/// Number of notes the server rejected in a push.
pub const REJECTED_COUNT: &str = "rejected_count";
