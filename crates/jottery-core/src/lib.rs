//! # jottery-core
//!
//! Shared foundation for the Jottery end-to-end-encrypted note system:
//!
//! - Entity models (notes, attachments, encryption and sync metadata)
//! - The wire protocol spoken between the sync engine and the server
//! - Repository traits the local store backends implement
//! - The error taxonomy and `Result` alias
//! - Centralized defaults and structured-logging field constants
//!
//! The server stores only opaque, client-encrypted blobs; everything that
//! can interpret content lives behind the crypto envelope in
//! `jottery-crypto` and the note service in `jottery-client`.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod time;
pub mod traits;
pub mod wire;

pub use error::{Error, Result};
pub use models::{
    ApiKey, AttachmentRef, DecryptedNote, EncryptionAlgorithm, EncryptionMetadata, Envelope,
    NoteRecord, NoteSyncState, SettingsPatch, SortOrder, SyncMetadata, SyncMetadataPatch,
    SyncStatus, SyntaxLanguage, UserSettings,
};
pub use traits::{AttachmentStore, EncryptionStore, NoteStore, SettingsStore, SyncStore};
pub use wire::{
    DeviceType, PullRequest, PullResponse, PushAccepted, PushRejected, PushRequest, PushResponse,
    RegisterRequest, RegisterResponse, SyncBlob, SyncCredentials, SyncDeletion,
    SyncStatusResponse, WireNote,
};
