//! Entity models for Jottery.

pub mod encryption;
pub mod note;
pub mod settings;
pub mod sync;

pub use encryption::{EncryptionAlgorithm, EncryptionMetadata, Envelope};
pub use note::{AttachmentRef, DecryptedNote, NoteRecord, SyntaxLanguage};
pub use settings::{SettingsPatch, SortOrder, UserSettings};
pub use sync::{ApiKey, NoteSyncState, SyncMetadata, SyncMetadataPatch, SyncStatus};
