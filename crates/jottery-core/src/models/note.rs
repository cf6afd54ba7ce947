//! Note and attachment entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;
use crate::models::encryption::Envelope;

/// Syntax highlighting hint carried with a note. Not secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyntaxLanguage {
    Plain,
    Javascript,
    Python,
    Markdown,
    Json,
    Html,
    Css,
    Sql,
    Bash,
}

impl Default for SyntaxLanguage {
    fn default() -> Self {
        Self::Plain
    }
}

impl std::fmt::Display for SyntaxLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Plain => "plain",
            Self::Javascript => "javascript",
            Self::Python => "python",
            Self::Markdown => "markdown",
            Self::Json => "json",
            Self::Html => "html",
            Self::Css => "css",
            Self::Sql => "sql",
            Self::Bash => "bash",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for SyntaxLanguage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_lowercase().as_str() {
            "plain" | "" => Ok(Self::Plain),
            "javascript" | "js" => Ok(Self::Javascript),
            "python" | "py" => Ok(Self::Python),
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "html" => Ok(Self::Html),
            "css" => Ok(Self::Css),
            "sql" => Ok(Self::Sql),
            "bash" | "sh" => Ok(Self::Bash),
            _ => Err(Error::invalid_field("syntax_language")),
        }
    }
}

/// Reference from a note to an encrypted attachment blob.
///
/// The filename is encrypted; mime type and size are cleartext. The blob
/// and thumbnail handles resolve through the attachment store while the
/// note is not purged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    pub id: Uuid,
    pub filename: Envelope,
    pub mime_type: String,
    pub size: i64,
    pub blob_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_id: Option<Uuid>,
}

/// A note as the local store holds it: content and tags are opaque
/// envelopes, everything else is cleartext bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Set when the server last acknowledged this note.
    pub synced_at: Option<DateTime<Utc>>,
    pub content: Envelope,
    /// Encrypted JSON array of tag strings.
    pub tags: Envelope,
    pub attachments: Vec<AttachmentRef>,
    pub pinned: bool,
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    /// SHA-256 fingerprint of the content ciphertext, for conflict detection.
    pub sync_hash: Option<String>,
    /// Monotone client version counter, >= 1, bumped on every mutation.
    pub version: i64,
    pub word_wrap: bool,
    pub syntax_language: SyntaxLanguage,
}

/// A note after the service has crossed the decryption boundary.
///
/// `decrypted_at` exists purely for cache aging and is never persisted.
#[derive(Debug, Clone)]
pub struct DecryptedNote {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub synced_at: Option<DateTime<Utc>>,
    pub content: String,
    pub tags: Vec<String>,
    pub attachments: Vec<AttachmentRef>,
    pub pinned: bool,
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub word_wrap: bool,
    pub syntax_language: SyntaxLanguage,
    pub decrypted_at: DateTime<Utc>,
}

impl DecryptedNote {
    /// First line of the content, used by the alphabetical sort order.
    pub fn first_line(&self) -> &str {
        self.content.lines().next().unwrap_or("").trim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_language_parse_aliases() {
        assert_eq!("js".parse::<SyntaxLanguage>().unwrap(), SyntaxLanguage::Javascript);
        assert_eq!("py".parse::<SyntaxLanguage>().unwrap(), SyntaxLanguage::Python);
        assert_eq!("md".parse::<SyntaxLanguage>().unwrap(), SyntaxLanguage::Markdown);
        assert_eq!("sh".parse::<SyntaxLanguage>().unwrap(), SyntaxLanguage::Bash);
        assert_eq!("".parse::<SyntaxLanguage>().unwrap(), SyntaxLanguage::Plain);
    }

    #[test]
    fn test_syntax_language_parse_rejects_unknown() {
        assert!("cobol".parse::<SyntaxLanguage>().is_err());
    }

    #[test]
    fn test_syntax_language_display_roundtrip() {
        for lang in [
            SyntaxLanguage::Plain,
            SyntaxLanguage::Sql,
            SyntaxLanguage::Markdown,
        ] {
            assert_eq!(lang.to_string().parse::<SyntaxLanguage>().unwrap(), lang);
        }
    }

    #[test]
    fn test_first_line() {
        let note = DecryptedNote {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            modified_at: Utc::now(),
            synced_at: None,
            content: "  Shopping list  \nmilk\neggs".to_string(),
            tags: vec![],
            attachments: vec![],
            pinned: false,
            deleted: false,
            deleted_at: None,
            version: 1,
            word_wrap: true,
            syntax_language: SyntaxLanguage::Plain,
            decrypted_at: Utc::now(),
        };
        assert_eq!(note.first_line(), "Shopping list");
    }
}
