//! User settings, stored unencrypted in the local store.

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::{Error, Result};
use crate::models::note::SyntaxLanguage;

/// Sort options for a note list. Pinned notes always precede unpinned
/// ones; the order applies within each group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Most recently modified first.
    Recent,
    /// Oldest modified first.
    Oldest,
    /// Alphabetical by first line of content, case-folded.
    Alpha,
    /// Most recently created first.
    Created,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self::Recent
    }
}

/// User application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    pub sort_order: SortOrder,
    /// Minutes of inactivity before auto-lock.
    pub auto_lock_minutes: i64,
    /// Minutes between automatic sync passes.
    pub auto_sync_interval_minutes: i64,
    /// Days a soft-deleted note is retained before purge.
    pub purge_retention_days: i64,
    /// Default word-wrap hint for new notes.
    pub word_wrap: bool,
    /// Default syntax hint for new notes.
    pub syntax_language: SyntaxLanguage,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            sort_order: SortOrder::Recent,
            auto_lock_minutes: defaults::AUTO_LOCK_MINUTES as i64,
            auto_sync_interval_minutes: defaults::AUTO_SYNC_INTERVAL_MINUTES,
            purge_retention_days: defaults::PURGE_RETENTION_DAYS,
            word_wrap: true,
            syntax_language: SyntaxLanguage::Plain,
        }
    }
}

impl UserSettings {
    pub fn validate(&self) -> Result<()> {
        let mut fields = Vec::new();
        if self.auto_lock_minutes < defaults::AUTO_LOCK_MIN_MINUTES
            || self.auto_lock_minutes > defaults::AUTO_LOCK_MAX_MINUTES
        {
            fields.push("auto_lock_minutes".to_string());
        }
        if self.auto_sync_interval_minutes < 1 {
            fields.push("auto_sync_interval_minutes".to_string());
        }
        if self.purge_retention_days < 1 {
            fields.push("purge_retention_days".to_string());
        }
        if fields.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidInput { fields })
        }
    }
}

/// Partial update for settings; `None` leaves a field as is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsPatch {
    pub sort_order: Option<SortOrder>,
    pub auto_lock_minutes: Option<i64>,
    pub auto_sync_interval_minutes: Option<i64>,
    pub purge_retention_days: Option<i64>,
    pub word_wrap: Option<bool>,
    pub syntax_language: Option<SyntaxLanguage>,
}

impl SettingsPatch {
    pub fn apply(self, mut settings: UserSettings) -> UserSettings {
        if let Some(v) = self.sort_order {
            settings.sort_order = v;
        }
        if let Some(v) = self.auto_lock_minutes {
            settings.auto_lock_minutes = v;
        }
        if let Some(v) = self.auto_sync_interval_minutes {
            settings.auto_sync_interval_minutes = v;
        }
        if let Some(v) = self.purge_retention_days {
            settings.purge_retention_days = v;
        }
        if let Some(v) = self.word_wrap {
            settings.word_wrap = v;
        }
        if let Some(v) = self.syntax_language {
            settings.syntax_language = v;
        }
        settings
    }
}
