//! Note repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use jottery_core::time::{fmt_ts, parse_opt_ts, parse_ts};
use jottery_core::{
    AttachmentRef, Envelope, Error, NoteRecord, NoteStore, Result, SyntaxLanguage,
};

const NOTE_COLUMNS: &str = "id, created_at, modified_at, synced_at, content, tags, attachments, \
     pinned, deleted, deleted_at, sync_hash, version, word_wrap, syntax_language";

/// SQLite implementation of [`NoteStore`].
///
/// Rows hold content and tags as envelope JSON; the store never sees a key.
pub struct SqliteNoteStore {
    pool: SqlitePool,
}

impl SqliteNoteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_note(row: &SqliteRow) -> Result<NoteRecord> {
        let id: String = row.try_get("id")?;
        let content: String = row.try_get("content")?;
        let tags: String = row.try_get("tags")?;
        let attachments: String = row.try_get("attachments")?;
        let syntax: String = row.try_get("syntax_language")?;
        let attachments: Vec<AttachmentRef> = serde_json::from_str(&attachments)?;

        Ok(NoteRecord {
            id: Uuid::parse_str(&id).map_err(|e| Error::Serialization(e.to_string()))?,
            created_at: parse_ts(&row.try_get::<String, _>("created_at")?)?,
            modified_at: parse_ts(&row.try_get::<String, _>("modified_at")?)?,
            synced_at: parse_opt_ts(row.try_get("synced_at")?)?,
            content: Envelope::from_json(&content)?,
            tags: Envelope::from_json(&tags)?,
            attachments,
            pinned: row.try_get::<i64, _>("pinned")? != 0,
            deleted: row.try_get::<i64, _>("deleted")? != 0,
            deleted_at: parse_opt_ts(row.try_get("deleted_at")?)?,
            sync_hash: row.try_get("sync_hash")?,
            version: row.try_get("version")?,
            word_wrap: row.try_get::<i64, _>("word_wrap")? != 0,
            syntax_language: syntax.parse::<SyntaxLanguage>().unwrap_or_default(),
        })
    }

    async fn fetch_list(&self, sql: &str) -> Result<Vec<NoteRecord>> {
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        rows.iter().map(Self::row_to_note).collect()
    }
}

#[async_trait]
impl NoteStore for SqliteNoteStore {
    async fn create(&self, note: &NoteRecord) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO notes ({NOTE_COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(note.id.to_string())
        .bind(fmt_ts(note.created_at))
        .bind(fmt_ts(note.modified_at))
        .bind(note.synced_at.map(fmt_ts))
        .bind(note.content.to_json()?)
        .bind(note.tags.to_json()?)
        .bind(serde_json::to_string(&note.attachments)?)
        .bind(note.pinned as i64)
        .bind(note.deleted as i64)
        .bind(note.deleted_at.map(fmt_ts))
        .bind(&note.sync_hash)
        .bind(note.version)
        .bind(note.word_wrap as i64)
        .bind(note.syntax_language.to_string())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<NoteRecord>> {
        let row = sqlx::query(&format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(Self::row_to_note).transpose()
    }

    async fn get_by_ids(&self, ids: &[Uuid]) -> Result<Vec<NoteRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE id IN ({placeholders}) \
             ORDER BY modified_at DESC"
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id.to_string());
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        rows.iter().map(Self::row_to_note).collect()
    }

    async fn get_all(&self) -> Result<Vec<NoteRecord>> {
        self.fetch_list(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes ORDER BY modified_at DESC"
        ))
        .await
    }

    async fn get_all_active(&self) -> Result<Vec<NoteRecord>> {
        self.fetch_list(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE deleted = 0 ORDER BY modified_at DESC"
        ))
        .await
    }

    async fn get_deleted(&self) -> Result<Vec<NoteRecord>> {
        self.fetch_list(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE deleted = 1 ORDER BY modified_at DESC"
        ))
        .await
    }

    async fn get_pinned(&self) -> Result<Vec<NoteRecord>> {
        self.fetch_list(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE pinned = 1 AND deleted = 0 \
             ORDER BY modified_at DESC"
        ))
        .await
    }

    async fn get_modified_after(&self, ts: DateTime<Utc>) -> Result<Vec<NoteRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE modified_at > ? ORDER BY modified_at DESC"
        ))
        .bind(fmt_ts(ts))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        rows.iter().map(Self::row_to_note).collect()
    }

    async fn first(&self) -> Result<Option<NoteRecord>> {
        let row = sqlx::query(&format!("SELECT {NOTE_COLUMNS} FROM notes LIMIT 1"))
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(Self::row_to_note).transpose()
    }

    async fn update(&self, note: &NoteRecord) -> Result<NoteRecord> {
        let stamped_at = Utc::now();
        let result = sqlx::query(
            "UPDATE notes SET \
                synced_at = ?, content = ?, tags = ?, attachments = ?, pinned = ?, \
                deleted = ?, deleted_at = ?, sync_hash = ?, word_wrap = ?, \
                syntax_language = ?, modified_at = ?, version = version + 1 \
             WHERE id = ?",
        )
        .bind(note.synced_at.map(fmt_ts))
        .bind(note.content.to_json()?)
        .bind(note.tags.to_json()?)
        .bind(serde_json::to_string(&note.attachments)?)
        .bind(note.pinned as i64)
        .bind(note.deleted as i64)
        .bind(note.deleted_at.map(fmt_ts))
        .bind(&note.sync_hash)
        .bind(note.word_wrap as i64)
        .bind(note.syntax_language.to_string())
        .bind(fmt_ts(stamped_at))
        .bind(note.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("note {}", note.id)));
        }
        self.get(note.id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("note {}", note.id)))
    }

    async fn apply_remote(&self, note: &NoteRecord) -> Result<()> {
        sqlx::query(&format!(
            "INSERT OR REPLACE INTO notes ({NOTE_COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(note.id.to_string())
        .bind(fmt_ts(note.created_at))
        .bind(fmt_ts(note.modified_at))
        .bind(note.synced_at.map(fmt_ts))
        .bind(note.content.to_json()?)
        .bind(note.tags.to_json()?)
        .bind(serde_json::to_string(&note.attachments)?)
        .bind(note.pinned as i64)
        .bind(note.deleted as i64)
        .bind(note.deleted_at.map(fmt_ts))
        .bind(&note.sync_hash)
        .bind(note.version)
        .bind(note.word_wrap as i64)
        .bind(note.syntax_language.to_string())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn soft_delete(&self, id: Uuid) -> Result<()> {
        let now = fmt_ts(Utc::now());
        let result = sqlx::query(
            "UPDATE notes SET deleted = 1, deleted_at = ?, modified_at = ?, \
             version = version + 1 WHERE id = ?",
        )
        .bind(&now)
        .bind(&now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("note {id}")));
        }
        Ok(())
    }

    async fn restore(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE notes SET deleted = 0, deleted_at = NULL, modified_at = ?, \
             version = version + 1 WHERE id = ?",
        )
        .bind(fmt_ts(Utc::now()))
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("note {id}")));
        }
        Ok(())
    }

    async fn purge(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM notes WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn touch(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE notes SET modified_at = ?, version = version + 1 WHERE id = ?",
        )
        .bind(fmt_ts(Utc::now()))
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("note {id}")));
        }
        Ok(())
    }

    async fn set_synced_at(&self, id: Uuid, ts: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE notes SET synced_at = ? WHERE id = ?")
            .bind(fmt_ts(ts))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn count_active(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notes WHERE deleted = 0")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(count)
    }

    async fn count_deleted(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notes WHERE deleted = 1")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(count)
    }
}
