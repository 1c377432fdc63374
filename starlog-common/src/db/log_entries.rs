//! Log entry database queries

use crate::db::models::{LogCategory, LogEntry, ProcessingStatus};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Insert or update a log entry (upsert keyed on guid)
pub async fn upsert(db: &SqlitePool, entry: &LogEntry) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO log_entries (
            guid, author_id, audio_file_id, processing_status,
            transcript, summary_text, title, category, duration_seconds,
            transcription_error, enrichment_error, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(guid) DO UPDATE SET
            author_id = excluded.author_id,
            audio_file_id = excluded.audio_file_id,
            processing_status = excluded.processing_status,
            transcript = excluded.transcript,
            summary_text = excluded.summary_text,
            title = excluded.title,
            category = excluded.category,
            duration_seconds = excluded.duration_seconds,
            transcription_error = excluded.transcription_error,
            enrichment_error = excluded.enrichment_error,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(entry.id.to_string())
    .bind(&entry.author_id)
    .bind(entry.audio_file_id.map(|id| id.to_string()))
    .bind(entry.processing_status.as_str())
    .bind(&entry.transcript)
    .bind(&entry.summary_text)
    .bind(&entry.title)
    .bind(entry.category.as_str())
    .bind(entry.duration_seconds)
    .bind(&entry.transcription_error)
    .bind(&entry.enrichment_error)
    .bind(entry.created_at)
    .bind(entry.updated_at)
    .execute(db)
    .await?;

    Ok(())
}

/// Get a log entry by id
pub async fn find_by_id(db: &SqlitePool, id: Uuid) -> Result<Option<LogEntry>> {
    let row = sqlx::query("SELECT * FROM log_entries WHERE guid = ?")
        .bind(id.to_string())
        .fetch_optional(db)
        .await?;

    row.map(entry_from_row).transpose()
}

/// Get a log entry by id, scoped to its author
pub async fn find_by_id_and_author(
    db: &SqlitePool,
    id: Uuid,
    author_id: &str,
) -> Result<Option<LogEntry>> {
    let row = sqlx::query("SELECT * FROM log_entries WHERE guid = ? AND author_id = ?")
        .bind(id.to_string())
        .bind(author_id)
        .fetch_optional(db)
        .await?;

    row.map(entry_from_row).transpose()
}

/// List an author's entries, most recently updated first
pub async fn list_for_author(
    db: &SqlitePool,
    author_id: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<LogEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM log_entries
        WHERE author_id = ?
        ORDER BY updated_at DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(author_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;

    rows.into_iter().map(entry_from_row).collect()
}

/// Total number of entries for an author
pub async fn count_for_author(db: &SqlitePool, author_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM log_entries WHERE author_id = ?")
        .bind(author_id)
        .fetch_one(db)
        .await?;

    Ok(count)
}

fn entry_from_row(row: SqliteRow) -> Result<LogEntry> {
    let id = parse_uuid(row.get::<String, _>("guid"))?;
    let audio_file_id = row
        .get::<Option<String>, _>("audio_file_id")
        .map(parse_uuid)
        .transpose()?;

    let status_token: String = row.get("processing_status");
    let processing_status = ProcessingStatus::from_str(&status_token)
        .ok_or_else(|| Error::Internal(format!("unknown processing status: {status_token}")))?;

    let category_token: String = row.get("category");
    let category = LogCategory::from_str(&category_token)
        .ok_or_else(|| Error::Internal(format!("unknown log category: {category_token}")))?;

    Ok(LogEntry {
        id,
        author_id: row.get("author_id"),
        audio_file_id,
        processing_status,
        transcript: row.get("transcript"),
        summary_text: row.get("summary_text"),
        title: row.get("title"),
        category,
        duration_seconds: row.get("duration_seconds"),
        transcription_error: row.get("transcription_error"),
        enrichment_error: row.get("enrichment_error"),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        updated_at: row.get::<DateTime<Utc>, _>("updated_at"),
    })
}

fn parse_uuid(s: String) -> Result<Uuid> {
    Uuid::parse_str(&s).map_err(|e| Error::Internal(format!("corrupt uuid {s}: {e}")))
}
