//! Database initialization
//!
//! Creates the database file and schema on first run; reopening an
//! existing database is a no-op apart from the idempotent
//! `CREATE TABLE IF NOT EXISTS` statements.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Current schema version, recorded in the schema_version table.
///
/// Increment when adding a migration below.
const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Initialize database connection pool and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL allows concurrent readers while the pipeline writers commit
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    // Schema creation (idempotent - safe to call multiple times)
    create_schema_version_table(&pool).await?;
    create_log_entries_table(&pool).await?;
    create_entity_changed_messages_table(&pool).await?;

    record_schema_version(&pool).await?;

    Ok(pool)
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn record_schema_version(pool: &SqlitePool) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(CURRENT_SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the log_entries table
///
/// One row per audio-backed log entry. The processing_status column is
/// constrained to the pipeline state tokens; error columns record
/// partial failures as data rather than lost exceptions.
pub async fn create_log_entries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS log_entries (
            guid TEXT PRIMARY KEY,
            author_id TEXT NOT NULL,
            audio_file_id TEXT,
            processing_status TEXT NOT NULL DEFAULT 'pending'
                CHECK (processing_status IN ('pending', 'uploading', 'uploaded', 'transcribing', 'transcribed', 'enriching', 'completed', 'failed')),
            transcript TEXT,
            summary_text TEXT,
            title TEXT,
            category TEXT NOT NULL DEFAULT 'other'
                CHECK (category IN ('mission', 'operations', 'personal', 'research', 'other')),
            duration_seconds REAL,
            transcription_error TEXT,
            enrichment_error TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (duration_seconds IS NULL OR duration_seconds >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_log_entries_author ON log_entries(author_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_log_entries_author_updated ON log_entries(author_id, updated_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the entity_changed_messages table
///
/// Durable per-receiver notification queue. Rows are never deleted;
/// acknowledged_at is set exactly when status becomes 'acknowledged'.
pub async fn create_entity_changed_messages_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entity_changed_messages (
            guid TEXT PRIMARY KEY,
            entity_id TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            changed_by_user_id TEXT NOT NULL,
            receiver_user_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'acknowledged')),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            acknowledged_at TIMESTAMP,
            CHECK ((status = 'acknowledged') = (acknowledged_at IS NOT NULL))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_messages_receiver ON entity_changed_messages(receiver_user_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_messages_receiver_status ON entity_changed_messages(receiver_user_id, status)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_messages_entity ON entity_changed_messages(entity_id, entity_type)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_messages_created_at ON entity_changed_messages(created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
