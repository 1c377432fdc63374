//! Log entry service
//!
//! The entity-mutation collaborator for log entries: persists upserts,
//! publishes the change to the interested receivers, and schedules a
//! pipeline run whenever an upsert lands in the uploaded state.

use crate::messaging::ChangeNotifier;
use crate::pipeline::PipelineRunner;
use chrono::Utc;
use sqlx::SqlitePool;
use starlog_common::db::log_entries;
use starlog_common::db::models::{LogCategory, LogEntry, ProcessingStatus};
use starlog_common::events::EntityType;
use starlog_common::{Error, Result};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Status values a client may submit on upsert.
///
/// The remaining pipeline states are orchestrator-owned and cannot be
/// written from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertStatus {
    Pending,
    Uploading,
    Uploaded,
}

impl UpsertStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(UpsertStatus::Pending),
            "uploading" => Some(UpsertStatus::Uploading),
            "uploaded" => Some(UpsertStatus::Uploaded),
            _ => None,
        }
    }

    pub fn to_processing_status(self) -> ProcessingStatus {
        match self {
            UpsertStatus::Pending => ProcessingStatus::Pending,
            UpsertStatus::Uploading => ProcessingStatus::Uploading,
            UpsertStatus::Uploaded => ProcessingStatus::Uploaded,
        }
    }
}

/// Client-supplied upsert payload, already validated by the API layer
#[derive(Debug, Clone)]
pub struct UpsertLogEntry {
    pub id: Uuid,
    pub audio_file_id: Option<Uuid>,
    pub status: UpsertStatus,
    pub title: Option<String>,
    pub category: Option<LogCategory>,
    pub duration_seconds: Option<f64>,
}

pub struct LogEntryService {
    db: SqlitePool,
    notifier: Arc<dyn ChangeNotifier>,
    pipeline: Arc<PipelineRunner>,
}

impl LogEntryService {
    pub fn new(
        db: SqlitePool,
        notifier: Arc<dyn ChangeNotifier>,
        pipeline: Arc<PipelineRunner>,
    ) -> Self {
        Self {
            db,
            notifier,
            pipeline,
        }
    }

    /// Insert or update a log entry on behalf of the requester.
    ///
    /// Pipeline-owned fields (transcript, summary, errors) are carried
    /// over from the existing row untouched; an upsert that lands in
    /// uploaded state schedules a background pipeline run, including a
    /// re-upsert of a previously failed or completed entry.
    pub async fn upsert(&self, requester_id: &str, input: UpsertLogEntry) -> Result<LogEntry> {
        let existing = log_entries::find_by_id(&self.db, input.id).await?;

        if let Some(existing) = &existing {
            if existing.author_id != requester_id {
                return Err(Error::Unauthorized(format!(
                    "user {requester_id} cannot modify log entry {}",
                    input.id
                )));
            }
        }

        let now = Utc::now();
        let entry = match existing {
            Some(existing) => LogEntry {
                id: existing.id,
                author_id: existing.author_id,
                audio_file_id: input.audio_file_id.or(existing.audio_file_id),
                processing_status: input.status.to_processing_status(),
                transcript: existing.transcript,
                summary_text: existing.summary_text,
                title: input.title.or(existing.title),
                category: input.category.unwrap_or(existing.category),
                duration_seconds: input.duration_seconds.or(existing.duration_seconds),
                transcription_error: existing.transcription_error,
                enrichment_error: existing.enrichment_error,
                created_at: existing.created_at,
                updated_at: now,
            },
            None => LogEntry {
                id: input.id,
                author_id: requester_id.to_string(),
                audio_file_id: input.audio_file_id,
                processing_status: input.status.to_processing_status(),
                transcript: None,
                summary_text: None,
                title: input.title,
                category: input.category.unwrap_or(LogCategory::Other),
                duration_seconds: input.duration_seconds,
                transcription_error: None,
                enrichment_error: None,
                created_at: now,
                updated_at: now,
            },
        };

        log_entries::upsert(&self.db, &entry).await?;

        // Acting user plus the owner, if different
        let receivers = vec![entry.author_id.clone(), requester_id.to_string()];
        self.notifier
            .publish(entry.id, EntityType::LogEntry, requester_id, &receivers)
            .await?;

        if entry.processing_status == ProcessingStatus::Uploaded {
            info!(entry_id = %entry.id, "triggering background processing");
            self.pipeline.schedule(entry.id);
        }

        Ok(entry)
    }

    /// Owner-scoped fetch; a foreign entry reads as missing
    pub async fn get(&self, requester_id: &str, id: Uuid) -> Result<LogEntry> {
        log_entries::find_by_id_and_author(&self.db, id, requester_id)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("log entry {id} not found for user {requester_id}"))
            })
    }

    /// Owner-scoped listing, most recently updated first
    pub async fn list(
        &self,
        requester_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<LogEntry>, i64)> {
        if !(1..=100).contains(&limit) {
            return Err(Error::Validation(format!(
                "limit must be between 1 and 100, got {limit}"
            )));
        }
        if offset < 0 {
            return Err(Error::Validation(format!(
                "offset must be >= 0, got {offset}"
            )));
        }

        let entries = log_entries::list_for_author(&self.db, requester_id, limit, offset).await?;
        let total = log_entries::count_for_author(&self.db, requester_id).await?;
        Ok((entries, total))
    }
}
