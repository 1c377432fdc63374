//! Pipeline orchestrator
//!
//! Coordinates the transcription and enrichment steps for one log
//! entry, persisting each state transition and emitting a change event
//! to the owner after every persisted write. Runs execute on a
//! semaphore-bounded background pool; the scheduling call never waits.

use crate::ai::{Enricher, Transcriber};
use crate::messaging::ChangeNotifier;
use crate::pipeline::{enrich, transcribe};
use crate::storage::AudioStore;
use chrono::Utc;
use sqlx::SqlitePool;
use starlog_common::db::log_entries;
use starlog_common::db::models::{LogEntry, ProcessingStatus};
use starlog_common::events::EntityType;
use starlog_common::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub struct PipelineRunner {
    db: SqlitePool,
    audio_store: Arc<dyn AudioStore>,
    transcriber: Arc<dyn Transcriber>,
    enricher: Arc<dyn Enricher>,
    notifier: Arc<dyn ChangeNotifier>,
    permits: Arc<Semaphore>,
    call_timeout: Duration,
}

impl PipelineRunner {
    pub fn new(
        db: SqlitePool,
        audio_store: Arc<dyn AudioStore>,
        transcriber: Arc<dyn Transcriber>,
        enricher: Arc<dyn Enricher>,
        notifier: Arc<dyn ChangeNotifier>,
        max_concurrent_runs: usize,
        call_timeout: Duration,
    ) -> Self {
        Self {
            db,
            audio_store,
            transcriber,
            enricher,
            notifier,
            permits: Arc::new(Semaphore::new(max_concurrent_runs.max(1))),
            call_timeout,
        }
    }

    /// Fire-and-forget: queue a pipeline run for the entry.
    ///
    /// Returns immediately; the run waits for a pool permit and then
    /// executes on a background task.
    pub fn schedule(self: &Arc<Self>, entry_id: Uuid) {
        let runner = Arc::clone(self);
        tokio::spawn(async move {
            let _permit = match runner.permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return, // pool shut down
            };
            runner.run(entry_id).await;
        });
    }

    /// Execute one pipeline run to a terminal state.
    ///
    /// Never returns an error: anything [`process`](Self::process) could
    /// not capture as entry data is caught here and persisted as a
    /// FAILED entry with the error text in `enrichment_error`.
    pub async fn run(&self, entry_id: Uuid) {
        if let Err(e) = self.process(entry_id).await {
            error!(%entry_id, "pipeline run failed: {e}");
            self.mark_failed(entry_id, &e).await;
        }
    }

    async fn process(&self, entry_id: Uuid) -> Result<()> {
        info!(%entry_id, "starting pipeline run");

        let entry = log_entries::find_by_id(&self.db, entry_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("log entry not found: {entry_id}")))?;

        // Best-effort duplicate-trigger guard. A narrow race remains
        // between this check and the first write below.
        if entry.processing_status != ProcessingStatus::Uploaded {
            warn!(
                %entry_id,
                status = %entry.processing_status,
                "entry not in uploaded status, skipping"
            );
            return Ok(());
        }

        let entry = self
            .advance(entry, ProcessingStatus::Transcribing)
            .await?;

        let previous = entry.processing_status;
        let entry = transcribe::run(
            self.audio_store.as_ref(),
            self.transcriber.as_ref(),
            self.call_timeout,
            entry,
        )
        .await;
        let entry = self.persist_and_emit(previous, entry).await?;

        if entry.transcription_error.is_some() {
            error!(
                %entry_id,
                error = entry.transcription_error.as_deref().unwrap_or_default(),
                "transcription failed"
            );
            self.advance(entry, ProcessingStatus::Failed).await?;
            return Ok(());
        }

        let entry = self.advance(entry, ProcessingStatus::Enriching).await?;

        let previous = entry.processing_status;
        let entry = enrich::run(self.enricher.as_ref(), self.call_timeout, entry).await;
        let entry = self.persist_and_emit(previous, entry).await?;

        if entry.enrichment_error.is_some() {
            error!(
                %entry_id,
                error = entry.enrichment_error.as_deref().unwrap_or_default(),
                "enrichment failed"
            );
            self.advance(entry, ProcessingStatus::Failed).await?;
            return Ok(());
        }

        info!(%entry_id, "pipeline run completed");
        Ok(())
    }

    /// Guarded status transition: persist + emit
    async fn advance(&self, mut entry: LogEntry, next: ProcessingStatus) -> Result<LogEntry> {
        let previous = entry.processing_status;
        entry.processing_status = next;
        self.persist_and_emit(previous, entry).await
    }

    /// Persist the entry and notify the owner.
    ///
    /// When the status changed, the transition must be allowed by the
    /// state machine table; an illegal transition aborts the run.
    async fn persist_and_emit(
        &self,
        previous: ProcessingStatus,
        mut entry: LogEntry,
    ) -> Result<LogEntry> {
        let next = entry.processing_status;
        if next != previous && !previous.can_transition_to(next) {
            return Err(Error::Internal(format!(
                "illegal status transition {previous} -> {next} for entry {}",
                entry.id
            )));
        }

        entry.updated_at = Utc::now();
        log_entries::upsert(&self.db, &entry).await?;
        if next != previous {
            debug!(entry_id = %entry.id, status = %next, "persisted status transition");
        }

        self.emit(&entry).await?;
        Ok(entry)
    }

    async fn emit(&self, entry: &LogEntry) -> Result<()> {
        self.notifier
            .publish(
                entry.id,
                EntityType::LogEntry,
                &entry.author_id,
                std::slice::from_ref(&entry.author_id),
            )
            .await?;
        Ok(())
    }

    /// Catch-all failure path: force the entry to FAILED with the error
    /// text recorded, then emit a terminal notification. Errors here
    /// can only be logged.
    async fn mark_failed(&self, entry_id: Uuid, error: &Error) {
        let entry = match log_entries::find_by_id(&self.db, entry_id).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                warn!(%entry_id, "cannot mark missing entry as failed");
                return;
            }
            Err(e) => {
                error!(%entry_id, "failed to load entry for failure handling: {e}");
                return;
            }
        };

        let failed = LogEntry {
            processing_status: ProcessingStatus::Failed,
            enrichment_error: Some(error.to_string()),
            updated_at: Utc::now(),
            ..entry
        };

        if let Err(e) = log_entries::upsert(&self.db, &failed).await {
            error!(%entry_id, "failed to persist pipeline failure: {e}");
            return;
        }
        info!(%entry_id, "marked entry as failed: {error}");

        if let Err(e) = self.emit(&failed).await {
            error!(%entry_id, "failed to emit failure notification: {e}");
        }
    }
}
