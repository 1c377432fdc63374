//! Log entry service tests
//!
//! Covers the mutation path end to end: upsert persists, publishes to
//! the interested receivers, and fires the background pipeline exactly
//! when an upsert lands in uploaded state.

use async_trait::async_trait;
use sqlx::SqlitePool;
use starlog_common::db::models::{LogCategory, ProcessingStatus};
use starlog_common::db::{init_database, log_entries, messages};
use starlog_common::{Error, Result};
use starlog_server::ai::{CapabilityError, Enricher, EnrichmentProposal, Transcriber};
use starlog_server::logbook::{LogEntryService, UpsertLogEntry, UpsertStatus};
use starlog_server::messaging::{DeliveryService, MessageFanout};
use starlog_server::pipeline::PipelineRunner;
use starlog_server::storage::AudioStore;
use starlog_server::ws::ConnectionRegistry;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

struct FixedAudio;

#[async_trait]
impl AudioStore for FixedAudio {
    async fn fetch(&self, _owner_id: &str, _file_id: Uuid) -> Result<Vec<u8>> {
        Ok(b"aac bytes".to_vec())
    }
}

struct FixedTranscript;

#[async_trait]
impl Transcriber for FixedTranscript {
    async fn transcribe(&self, _audio: &[u8]) -> std::result::Result<String, CapabilityError> {
        Ok("Captain's log, stardate 4523.3.".to_string())
    }
}

struct FixedEnrichment;

#[async_trait]
impl Enricher for FixedEnrichment {
    async fn enrich(
        &self,
        _transcript: &str,
    ) -> std::result::Result<EnrichmentProposal, CapabilityError> {
        Ok(EnrichmentProposal {
            title: "Tribble inventory".to_string(),
            summary: "Storage compartments overrun.".to_string(),
            category: LogCategory::Operations,
        })
    }
}

async fn service(db: &SqlitePool) -> LogEntryService {
    let registry = Arc::new(ConnectionRegistry::new());
    let notifier = Arc::new(MessageFanout::new(
        db.clone(),
        DeliveryService::new(registry),
    ));
    let pipeline = Arc::new(PipelineRunner::new(
        db.clone(),
        Arc::new(FixedAudio),
        Arc::new(FixedTranscript),
        Arc::new(FixedEnrichment),
        notifier.clone(),
        2,
        Duration::from_millis(200),
    ));
    LogEntryService::new(db.clone(), notifier, pipeline)
}

async fn test_db() -> (TempDir, SqlitePool) {
    let dir = tempfile::tempdir().expect("tempdir");
    let pool = init_database(&dir.path().join("starlog.db"))
        .await
        .expect("init_database");
    (dir, pool)
}

fn upsert_input(id: Uuid, status: UpsertStatus, audio: Option<Uuid>) -> UpsertLogEntry {
    UpsertLogEntry {
        id,
        audio_file_id: audio,
        status,
        title: None,
        category: None,
        duration_seconds: None,
    }
}

/// Wait for the background pipeline to reach a terminal state
async fn wait_for_terminal(db: &SqlitePool, id: Uuid) -> ProcessingStatus {
    for _ in 0..200 {
        let entry = log_entries::find_by_id(db, id)
            .await
            .expect("find")
            .expect("entry");
        if entry.processing_status.is_terminal() {
            return entry.processing_status;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("pipeline never reached a terminal state");
}

#[tokio::test]
async fn pending_upsert_persists_and_notifies_without_pipeline() {
    let (_dir, db) = test_db().await;
    let service = service(&db).await;
    let id = Uuid::new_v4();

    let entry = service
        .upsert("kirk", upsert_input(id, UpsertStatus::Pending, None))
        .await
        .expect("upsert");

    assert_eq!(entry.processing_status, ProcessingStatus::Pending);
    assert_eq!(entry.author_id, "kirk");

    // One change message for the author; no pipeline activity
    let pending = messages::pending_for_receiver(&db, "kirk")
        .await
        .expect("pending");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].entity_id, id);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let stored = log_entries::find_by_id(&db, id)
        .await
        .expect("find")
        .expect("entry");
    assert_eq!(stored.processing_status, ProcessingStatus::Pending);
}

#[tokio::test]
async fn uploaded_upsert_runs_pipeline_to_completion() {
    let (_dir, db) = test_db().await;
    let service = service(&db).await;
    let id = Uuid::new_v4();

    service
        .upsert(
            "kirk",
            upsert_input(id, UpsertStatus::Uploaded, Some(Uuid::new_v4())),
        )
        .await
        .expect("upsert");

    let terminal = wait_for_terminal(&db, id).await;
    assert_eq!(terminal, ProcessingStatus::Completed);

    let done = log_entries::find_by_id(&db, id)
        .await
        .expect("find")
        .expect("entry");
    assert_eq!(done.title.as_deref(), Some("Tribble inventory"));
    assert_eq!(done.category, LogCategory::Operations);

    // The terminal status is persisted before its notification; give the
    // run a moment to finish emitting.
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Upsert notification plus one per persisted pipeline transition
    let pending = messages::pending_for_receiver(&db, "kirk")
        .await
        .expect("pending");
    assert_eq!(pending.len(), 5);
}

#[tokio::test]
async fn reupserting_failed_entry_reenters_pipeline() {
    let (_dir, db) = test_db().await;
    let service = service(&db).await;
    let id = Uuid::new_v4();

    // First run fails: no audio reference
    service
        .upsert("kirk", upsert_input(id, UpsertStatus::Uploaded, None))
        .await
        .expect("upsert");
    assert_eq!(wait_for_terminal(&db, id).await, ProcessingStatus::Failed);

    // Re-upsert with audio resets to uploaded and runs again
    service
        .upsert(
            "kirk",
            upsert_input(id, UpsertStatus::Uploaded, Some(Uuid::new_v4())),
        )
        .await
        .expect("re-upsert");
    assert_eq!(wait_for_terminal(&db, id).await, ProcessingStatus::Completed);
}

#[tokio::test]
async fn foreign_upsert_is_rejected() {
    let (_dir, db) = test_db().await;
    let service = service(&db).await;
    let id = Uuid::new_v4();

    service
        .upsert("kirk", upsert_input(id, UpsertStatus::Pending, None))
        .await
        .expect("upsert");

    let result = service
        .upsert("intruder", upsert_input(id, UpsertStatus::Pending, None))
        .await;
    assert!(matches!(result, Err(Error::Unauthorized(_))));
}

#[tokio::test]
async fn foreign_get_reads_as_not_found() {
    let (_dir, db) = test_db().await;
    let service = service(&db).await;
    let id = Uuid::new_v4();

    service
        .upsert("kirk", upsert_input(id, UpsertStatus::Pending, None))
        .await
        .expect("upsert");

    assert!(matches!(
        service.get("intruder", id).await,
        Err(Error::NotFound(_))
    ));
    assert!(service.get("kirk", id).await.is_ok());
}

#[tokio::test]
async fn list_validates_limit_and_orders_by_recency() {
    let (_dir, db) = test_db().await;
    let service = service(&db).await;

    assert!(matches!(
        service.list("kirk", 0, 0).await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        service.list("kirk", 101, 0).await,
        Err(Error::Validation(_))
    ));

    let first = Uuid::new_v4();
    let second = Uuid::new_v4();
    service
        .upsert("kirk", upsert_input(first, UpsertStatus::Pending, None))
        .await
        .expect("first");
    tokio::time::sleep(Duration::from_millis(10)).await;
    service
        .upsert("kirk", upsert_input(second, UpsertStatus::Pending, None))
        .await
        .expect("second");

    let (entries, total) = service.list("kirk", 20, 0).await.expect("list");
    assert_eq!(total, 2);
    assert_eq!(entries[0].id, second, "most recently updated first");
    assert_eq!(entries[1].id, first);
}
