//! Enrichment step
//!
//! Same contract as transcription: failures land in `enrichment_error`,
//! success fills title/summary/category and advances to COMPLETED.

use crate::ai::Enricher;
use starlog_common::db::models::{LogEntry, ProcessingStatus};
use std::time::Duration;
use tracing::info;

pub async fn run(enricher: &dyn Enricher, call_timeout: Duration, mut entry: LogEntry) -> LogEntry {
    info!(entry_id = %entry.id, "starting enrichment");

    let transcript = match entry.transcript.as_deref() {
        Some(transcript) if !transcript.trim().is_empty() => transcript.to_string(),
        _ => {
            entry.enrichment_error = Some("No transcript available for enrichment".to_string());
            return entry;
        }
    };

    match tokio::time::timeout(call_timeout, enricher.enrich(&transcript)).await {
        Err(_) => {
            entry.enrichment_error = Some("Enrichment failed: request timed out".to_string());
        }
        Ok(Err(e)) => {
            entry.enrichment_error = Some(format!("Failed to enrich log entry: {e}"));
        }
        Ok(Ok(proposal)) => {
            info!(entry_id = %entry.id, "enrichment succeeded");
            entry.title = Some(proposal.title);
            entry.summary_text = Some(proposal.summary);
            entry.category = proposal.category;
            entry.enrichment_error = None;
            entry.processing_status = ProcessingStatus::Completed;
        }
    }

    entry
}
