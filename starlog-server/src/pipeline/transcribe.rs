//! Transcription step
//!
//! Infallible by design: every failure mode is recorded on the entry as
//! `transcription_error` and the entry is returned for the orchestrator
//! to persist. Only a successful transcription advances the status.

use crate::ai::Transcriber;
use crate::storage::AudioStore;
use starlog_common::db::models::{LogEntry, ProcessingStatus};
use std::time::Duration;
use tracing::{debug, info};

pub async fn run(
    audio_store: &dyn AudioStore,
    transcriber: &dyn Transcriber,
    call_timeout: Duration,
    mut entry: LogEntry,
) -> LogEntry {
    info!(entry_id = %entry.id, "starting transcription");

    let Some(file_id) = entry.audio_file_id else {
        entry.transcription_error =
            Some("No audio file associated with this log entry".to_string());
        return entry;
    };

    debug!(entry_id = %entry.id, %file_id, "retrieving audio content");
    let audio = match audio_store.fetch(&entry.author_id, file_id).await {
        Ok(audio) => audio,
        Err(e) => {
            entry.transcription_error = Some(format!("Transcription failed: {e}"));
            return entry;
        }
    };

    if audio.is_empty() {
        entry.transcription_error = Some("Audio file is empty or corrupted".to_string());
        return entry;
    }

    let transcript = match tokio::time::timeout(call_timeout, transcriber.transcribe(&audio)).await
    {
        Err(_) => {
            entry.transcription_error =
                Some("Transcription failed: request timed out".to_string());
            return entry;
        }
        Ok(Err(e)) => {
            entry.transcription_error = Some(format!("Transcription failed: {e}"));
            return entry;
        }
        Ok(Ok(transcript)) => transcript,
    };

    if transcript.trim().is_empty() {
        entry.transcription_error = Some("Transcription resulted in empty text".to_string());
        return entry;
    }

    info!(entry_id = %entry.id, "transcription succeeded");

    entry.transcript = Some(transcript);
    entry.transcription_error = None;
    entry.processing_status = ProcessingStatus::Transcribed;
    entry
}
