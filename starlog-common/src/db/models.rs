//! Database models
//!
//! Domain types backing the `log_entries` and `entity_changed_messages`
//! tables. [`ProcessingStatus`] is modeled as an explicit state machine:
//! the orchestrator only persists transitions allowed by
//! [`ProcessingStatus::can_transition_to`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::EntityType;

/// Pipeline state of a log entry.
///
/// The first three states are client-owned (upload flow); the rest are
/// written exclusively by the processing orchestrator. `Completed` and
/// `Failed` are terminal: the orchestrator never advances past them, and
/// only a fresh upsert that resets the status to `Uploaded` re-enters
/// the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Uploading,
    Uploaded,
    Transcribing,
    Transcribed,
    Enriching,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Uploading => "uploading",
            ProcessingStatus::Uploaded => "uploaded",
            ProcessingStatus::Transcribing => "transcribing",
            ProcessingStatus::Transcribed => "transcribed",
            ProcessingStatus::Enriching => "enriching",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ProcessingStatus::Pending),
            "uploading" => Some(ProcessingStatus::Uploading),
            "uploaded" => Some(ProcessingStatus::Uploaded),
            "transcribing" => Some(ProcessingStatus::Transcribing),
            "transcribed" => Some(ProcessingStatus::Transcribed),
            "enriching" => Some(ProcessingStatus::Enriching),
            "completed" => Some(ProcessingStatus::Completed),
            "failed" => Some(ProcessingStatus::Failed),
            _ => None,
        }
    }

    /// Transition table for the pipeline state machine.
    ///
    /// `Failed` is reachable from every in-flight pipeline state so that
    /// a partial failure always has a terminal landing spot. Terminal
    /// states allow nothing; an external upsert resetting the status is
    /// not a transition in this table.
    pub fn can_transition_to(&self, next: ProcessingStatus) -> bool {
        use ProcessingStatus::*;
        matches!(
            (self, next),
            (Pending, Uploading)
                | (Pending, Uploaded)
                | (Uploading, Uploaded)
                | (Uploaded, Transcribing)
                | (Uploaded, Failed)
                | (Transcribing, Transcribed)
                | (Transcribing, Failed)
                | (Transcribed, Enriching)
                | (Transcribed, Failed)
                | (Enriching, Completed)
                | (Enriching, Failed)
        )
    }

    /// True for `Completed` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content category assigned by enrichment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogCategory {
    Mission,
    Operations,
    Personal,
    Research,
    Other,
}

impl LogCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Mission => "mission",
            LogCategory::Operations => "operations",
            LogCategory::Personal => "personal",
            LogCategory::Research => "research",
            LogCategory::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "mission" => Some(LogCategory::Mission),
            "operations" => Some(LogCategory::Operations),
            "personal" => Some(LogCategory::Personal),
            "research" => Some(LogCategory::Research),
            "other" => Some(LogCategory::Other),
            _ => None,
        }
    }
}

/// An audio-backed log entry progressing through the processing pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub author_id: String,
    pub audio_file_id: Option<Uuid>,
    pub processing_status: ProcessingStatus,
    pub transcript: Option<String>,
    pub summary_text: Option<String>,
    pub title: Option<String>,
    pub category: LogCategory,
    pub duration_seconds: Option<f64>,
    pub transcription_error: Option<String>,
    pub enrichment_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle of a durable change message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Acknowledged,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Acknowledged => "acknowledged",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(MessageStatus::Pending),
            "acknowledged" => Some(MessageStatus::Acknowledged),
            _ => None,
        }
    }
}

/// Durable at-least-once notification record, one row per
/// (change occurrence, receiver).
///
/// Invariant: `acknowledged_at` is non-null exactly when `status` is
/// `Acknowledged`. Created by the fan-out service; the only further
/// mutation is the acknowledgment transition, which is idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeMessage {
    pub id: Uuid,
    pub entity_id: Uuid,
    pub entity_type: EntityType,
    pub changed_by_user_id: String,
    pub receiver_user_id: String,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl ChangeMessage {
    /// Build a fresh pending message for one receiver
    pub fn new(
        entity_id: Uuid,
        entity_type: EntityType,
        changed_by_user_id: &str,
        receiver_user_id: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_id,
            entity_type,
            changed_by_user_id: changed_by_user_id.to_string(),
            receiver_user_id: receiver_user_id.to_string(),
            status: MessageStatus::Pending,
            created_at: Utc::now(),
            acknowledged_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ProcessingStatus::*;

    const ALL: [ProcessingStatus; 8] = [
        Pending,
        Uploading,
        Uploaded,
        Transcribing,
        Transcribed,
        Enriching,
        Completed,
        Failed,
    ];

    #[test]
    fn upload_flow_transitions() {
        assert!(Pending.can_transition_to(Uploading));
        assert!(Pending.can_transition_to(Uploaded));
        assert!(Uploading.can_transition_to(Uploaded));
        assert!(!Uploaded.can_transition_to(Pending));
    }

    #[test]
    fn pipeline_happy_path() {
        assert!(Uploaded.can_transition_to(Transcribing));
        assert!(Transcribing.can_transition_to(Transcribed));
        assert!(Transcribed.can_transition_to(Enriching));
        assert!(Enriching.can_transition_to(Completed));
    }

    #[test]
    fn every_in_flight_state_can_fail() {
        for state in [Uploaded, Transcribing, Transcribed, Enriching] {
            assert!(state.can_transition_to(Failed), "{state} -> failed");
        }
    }

    #[test]
    fn terminal_states_allow_nothing() {
        for terminal in [Completed, Failed] {
            assert!(terminal.is_terminal());
            for next in ALL {
                assert!(
                    !terminal.can_transition_to(next),
                    "{terminal} must not advance to {next}"
                );
            }
        }
    }

    #[test]
    fn no_skipping_pipeline_stages() {
        assert!(!Uploaded.can_transition_to(Transcribed));
        assert!(!Uploaded.can_transition_to(Enriching));
        assert!(!Uploaded.can_transition_to(Completed));
        assert!(!Transcribing.can_transition_to(Enriching));
        assert!(!Transcribing.can_transition_to(Completed));
        assert!(!Transcribed.can_transition_to(Completed));
    }

    #[test]
    fn guard_race_duplicate_trigger_is_rejected_by_table() {
        // A second trigger that lost the race sees Transcribing; the
        // table refuses the duplicate Uploaded -> Transcribing write.
        assert!(!Transcribing.can_transition_to(Transcribing));
        assert!(!Transcribing.can_transition_to(Uploaded));
    }

    #[test]
    fn status_tokens_round_trip() {
        for state in ALL {
            assert_eq!(ProcessingStatus::from_str(state.as_str()), Some(state));
        }
        assert_eq!(ProcessingStatus::from_str("warping"), None);
    }

    #[test]
    fn fresh_message_is_pending_without_ack_timestamp() {
        let m = ChangeMessage::new(
            Uuid::new_v4(),
            crate::events::EntityType::LogEntry,
            "kirk",
            "spock",
        );
        assert_eq!(m.status, MessageStatus::Pending);
        assert!(m.acknowledged_at.is_none());
    }
}
