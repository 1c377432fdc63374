//! Wire payloads for the entity-changed-messages channel

use serde::{Deserialize, Serialize};
use starlog_common::db::models::ChangeMessage;

/// Server -> client push payload for one change message
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeMessagePayload {
    pub id: String,
    pub entity_id: String,
    pub entity_type: String,
    pub changed_by_user_id: String,
    pub created_at: String,
}

impl ChangeMessagePayload {
    pub fn from_message(message: &ChangeMessage) -> Self {
        Self {
            id: message.id.to_string(),
            entity_id: message.entity_id.to_string(),
            entity_type: message.entity_type.as_str().to_string(),
            changed_by_user_id: message.changed_by_user_id.clone(),
            created_at: message.created_at.to_rfc3339(),
        }
    }
}

/// Serialize a change message into its wire form
pub fn push_payload(message: &ChangeMessage) -> serde_json::Result<String> {
    serde_json::to_string(&ChangeMessagePayload::from_message(message))
}

/// Client -> server acknowledgment frame
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckFrame {
    #[serde(default)]
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AckStatus {
    Success,
    Error,
}

/// Server -> client result of one acknowledgment frame
#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub status: AckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AckResponse {
    pub fn success() -> Self {
        Self {
            status: AckStatus::Success,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: AckStatus::Error,
            error: Some(message.into()),
        }
    }

    /// Wire form; falls back to a literal error body if serialization
    /// itself fails.
    pub fn to_wire(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"status":"ERROR","error":"internal error"}"#.to_string())
    }
}
