//! Change event types shared by the mutation services and the
//! messaging components.
//!
//! A [`ChangeEvent`] is an ephemeral, in-process value: it is handed to
//! the notification port by whatever service just persisted an entity
//! mutation, fanned out into durable per-receiver messages, and then
//! dropped. It is never stored.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kinds of domain entities that can produce change notifications.
///
/// Serialized as lowercase snake_case tokens on the wire and in the
/// database (`log_entry`, `folder`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    LogEntry,
    LogEntryArtifact,
    Folder,
    File,
    Profile,
}

impl EntityType {
    /// Wire/database token for this entity type
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::LogEntry => "log_entry",
            EntityType::LogEntryArtifact => "log_entry_artifact",
            EntityType::Folder => "folder",
            EntityType::File => "file",
            EntityType::Profile => "profile",
        }
    }

    /// Parse a stored token back into an entity type
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "log_entry" => Some(EntityType::LogEntry),
            "log_entry_artifact" => Some(EntityType::LogEntryArtifact),
            "folder" => Some(EntityType::Folder),
            "file" => Some(EntityType::File),
            "profile" => Some(EntityType::Profile),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ephemeral description of "entity X changed, notify these receivers"
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub entity_id: Uuid,
    pub entity_type: EntityType,
    pub changed_by_user_id: String,
    pub receiver_user_ids: Vec<String>,
}
