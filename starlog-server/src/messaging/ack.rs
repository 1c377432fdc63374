//! Acknowledgment service
//!
//! Owns the pending -> acknowledged transition of change messages and
//! the pending-replay query. A message that does not exist and a
//! message owned by a different receiver produce the same NotFound
//! error, so existence is never leaked to a non-owning caller.

use chrono::Utc;
use sqlx::SqlitePool;
use starlog_common::db::messages;
use starlog_common::db::models::{ChangeMessage, MessageStatus};
use starlog_common::{Error, Result};
use tracing::debug;
use uuid::Uuid;

pub struct MessageService {
    db: SqlitePool,
}

impl MessageService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Acknowledge a message on behalf of its receiver.
    ///
    /// Idempotent: acknowledging an already-acknowledged message
    /// succeeds again and refreshes the timestamp.
    pub async fn acknowledge(&self, message_id: Uuid, user_id: &str) -> Result<ChangeMessage> {
        let message = messages::find_by_id(&self.db, message_id)
            .await?
            .ok_or_else(|| not_found(message_id))?;

        if message.receiver_user_id != user_id {
            // Same error as a missing message on purpose
            return Err(not_found(message_id));
        }

        let acknowledged_at = Utc::now();
        messages::mark_acknowledged(&self.db, message_id, acknowledged_at).await?;

        debug!(%message_id, user_id, "message acknowledged");

        Ok(ChangeMessage {
            status: MessageStatus::Acknowledged,
            acknowledged_at: Some(acknowledged_at),
            ..message
        })
    }

    /// Pending messages for a receiver, oldest first (replay order)
    pub async fn pending_for(&self, user_id: &str) -> Result<Vec<ChangeMessage>> {
        messages::pending_for_receiver(&self.db, user_id).await
    }
}

fn not_found(message_id: Uuid) -> Error {
    Error::NotFound(format!("change message not found with id: {message_id}"))
}
