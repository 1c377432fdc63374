//! Notification fan-out
//!
//! The [`ChangeNotifier`] port is what mutation services call after
//! persisting their own change; there is no ambient event bus. The
//! production implementation persists one PENDING message per unique
//! receiver as a single batch, then hands the batch to delivery.

use crate::messaging::delivery::DeliveryService;
use async_trait::async_trait;
use sqlx::SqlitePool;
use starlog_common::db::messages;
use starlog_common::db::models::ChangeMessage;
use starlog_common::events::EntityType;
use starlog_common::Result;
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

/// Notification port called by entity-mutation services
#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    /// Fan one change occurrence out to the given receivers.
    ///
    /// Exactly one message is created per unique receiver per call;
    /// separate calls for the same entity produce independent message
    /// sets.
    async fn publish(
        &self,
        entity_id: Uuid,
        entity_type: EntityType,
        changed_by_user_id: &str,
        receiver_user_ids: &[String],
    ) -> Result<Vec<ChangeMessage>>;
}

pub struct MessageFanout {
    db: SqlitePool,
    delivery: DeliveryService,
}

impl MessageFanout {
    pub fn new(db: SqlitePool, delivery: DeliveryService) -> Self {
        Self { db, delivery }
    }
}

#[async_trait]
impl ChangeNotifier for MessageFanout {
    async fn publish(
        &self,
        entity_id: Uuid,
        entity_type: EntityType,
        changed_by_user_id: &str,
        receiver_user_ids: &[String],
    ) -> Result<Vec<ChangeMessage>> {
        // Deduplicate receivers, preserving first-seen order
        let mut seen = HashSet::new();
        let messages: Vec<ChangeMessage> = receiver_user_ids
            .iter()
            .filter(|receiver| seen.insert(receiver.as_str()))
            .map(|receiver| {
                ChangeMessage::new(entity_id, entity_type, changed_by_user_id, receiver)
            })
            .collect();

        messages::insert_batch(&self.db, &messages).await?;

        debug!(
            %entity_id,
            entity_type = %entity_type,
            count = messages.len(),
            "created change messages"
        );

        // Attempt real-time delivery to active connections
        self.delivery.deliver(&messages);

        Ok(messages)
    }
}
