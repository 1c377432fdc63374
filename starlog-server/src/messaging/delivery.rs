//! Best-effort real-time delivery
//!
//! Attempts to push freshly persisted messages to their receivers' live
//! channels. A missing connection or a transport error leaves the
//! message PENDING; replay-on-reconnect picks it up later.

use crate::ws::payloads;
use crate::ws::ConnectionRegistry;
use starlog_common::db::models::ChangeMessage;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct DeliveryService {
    registry: Arc<ConnectionRegistry>,
}

impl DeliveryService {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver messages in the given order; no retries, no backpressure.
    ///
    /// Persisted state is never touched here - a failed attempt simply
    /// leaves the row PENDING.
    pub fn deliver(&self, messages: &[ChangeMessage]) {
        for message in messages {
            self.deliver_one(message);
        }
    }

    fn deliver_one(&self, message: &ChangeMessage) -> bool {
        let Some(handle) = self.registry.lookup(&message.receiver_user_id) else {
            debug!(
                message_id = %message.id,
                receiver = %message.receiver_user_id,
                "no active connection, message remains pending"
            );
            return false;
        };

        let payload = match payloads::push_payload(message) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(message_id = %message.id, "failed to serialize message payload: {e}");
                return false;
            }
        };

        match handle.send(payload) {
            Ok(()) => {
                debug!(
                    message_id = %message.id,
                    receiver = %message.receiver_user_id,
                    "message delivered to live connection"
                );
                true
            }
            Err(e) => {
                warn!(
                    message_id = %message.id,
                    receiver = %message.receiver_user_id,
                    "failed to deliver message: {e}"
                );
                false
            }
        }
    }
}
