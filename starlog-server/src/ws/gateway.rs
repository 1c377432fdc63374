//! Acknowledgment gateway
//!
//! Per-connection WebSocket protocol handler: registers the connection,
//! replays pending messages oldest-first before processing any client
//! frame, accepts `{"messageId"}` acknowledgment frames, and
//! unregisters on close or error. Nothing here ever propagates outside
//! the connection's own lifecycle.

use crate::api::server::AppContext;
use crate::ws::payloads::{self, AckFrame, AckResponse};
use crate::ws::ConnectionHandle;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Header carrying the authenticated user id.
///
/// Identity resolution itself is an upstream gateway concern; this
/// service trusts the header.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Resolve the authenticated user from request headers
pub fn user_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// GET /ws/entity-changed-messages - upgrade to the per-user channel
pub async fn entity_changed_messages(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(user_id) = user_from_headers(&headers) else {
        return (StatusCode::UNAUTHORIZED, "missing x-user-id header").into_response();
    };

    ws.on_upgrade(move |socket| handle_connection(ctx, user_id, socket))
}

async fn handle_connection(ctx: AppContext, user_id: String, socket: WebSocket) {
    debug!(user_id, "websocket connection opened");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (queue_tx, mut queue_rx) = mpsc::unbounded_channel::<String>();

    // Writer task: drains the queue into the socket in order. Replay,
    // live delivery and ack responses all funnel through this queue, so
    // frame ordering on the wire matches queue ordering.
    let send_task = tokio::spawn(async move {
        while let Some(payload) = queue_rx.recv().await {
            if ws_tx.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    ctx.registry
        .register(&user_id, ConnectionHandle::new(queue_tx.clone()));

    // Replay all pending messages before processing any client frame;
    // any failure here closes the connection.
    if !replay_pending(&ctx, &user_id, &queue_tx).await {
        ctx.registry.unregister(&user_id);
        drop(queue_tx);
        let _ = send_task.await;
        return;
    }

    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                let response = handle_ack_frame(&ctx, &user_id, &text).await;
                if queue_tx.send(response.to_wire()).is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            // Ping/pong are answered by axum; binary frames are ignored
            Ok(_) => {}
            Err(e) => {
                warn!(user_id, "websocket error: {e}");
                break;
            }
        }
    }

    ctx.registry.unregister(&user_id);
    drop(queue_tx);
    let _ = send_task.await;

    debug!(user_id, "websocket connection closed");
}

/// Queue the user's pending messages, oldest first.
///
/// Returns false when the connection should be closed instead.
async fn replay_pending(
    ctx: &AppContext,
    user_id: &str,
    queue: &mpsc::UnboundedSender<String>,
) -> bool {
    let pending = match ctx.messages.pending_for(user_id).await {
        Ok(pending) => pending,
        Err(e) => {
            error!(user_id, "failed to load pending messages: {e}");
            return false;
        }
    };

    let count = pending.len();
    for message in &pending {
        let payload = match payloads::push_payload(message) {
            Ok(payload) => payload,
            Err(e) => {
                error!(user_id, message_id = %message.id, "failed to serialize replay: {e}");
                return false;
            }
        };
        if queue.send(payload).is_err() {
            return false;
        }
    }

    if count > 0 {
        debug!(user_id, count, "replayed pending messages");
    }
    true
}

async fn handle_ack_frame(ctx: &AppContext, user_id: &str, text: &str) -> AckResponse {
    let frame: AckFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(_) => {
            warn!(user_id, "unparseable ack frame");
            return AckResponse::error("Could not parse message");
        }
    };

    let Some(raw_id) = frame.message_id else {
        return AckResponse::error("Invalid message format");
    };

    let message_id = match Uuid::parse_str(&raw_id) {
        Ok(id) => id,
        Err(_) => return AckResponse::error(format!("Invalid message id: {raw_id}")),
    };

    match ctx.messages.acknowledge(message_id, user_id).await {
        Ok(_) => {
            debug!(user_id, %message_id, "message acknowledged over channel");
            AckResponse::success()
        }
        Err(e) => AckResponse::error(format!("Failed to process acknowledgment: {e}")),
    }
}
