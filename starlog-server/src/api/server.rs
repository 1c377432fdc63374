//! HTTP server setup and routing

use crate::api::handlers;
use crate::logbook::LogEntryService;
use crate::messaging::MessageService;
use crate::ws::{gateway, ConnectionRegistry};
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Shared application context passed to all handlers
///
/// AppContext implements Clone, which gives us `FromRef<AppContext>` for
/// free via Axum's blanket implementation.
#[derive(Clone)]
pub struct AppContext {
    pub db: SqlitePool,
    pub registry: Arc<ConnectionRegistry>,
    pub messages: Arc<MessageService>,
    pub log_entries: Arc<LogEntryService>,
}

/// Build the application router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(handlers::health))
        // Log entries (entity-mutation surface)
        .route("/api/log-entries", post(handlers::upsert_log_entry))
        .route("/api/log-entries", get(handlers::list_log_entries))
        .route("/api/log-entries/:id", get(handlers::get_log_entry))
        // Real-time entity-changed-messages channel
        .route(
            "/ws/entity-changed-messages",
            get(gateway::entity_changed_messages),
        )
        // Attach application context
        .with_state(ctx)
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
}
