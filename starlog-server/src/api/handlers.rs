//! HTTP request handlers
//!
//! REST endpoints for the log entry surface. Identity comes from the
//! `x-user-id` header (resolved upstream); domain errors map onto
//! status codes in [`ApiError`].

use crate::api::server::AppContext;
use crate::logbook::{UpsertLogEntry, UpsertStatus};
use crate::ws::gateway;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use starlog_common::db::models::{LogCategory, LogEntry};
use starlog_common::Error;
use uuid::Uuid;

// ============================================================================
// Error mapping
// ============================================================================

/// Wrapper turning domain errors into HTTP responses
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        ApiError(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Unauthorized(_) => StatusCode::FORBIDDEN,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn require_user(headers: &HeaderMap) -> Result<String, ApiError> {
    gateway::user_from_headers(headers)
        .ok_or_else(|| ApiError(Error::Validation("missing x-user-id header".to_string())))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertLogEntryRequest {
    pub id: Option<Uuid>,
    pub audio_file_id: Option<Uuid>,
    pub status: Option<String>,
    pub title: Option<String>,
    pub category: Option<String>,
    pub duration_seconds: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntryResponse {
    pub id: Uuid,
    pub author_id: String,
    pub audio_file_id: Option<Uuid>,
    pub processing_status: String,
    pub transcript: Option<String>,
    pub summary_text: Option<String>,
    pub title: Option<String>,
    pub category: String,
    pub duration_seconds: Option<f64>,
    pub transcription_error: Option<String>,
    pub enrichment_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<LogEntry> for LogEntryResponse {
    fn from(entry: LogEntry) -> Self {
        Self {
            id: entry.id,
            author_id: entry.author_id,
            audio_file_id: entry.audio_file_id,
            processing_status: entry.processing_status.as_str().to_string(),
            transcript: entry.transcript,
            summary_text: entry.summary_text,
            title: entry.title,
            category: entry.category.as_str().to_string(),
            duration_seconds: entry.duration_seconds,
            transcription_error: entry.transcription_error,
            enrichment_error: entry.enrichment_error,
            created_at: entry.created_at.to_rfc3339(),
            updated_at: entry.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntryPageResponse {
    pub entries: Vec<LogEntryResponse>,
    pub total: i64,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "starlog-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /api/log-entries - insert or update a log entry
pub async fn upsert_log_entry(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Json(request): Json<UpsertLogEntryRequest>,
) -> Result<Json<LogEntryResponse>, ApiError> {
    let user_id = require_user(&headers)?;

    let status = match request.status.as_deref() {
        None => UpsertStatus::Pending,
        Some(token) => UpsertStatus::from_str(token).ok_or_else(|| {
            ApiError(Error::Validation(format!(
                "status must be pending, uploading or uploaded, got {token}"
            )))
        })?,
    };

    let category = request
        .category
        .as_deref()
        .map(|token| {
            LogCategory::from_str(token).ok_or_else(|| {
                ApiError(Error::Validation(format!("unknown category: {token}")))
            })
        })
        .transpose()?;

    if let Some(duration) = request.duration_seconds {
        if !duration.is_finite() || duration < 0.0 {
            return Err(ApiError(Error::Validation(format!(
                "durationSeconds must be a non-negative number, got {duration}"
            ))));
        }
    }

    let input = UpsertLogEntry {
        id: request.id.unwrap_or_else(Uuid::new_v4),
        audio_file_id: request.audio_file_id,
        status,
        title: request.title,
        category,
        duration_seconds: request.duration_seconds,
    };

    let entry = ctx.log_entries.upsert(&user_id, input).await?;
    Ok(Json(entry.into()))
}

/// GET /api/log-entries/:id - owner-scoped fetch
pub async fn get_log_entry(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<LogEntryResponse>, ApiError> {
    let user_id = require_user(&headers)?;
    let entry = ctx.log_entries.get(&user_id, id).await?;
    Ok(Json(entry.into()))
}

/// GET /api/log-entries - owner-scoped listing
pub async fn list_log_entries(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<LogEntryPageResponse>, ApiError> {
    let user_id = require_user(&headers)?;

    let limit = params.limit.unwrap_or(20);
    let offset = params.offset.unwrap_or(0);

    let (entries, total) = ctx.log_entries.list(&user_id, limit, offset).await?;
    Ok(Json(LogEntryPageResponse {
        entries: entries.into_iter().map(Into::into).collect(),
        total,
    }))
}
