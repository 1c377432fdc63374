//! Remote AI capability ports
//!
//! The pipeline treats transcription and enrichment as opaque injected
//! capabilities so tests can substitute deterministic doubles. The
//! production implementation lives in [`gemini`].

pub mod gemini;

use async_trait::async_trait;
use serde::Deserialize;
use starlog_common::db::models::LogCategory;
use thiserror::Error;

/// Errors surfaced by the remote capabilities
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// Transport-level failure (connect, TLS, client timeout)
    #[error("request failed: {0}")]
    Request(String),

    /// Remote service answered with a non-success status
    #[error("remote service error {0}: {1}")]
    Status(u16, String),

    /// The response arrived but could not be used
    #[error("unusable response: {0}")]
    Response(String),
}

/// Structured enrichment result proposed by the model
#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentProposal {
    pub title: String,
    pub summary: String,
    pub category: LogCategory,
}

/// Audio bytes -> transcript text
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, CapabilityError>;
}

/// Transcript -> structured {title, summary, category}
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, transcript: &str) -> Result<EnrichmentProposal, CapabilityError>;
}
