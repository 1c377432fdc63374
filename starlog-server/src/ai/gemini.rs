//! Gemini generateContent client
//!
//! Implements both capability ports against a Gemini-style
//! `generateContent` HTTP API: transcription sends the audio inline as
//! base64, enrichment requests JSON output and re-prompts with the
//! parse error for a bounded number of self-correction attempts.

use crate::ai::{CapabilityError, Enricher, EnrichmentProposal, Transcriber};
use crate::config::AiConfig;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const TRANSCRIPTION_PROMPT: &str = "\
You are a professional transcription service. Transcribe the attached \
audio log accurately: clean readable text, proper punctuation, natural \
paragraph breaks, no filler words or noise markers. Return only the \
transcript text with no additional commentary.";

const ENRICHMENT_PROMPT: &str = "\
You are an assistant that summarizes starship log entries. Analyze the \
transcript and return a JSON object with exactly these fields:
  \"title\": a descriptive title capturing the central theme (max 50 words)
  \"summary\": a concise plain-text summary of key events (max 200 words)
  \"category\": one of \"mission\", \"operations\", \"personal\", \"research\", \"other\"
Categories: mission = briefings, after-action reports, away team \
summaries; operations = ship systems, engineering, bridge operations; \
personal = reflections, personal notes, crew wellbeing; research = \
scientific findings, anomalies, experiments; other = anything else.
Return only the JSON object, no commentary and no markdown fences.";

/// Request/response DTOs for the generateContent API

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    fn audio(mime_type: &str, data: String) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.to_string(),
                data,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Gemini generateContent API client
pub struct GeminiClient {
    http_client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    enrichment_retries: u32,
}

impl GeminiClient {
    pub fn new(config: &AiConfig) -> Result<Self, CapabilityError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| CapabilityError::Request(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            enrichment_retries: config.enrichment_retries,
        })
    }

    /// One generateContent round trip; returns the first text part
    async fn generate(&self, request: &GenerateContentRequest) -> Result<String, CapabilityError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint, self.model
        );

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| CapabilityError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CapabilityError::Status(status.as_u16(), error_text));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::Response(e.to_string()))?;

        body.candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text)
            .ok_or_else(|| CapabilityError::Response("no text candidate in response".to_string()))
    }
}

#[async_trait]
impl Transcriber for GeminiClient {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, CapabilityError> {
        debug!(bytes = audio.len(), "requesting transcription");

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::text(TRANSCRIPTION_PROMPT),
                    Part::audio("audio/aac", BASE64.encode(audio)),
                ],
            }],
            generation_config: None,
        };

        self.generate(&request).await
    }
}

#[async_trait]
impl Enricher for GeminiClient {
    async fn enrich(&self, transcript: &str) -> Result<EnrichmentProposal, CapabilityError> {
        let mut parts = vec![
            Part::text(ENRICHMENT_PROMPT),
            Part::text(format!("Transcript: {transcript}")),
        ];

        let mut last_error = String::new();

        // First attempt plus a bounded number of self-correction
        // retries that feed the parse error back to the model.
        for attempt in 0..=self.enrichment_retries {
            let request = GenerateContentRequest {
                contents: vec![Content {
                    parts: parts.clone(),
                }],
                generation_config: Some(GenerationConfig {
                    response_mime_type: "application/json".to_string(),
                }),
            };

            let raw = self.generate(&request).await?;

            match serde_json::from_str::<EnrichmentProposal>(strip_code_fences(&raw)) {
                Ok(proposal) => return Ok(proposal),
                Err(e) => {
                    warn!(attempt, "enrichment output did not match schema: {e}");
                    last_error = e.to_string();
                    parts.push(Part::text(format!(
                        "Your previous response was not valid: {e}. \
                         Previous response: {raw}. \
                         Respond again with only the JSON object described above."
                    )));
                }
            }
        }

        Err(CapabilityError::Response(format!(
            "structured output failed after {} attempts: {last_error}",
            self.enrichment_retries + 1
        )))
    }
}

/// Models occasionally wrap JSON in markdown fences despite instructions
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open.strip_suffix("```").unwrap_or(without_open).trim()
}
