//! Server configuration
//!
//! Tunables are read from `starlog.toml` under the root folder; a
//! missing file or missing keys fall back to compiled defaults so a
//! fresh install starts without any configuration.

use serde::Deserialize;
use starlog_common::Result;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Configuration for the starlog server
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP/WebSocket listen port
    pub port: u16,
    /// Database file name, relative to the root folder
    pub database_file: String,
    /// Audio folder name, relative to the root folder
    pub audio_folder: String,
    /// Maximum pipeline runs in flight at once
    pub pipeline_max_concurrent_runs: usize,
    /// Remote AI capability settings
    pub ai: AiConfig,
}

/// Remote transcription/enrichment capability settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Base URL of the generateContent-style endpoint
    pub endpoint: String,
    /// Model identifier
    pub model: String,
    /// API key; the GEMINI_API_KEY environment variable overrides this
    pub api_key: String,
    /// Per-call timeout for remote requests, in seconds
    pub request_timeout_secs: u64,
    /// Self-correction retries for structured enrichment output
    pub enrichment_retries: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5730,
            database_file: "starlog.db".to_string(),
            audio_folder: "audio".to_string(),
            pipeline_max_concurrent_runs: 4,
            ai: AiConfig::default(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_key: String::new(),
            request_timeout_secs: 120,
            enrichment_retries: 2,
        }
    }
}

impl ServerConfig {
    /// Load configuration from `<root>/starlog.toml`, falling back to
    /// defaults when the file or individual keys are absent.
    pub fn load(root_folder: &Path) -> Result<Self> {
        let path = root_folder.join("starlog.toml");

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            match toml::from_str::<ServerConfig>(&content) {
                Ok(config) => {
                    info!("Loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Ignoring malformed {}: {}", path.display(), e);
                    ServerConfig::default()
                }
            }
        } else {
            info!("No {} found, using defaults", path.display());
            ServerConfig::default()
        };

        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            if !key.is_empty() {
                config.ai.api_key = key;
            }
        }

        Ok(config)
    }

    /// Absolute database path under the root folder
    pub fn database_path(&self, root_folder: &Path) -> PathBuf {
        root_folder.join(&self.database_file)
    }

    /// Absolute audio folder path under the root folder
    pub fn audio_path(&self, root_folder: &Path) -> PathBuf {
        root_folder.join(&self.audio_folder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 5730);
        assert!(config.pipeline_max_concurrent_runs >= 1);
        assert!(config.ai.request_timeout_secs > 0);
    }

    #[test]
    fn partial_toml_keeps_defaults_for_missing_keys() {
        let config: ServerConfig = toml::from_str("port = 9000").expect("parse");
        assert_eq!(config.port, 9000);
        assert_eq!(config.database_file, "starlog.db");
        assert_eq!(config.ai.enrichment_retries, 2);
    }
}
