//! Fetcher configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::Path;

use anyhow::{Context, Result};
use chime_core::{BufferConfig, CoreConfig, HttpConfig};
use serde::Deserialize;

/// Fetcher configuration loaded from YAML with environment overrides.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// HTTP engine settings.
    /// Overrides: `CHIME_RECONNECT_BUDGET`, `CHIME_HEADER_BUFFER_SIZE`,
    /// `CHIME_READ_TIMEOUT_MS`
    pub http: HttpConfig,

    /// Central audio buffer settings.
    /// Override: `CHIME_BUFFER_CHUNKS`
    pub buffer: BufferConfig,
}

impl FetchConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_yaml(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CHIME_RECONNECT_BUDGET") {
            if let Ok(budget) = val.parse() {
                self.http.reconnect_budget = budget;
            }
        }

        if let Ok(val) = std::env::var("CHIME_HEADER_BUFFER_SIZE") {
            if let Ok(size) = val.parse() {
                self.http.header_buffer_size = size;
            }
        }

        if let Ok(val) = std::env::var("CHIME_READ_TIMEOUT_MS") {
            if let Ok(timeout) = val.parse() {
                self.http.read_timeout_ms = timeout;
            }
        }

        if let Ok(val) = std::env::var("CHIME_BUFFER_CHUNKS") {
            if let Ok(chunks) = val.parse() {
                self.buffer.chunks = chunks;
            }
        }

        // Note: CHIME_INSECURE is handled by clap via #[arg(env = ...)] in main.rs
    }

    /// Converts to chime-core's config type.
    pub fn to_core_config(&self) -> CoreConfig {
        CoreConfig {
            http: self.http.clone(),
            buffer: self.buffer.clone(),
        }
    }
}
