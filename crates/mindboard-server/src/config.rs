//! Server configuration parsed from environment variables.

use std::net::SocketAddr;
use thiserror::Error;

pub const DEFAULT_ADDR: &str = "0.0.0.0:3030";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid MINDBOARD_ADDR '{value}': {reason}")]
    InvalidAddr { value: String, reason: String },
}

/// Upstream used by `POST /api/mindmap`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// `None` when no API key is configured; the relay still runs.
    pub openai: Option<OpenAiConfig>,
}

impl ServerConfig {
    /// Build config from environment variables.
    ///
    /// Optional:
    /// - `MINDBOARD_ADDR`: listen address, default `0.0.0.0:3030`
    /// - `OPENAI_API_KEY`: enables mindmap generation
    /// - `OPENAI_MODEL`: default `gpt-4o-mini`
    /// - `OPENAI_BASE_URL`: default OpenAI API base URL
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_addr = lookup("MINDBOARD_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = raw_addr
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidAddr {
                value: raw_addr.clone(),
                reason: e.to_string(),
            })?;

        let openai = lookup("OPENAI_API_KEY")
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .map(|api_key| OpenAiConfig {
                api_key,
                model: lookup("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
                base_url: lookup("OPENAI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
            });

        Ok(Self { addr, openai })
    }
}
