//! Configuration types for Parley.
//!
//! `ParleyConfig` represents the top-level `config.toml` in the data
//! directory. Every field is optional; provider settings are validated only
//! when a generation needs them.

use std::fmt;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// Top-level configuration for Parley.
///
/// Loaded from `~/.parley/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParleyConfig {
    #[serde(default)]
    pub ai: AiSettings,

    #[serde(default)]
    pub server: ServerConfig,
}

/// Provider endpoint, credential and model identifier.
///
/// All three are required before a generation can start; see [`AiSettings::resolve`].
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AiSettings {
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub model: Option<String>,
}

impl fmt::Debug for AiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .finish()
    }
}

/// Complete provider settings, ready to build a client.
#[derive(Debug, Clone)]
pub struct ResolvedAiSettings {
    pub base_url: String,
    pub api_key: SecretString,
    pub model: String,
}

impl AiSettings {
    /// Validate that endpoint, credential and model are all present and non-blank.
    pub fn resolve(&self) -> Result<ResolvedAiSettings, ChatError> {
        fn present(value: &Option<String>) -> Option<&str> {
            value.as_deref().map(str::trim).filter(|v| !v.is_empty())
        }

        match (
            present(&self.base_url),
            present(&self.api_key),
            present(&self.model),
        ) {
            (Some(base_url), Some(api_key), Some(model)) => Ok(ResolvedAiSettings {
                base_url: base_url.to_string(),
                api_key: SecretString::from(api_key.to_string()),
                model: model.to_string(),
            }),
            _ => Err(ChatError::FailedPrecondition(
                "AI provider is not configured: base_url, api_key and model are required"
                    .to_string(),
            )),
        }
    }
}

/// HTTP server bind address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}
