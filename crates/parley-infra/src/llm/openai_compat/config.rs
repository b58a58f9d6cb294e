//! Configuration for the OpenAI-compatible provider.
//!
//! Any endpoint that speaks the OpenAI chat completions protocol (OpenAI,
//! Gemini's beta endpoint, Mistral, Ollama, vLLM, ...) is addressed by its base
//! URL, a bearer key and a model identifier.

use parley_types::config::ResolvedAiSettings;
use secrecy::SecretString;

/// Default provider name used in logs and spans.
pub const PROVIDER_NAME: &str = "openai_compatible";

/// Configuration used to construct an [`super::OpenAiCompatibleProvider`].
pub struct OpenAiCompatConfig {
    /// Human-readable provider name (e.g., "openai", "ollama").
    pub provider_name: String,
    /// Base URL for the API (e.g., "https://api.openai.com/v1").
    pub base_url: String,
    pub api_key: SecretString,
    /// Model used when a request leaves `model` empty.
    pub model: String,
}

impl From<&ResolvedAiSettings> for OpenAiCompatConfig {
    fn from(settings: &ResolvedAiSettings) -> Self {
        Self {
            provider_name: PROVIDER_NAME.to_string(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
        }
    }
}
