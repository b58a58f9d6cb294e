//! LLM provider implementations.
//!
//! Contains the concrete [`OpenAiCompatibleProvider`] and the
//! [`OpenAiProviderFactory`] that builds one per generation from the
//! resolved provider settings.

pub mod openai_compat;

use parley_core::llm::box_provider::BoxLlmProvider;
use parley_core::llm::factory::ProviderFactory;
use parley_types::config::ResolvedAiSettings;
use parley_types::llm::LlmError;

use self::openai_compat::OpenAiCompatibleProvider;
use self::openai_compat::config::OpenAiCompatConfig;

/// Builds an [`OpenAiCompatibleProvider`] for each generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiProviderFactory;

impl ProviderFactory for OpenAiProviderFactory {
    fn create(&self, settings: &ResolvedAiSettings) -> Result<BoxLlmProvider, LlmError> {
        if !settings.base_url.starts_with("http://") && !settings.base_url.starts_with("https://")
        {
            return Err(LlmError::InvalidRequest(format!(
                "base_url must be an http(s) URL, got '{}'",
                settings.base_url
            )));
        }
        let provider = OpenAiCompatibleProvider::new(OpenAiCompatConfig::from(settings));
        Ok(BoxLlmProvider::new(provider))
    }
}
