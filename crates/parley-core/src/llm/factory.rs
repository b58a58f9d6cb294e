//! Provider construction port.
//!
//! The orchestrator resolves configuration per call and asks the factory for
//! a client. Infra implements this for the OpenAI-compatible adapter; tests
//! substitute scripted providers.

use parley_types::config::ResolvedAiSettings;
use parley_types::llm::LlmError;

use super::box_provider::BoxLlmProvider;

/// Builds a provider client from resolved settings.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, settings: &ResolvedAiSettings) -> Result<BoxLlmProvider, LlmError>;
}
