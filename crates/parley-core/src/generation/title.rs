//! Conversation titles.
//!
//! A fresh conversation normally gets its title from the marker embedded in the
//! streamed answer. When the provider omits it, `FallbackTitle` asks the same
//! provider for one with a short non-streaming request, detached from the call
//! that triggered it.

use std::sync::Arc;

use parley_types::chat::{ConversationUpdate, ConversationView};
use parley_types::event::GenerationEvent;
use parley_types::llm::{CompletionRequest, LlmError, Message};

use crate::chat::repository::ConversationRepository;
use crate::generation::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::generation::scanner::TITLE_MARKER;
use crate::generation::sink::EventSink;
use crate::llm::box_provider::BoxLlmProvider;

/// Title a conversation carries until a real one is known.
pub const PLACEHOLDER_TITLE: &str = "New Conversation";

/// Maximum title length in characters before truncation.
pub const MAX_TITLE_CHARS: usize = 50;

pub const TITLE_MAX_TOKENS: u32 = 20;
pub const TITLE_TEMPERATURE: f64 = 0.3;

/// Prepended to the outbound messages of a fresh conversation.
pub fn title_instruction() -> String {
    format!(
        "Answer the user's message normally. After your complete answer, add exactly two line \
         breaks, then write {TITLE_MARKER} followed by a concise 2-6 word title for this \
         conversation. Do not put the title in quotes."
    )
}

const FALLBACK_SYSTEM_PROMPT: &str = "Generate a concise 2-5 word title for this conversation \
based on the first exchange. Return ONLY the title text, without quotes or punctuation around it.";

/// Clean up a provider-generated title for display.
///
/// Strips whitespace and surrounding quotes, truncates to [`MAX_TITLE_CHARS`]
/// characters with a trailing `...`, and falls back to [`PLACEHOLDER_TITLE`]
/// when nothing is left.
pub fn normalize_title(raw: &str) -> String {
    let title = raw
        .trim()
        .trim_matches(&['"', '\''][..])
        .trim();

    if title.is_empty() {
        return PLACEHOLDER_TITLE.to_string();
    }

    match title.char_indices().nth(MAX_TITLE_CHARS) {
        Some((cut, _)) => format!("{}...", title[..cut].trim_end()),
        None => title.to_string(),
    }
}

/// Ask the provider for a title based on the first exchange.
///
/// Returns the raw response text; callers normalize it.
#[tracing::instrument(
    name = "generate_title",
    skip(provider, first_user_message, assistant_content),
    fields(model = %model)
)]
pub async fn generate_title(
    provider: &BoxLlmProvider,
    model: &str,
    first_user_message: &str,
    assistant_content: &str,
) -> Result<String, LlmError> {
    let request = CompletionRequest {
        model: model.to_string(),
        messages: vec![
            Message::system(FALLBACK_SYSTEM_PROMPT),
            Message::user(first_user_message),
            Message::assistant(assistant_content),
            Message::user("Based on our exchange above, generate a title."),
        ],
        max_tokens: Some(TITLE_MAX_TOKENS),
        temperature: Some(TITLE_TEMPERATURE),
        stream: false,
    };

    let response = provider.complete(&request).await?;
    Ok(response.content)
}

/// Detached fallback title job for one freshly created conversation.
pub struct FallbackTitle<R> {
    pub repo: Arc<R>,
    pub provider: Arc<BoxLlmProvider>,
    pub diagnostics: Arc<dyn DiagnosticSink>,
    pub model: String,
    pub conversation_uid: String,
    pub first_user_message: String,
    pub assistant_content: String,
}

impl<R: ConversationRepository> FallbackTitle<R> {
    /// Generate, store and (best effort) deliver a title.
    ///
    /// Every failure is reported to diagnostics and ends the job.
    pub async fn run<S: EventSink>(self, sink: S) {
        let report = |kind: DiagnosticKind, detail: String| {
            self.diagnostics
                .report(Diagnostic::new(kind, detail).for_conversation(&self.conversation_uid));
        };

        let raw = match generate_title(
            &self.provider,
            &self.model,
            &self.first_user_message,
            &self.assistant_content,
        )
        .await
        {
            Ok(raw) => raw,
            Err(e) => {
                report(
                    DiagnosticKind::TitleRequestFailed,
                    format!("failed to generate title: {e}"),
                );
                return;
            }
        };

        if raw.trim().is_empty() {
            report(
                DiagnosticKind::TitleEmpty,
                "title generation returned an empty response".to_string(),
            );
            return;
        }

        let title = normalize_title(&raw);
        let update = ConversationUpdate::title(&self.conversation_uid, &title);
        let conversation = match self.repo.update_conversation(&update).await {
            Ok(conversation) => conversation,
            Err(e) => {
                report(
                    DiagnosticKind::TitlePersistFailed,
                    format!("failed to update conversation title: {e}"),
                );
                return;
            }
        };

        tracing::info!(conversation_uid = %self.conversation_uid, title = %title, "Generated conversation title");

        let event = GenerationEvent::title_generated(ConversationView::from(&conversation))
            .with_message("Title generated");
        if let Err(e) = sink.send(event).await {
            report(
                DiagnosticKind::TitleDeliveryFailed,
                format!("failed to deliver title: {e}"),
            );
        }
    }
}
