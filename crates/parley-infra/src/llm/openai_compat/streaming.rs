//! OpenAI SSE stream to [`StreamEvent`] adapter.
//!
//! Maps `async-openai`'s [`ChatCompletionResponseStream`] chunks to the
//! provider-agnostic [`StreamEvent`] enum defined in `parley-types`.

use async_openai::types::chat::{ChatCompletionResponseStream, FinishReason};
use futures_util::StreamExt;

use parley_core::llm::provider::ProviderStream;
use parley_types::llm::{StopReason, StreamEvent, Usage};

use super::map_openai_error;

/// Map an OpenAI finish reason onto [`StopReason`].
pub(crate) fn map_finish_reason(reason: &FinishReason) -> StopReason {
    match reason {
        FinishReason::Stop => StopReason::EndTurn,
        FinishReason::Length => StopReason::MaxTokens,
        FinishReason::ContentFilter => StopReason::ContentFilter,
        FinishReason::ToolCalls | FinishReason::FunctionCall => StopReason::EndTurn,
    }
}

/// Map an async-openai [`ChatCompletionResponseStream`] to a stream of [`StreamEvent`]s.
///
/// The returned stream emits, in order:
/// 1. `TextDelta` for each non-empty content chunk
/// 2. `MessageDelta` with the stop reason when a finish_reason appears
/// 3. `Usage` (requires `stream_options.include_usage = true` on the request)
/// 4. `Done` at the end of the stream
///
/// Errors keep their typed [`LlmError`](parley_types::llm::LlmError) variant,
/// so an HTTP failure reported as the first item can still be classified.
/// `Connected` is emitted by the caller once the first item has arrived.
pub fn map_openai_stream(stream: ChatCompletionResponseStream) -> ProviderStream {
    Box::pin(async_stream::try_stream! {
        let mut stream = stream;

        while let Some(result) = stream.next().await {
            let chunk = result.map_err(map_openai_error)?;

            // The final chunk carries usage with an empty choices array.
            if let Some(usage) = &chunk.usage {
                yield StreamEvent::Usage(Usage {
                    input_tokens: usage.prompt_tokens,
                    output_tokens: usage.completion_tokens,
                });
            }

            for choice in &chunk.choices {
                if let Some(text) = choice.delta.content.as_ref().filter(|t| !t.is_empty()) {
                    yield StreamEvent::TextDelta { text: text.clone() };
                }
                if let Some(reason) = &choice.finish_reason {
                    yield StreamEvent::MessageDelta {
                        stop_reason: map_finish_reason(reason),
                    };
                }
            }
        }

        yield StreamEvent::Done;
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_reason_to_stop_reason_mapping() {
        let cases = vec![
            (FinishReason::Stop, StopReason::EndTurn),
            (FinishReason::Length, StopReason::MaxTokens),
            (FinishReason::ContentFilter, StopReason::ContentFilter),
            (FinishReason::ToolCalls, StopReason::EndTurn),
            (FinishReason::FunctionCall, StopReason::EndTurn),
        ];

        for (finish, expected) in cases {
            assert_eq!(map_finish_reason(&finish), expected);
        }
    }
}
