//! Mapping of provider failures onto the caller-facing error taxonomy.
//!
//! Typed `LlmError` variants are checked first; untyped errors fall back to
//! case-insensitive substring matching on the error text, since many
//! OpenAI-compatible servers only report status codes in the message.

use parley_types::error::ChatError;
use parley_types::llm::LlmError;

const AUTH_PATTERNS: &[&str] = &["401", "unauthorized", "invalid api key", "authentication"];
const RATE_LIMIT_PATTERNS: &[&str] = &["429", "rate limit"];
const QUOTA_PATTERNS: &[&str] = &["quota", "billing"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureClass {
    Auth,
    RateLimit,
    Quota,
    Other,
}

fn contains_any(text: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| text.contains(p))
}

fn failure_class(err: &LlmError) -> FailureClass {
    match err {
        LlmError::AuthenticationFailed => FailureClass::Auth,
        LlmError::RateLimited { .. } => FailureClass::RateLimit,
        LlmError::QuotaExceeded(_) => FailureClass::Quota,
        other => {
            let text = other.to_string().to_lowercase();
            if contains_any(&text, AUTH_PATTERNS) {
                FailureClass::Auth
            } else if contains_any(&text, RATE_LIMIT_PATTERNS) {
                FailureClass::RateLimit
            } else if contains_any(&text, QUOTA_PATTERNS) {
                FailureClass::Quota
            } else {
                FailureClass::Other
            }
        }
    }
}

fn invalid_credential() -> ChatError {
    ChatError::Unauthenticated("Invalid API key or authentication failed".to_string())
}

/// Classify a failure that happened while opening the provider stream.
pub fn classify_setup_error(err: &LlmError) -> ChatError {
    match failure_class(err) {
        FailureClass::Auth => invalid_credential(),
        FailureClass::RateLimit => {
            ChatError::ResourceExhausted("Rate limit exceeded, please try again later".to_string())
        }
        FailureClass::Quota => {
            ChatError::FailedPrecondition("API quota exceeded or billing issue".to_string())
        }
        FailureClass::Other => ChatError::Internal(format!("failed to create AI stream: {err}")),
    }
}

/// Classify a failure that happened after streaming started.
///
/// Only credential failures keep their own code; everything else is `Internal`.
pub fn classify_stream_error(err: &LlmError) -> ChatError {
    match failure_class(err) {
        FailureClass::Auth => invalid_credential(),
        _ => ChatError::Internal(format!("stream error: {err}")),
    }
}
