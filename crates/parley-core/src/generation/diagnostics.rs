//! Side channel for non-fatal failures.
//!
//! Persistence and fallback-title failures never reach the caller. They are
//! reported here instead, so production can log them and tests can assert on
//! them.

use std::fmt;

/// Classification of a non-fatal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    ConversationCreateFailed,
    MessagePersistFailed,
    ConversationTouchFailed,
    TitleRequestFailed,
    TitleEmpty,
    TitlePersistFailed,
    TitleDeliveryFailed,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::ConversationCreateFailed => "conversation_create_failed",
            DiagnosticKind::MessagePersistFailed => "message_persist_failed",
            DiagnosticKind::ConversationTouchFailed => "conversation_touch_failed",
            DiagnosticKind::TitleRequestFailed => "title_request_failed",
            DiagnosticKind::TitleEmpty => "title_empty",
            DiagnosticKind::TitlePersistFailed => "title_persist_failed",
            DiagnosticKind::TitleDeliveryFailed => "title_delivery_failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub conversation_uid: Option<String>,
    pub detail: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            conversation_uid: None,
            detail: detail.into(),
        }
    }

    pub fn for_conversation(mut self, uid: &str) -> Self {
        self.conversation_uid = Some(uid.to_string());
        self
    }
}

/// Receiver of non-fatal failure reports.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

/// Production sink: forwards every report to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn report(&self, diagnostic: Diagnostic) {
        let uid = diagnostic.conversation_uid.as_deref().unwrap_or("-");
        match diagnostic.kind {
            // The caller going away is routine.
            DiagnosticKind::TitleDeliveryFailed => tracing::debug!(
                kind = %diagnostic.kind,
                conversation_uid = uid,
                "{}",
                diagnostic.detail
            ),
            _ => tracing::warn!(
                kind = %diagnostic.kind,
                conversation_uid = uid,
                "{}",
                diagnostic.detail
            ),
        }
    }
}
