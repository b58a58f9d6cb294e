//! Caller-facing event model for a generation call.
//!
//! A successful call emits, in order: `ModelReady`, zero or more `Content`,
//! `OutputComplete`, at most one `SessionUpdated`, at most one
//! `TitleGenerated`, then `OutputEnd`. A `TitleGenerated` produced by the
//! fallback title generator may arrive after `OutputEnd`.

use serde::{Deserialize, Serialize};

use crate::chat::ConversationView;

/// Events delivered to the caller during one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationEvent {
    /// The provider stream is open; content follows.
    ModelReady {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// A visible text fragment.
    Content { text: String },

    /// The provider finished generating.
    OutputComplete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// A conversation was created for this exchange.
    SessionUpdated {
        conversation: ConversationView,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// The conversation received its title.
    TitleGenerated {
        conversation: ConversationView,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Final event of the synchronous sequence.
    OutputEnd {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

/// Fieldless discriminant of [`GenerationEvent`], used for ordering checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ModelReady,
    Content,
    OutputComplete,
    SessionUpdated,
    TitleGenerated,
    OutputEnd,
}

impl GenerationEvent {
    pub fn model_ready() -> Self {
        GenerationEvent::ModelReady { message: None }
    }

    pub fn content(text: impl Into<String>) -> Self {
        GenerationEvent::Content { text: text.into() }
    }

    pub fn output_complete() -> Self {
        GenerationEvent::OutputComplete { message: None }
    }

    pub fn session_updated(conversation: ConversationView) -> Self {
        GenerationEvent::SessionUpdated {
            conversation,
            message: None,
        }
    }

    pub fn title_generated(conversation: ConversationView) -> Self {
        GenerationEvent::TitleGenerated {
            conversation,
            message: None,
        }
    }

    pub fn output_end() -> Self {
        GenerationEvent::OutputEnd { message: None }
    }

    /// Attach a human-readable status message. `Content` events carry none.
    pub fn with_message(mut self, text: impl Into<String>) -> Self {
        match &mut self {
            GenerationEvent::Content { .. } => {}
            GenerationEvent::ModelReady { message }
            | GenerationEvent::OutputComplete { message }
            | GenerationEvent::SessionUpdated { message, .. }
            | GenerationEvent::TitleGenerated { message, .. }
            | GenerationEvent::OutputEnd { message } => *message = Some(text.into()),
        }
        self
    }

    pub fn kind(&self) -> EventKind {
        match self {
            GenerationEvent::ModelReady { .. } => EventKind::ModelReady,
            GenerationEvent::Content { .. } => EventKind::Content,
            GenerationEvent::OutputComplete { .. } => EventKind::OutputComplete,
            GenerationEvent::SessionUpdated { .. } => EventKind::SessionUpdated,
            GenerationEvent::TitleGenerated { .. } => EventKind::TitleGenerated,
            GenerationEvent::OutputEnd { .. } => EventKind::OutputEnd,
        }
    }

    /// Wire name of the event (matches the serde tag).
    pub fn name(&self) -> &'static str {
        match self.kind() {
            EventKind::ModelReady => "model_ready",
            EventKind::Content => "content",
            EventKind::OutputComplete => "output_complete",
            EventKind::SessionUpdated => "session_updated",
            EventKind::TitleGenerated => "title_generated",
            EventKind::OutputEnd => "output_end",
        }
    }
}
