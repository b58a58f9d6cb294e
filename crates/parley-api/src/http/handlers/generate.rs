//! SSE generation endpoint.
//!
//! POST /api/v1/ai/generate
//!
//! Validation and stream-setup failures are returned as ordinary JSON error
//! responses. Once the provider stream is open the response switches to
//! Server-Sent Events, one per [`GenerationEvent`] (event name = `type`):
//! `model_ready`, `content`, `output_complete`, `session_updated`,
//! `title_generated`, `output_end`. A failure after that point is delivered
//! as a final `error` event `{ "code": "...", "message": "..." }`.
//!
//! The SSE stream stays open until the generation and any fallback title job
//! holding the sink have finished.

use std::convert::Infallible;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use parley_core::generation::service::GenerationRequest;
use parley_core::generation::sink::{EventSink, SinkClosed};
use parley_types::error::ChatError;
use parley_types::event::GenerationEvent;
use parley_types::llm::Message;

use crate::http::error::AppError;
use crate::http::extractors::auth::Caller;
use crate::state::AppState;

const EVENT_BUFFER: usize = 64;

/// Request body for the generation endpoint.
#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    pub messages: Vec<Message>,
    /// Existing conversation to continue; if absent, a new one is created.
    #[serde(default)]
    pub session_uid: Option<String>,
}

/// What travels from the generation task to the SSE response.
#[derive(Debug)]
pub enum SseMessage {
    Event(GenerationEvent),
    Failed(ChatError),
}

/// [`EventSink`] feeding the SSE response.
#[derive(Clone)]
pub struct SseSink(mpsc::Sender<SseMessage>);

impl EventSink for SseSink {
    async fn send(&self, event: GenerationEvent) -> Result<(), SinkClosed> {
        self.0
            .send(SseMessage::Event(event))
            .await
            .map_err(|_| SinkClosed)
    }
}

/// Render one message as an SSE event.
pub fn to_sse_event(message: SseMessage) -> Event {
    match message {
        SseMessage::Event(event) => match serde_json::to_string(&event) {
            Ok(data) => Event::default().event(event.name()).data(data),
            Err(e) => error_event("INTERNAL", &format!("failed to encode event: {e}")),
        },
        SseMessage::Failed(err) => error_event(err.code(), err.message()),
    }
}

fn error_event(code: &str, message: &str) -> Event {
    let data = serde_json::json!({ "code": code, "message": message });
    Event::default().event("error").data(data.to_string())
}

/// POST /api/v1/ai/generate
pub async fn generate(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<GenerateBody>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let request = GenerationRequest {
        messages: body.messages,
        conversation_uid: body.session_uid,
    };
    let generation = state
        .generation_service
        .start(caller.user(), request)
        .await?;

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let sink = SseSink(tx.clone());
    state.tasks.spawn_detached("generation", async move {
        if let Err(e) = generation.run(sink).await {
            tracing::warn!(code = e.code(), "Generation failed mid-stream: {e}");
            let _ = tx.send(SseMessage::Failed(e)).await;
        }
    });

    let stream = ReceiverStream::new(rx).map(|message| Ok::<_, Infallible>(to_sse_event(message)));
    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_body_parses() {
        let body: GenerateBody = serde_json::from_str(
            r#"{"messages":[{"role":"user","content":"Explain recursion"}]}"#,
        )
        .unwrap();
        assert_eq!(body.messages, vec![Message::user("Explain recursion")]);
        assert!(body.session_uid.is_none());

        let body: GenerateBody = serde_json::from_str(
            r#"{"messages":[],"session_uid":"0190-abc"}"#,
        )
        .unwrap();
        assert_eq!(body.session_uid.as_deref(), Some("0190-abc"));
    }

    #[tokio::test]
    async fn test_sse_sink_forwards_events() {
        let (tx, mut rx) = mpsc::channel(4);
        let sink = SseSink(tx);
        sink.send(GenerationEvent::content("Hi")).await.unwrap();
        match rx.recv().await {
            Some(SseMessage::Event(event)) => assert_eq!(event, GenerationEvent::content("Hi")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sse_sink_reports_closed_stream() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let result = SseSink(tx).send(GenerationEvent::output_end()).await;
        assert_eq!(result, Err(SinkClosed));
    }
}
