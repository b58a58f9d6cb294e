//! Caller-facing event stream port.

use parley_types::event::GenerationEvent;
use tokio::sync::mpsc;

/// The caller's event stream is no longer writable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("event stream closed")]
pub struct SinkClosed;

/// Destination for generation events.
///
/// Implementations must be cheap to clone: the fallback title generator keeps
/// a clone for late delivery after the primary call has returned.
pub trait EventSink: Send + Sync {
    fn send(
        &self,
        event: GenerationEvent,
    ) -> impl std::future::Future<Output = Result<(), SinkClosed>> + Send;
}

impl EventSink for mpsc::Sender<GenerationEvent> {
    async fn send(&self, event: GenerationEvent) -> Result<(), SinkClosed> {
        mpsc::Sender::send(self, event).await.map_err(|_| SinkClosed)
    }
}
