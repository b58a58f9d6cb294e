//! Detached background work.
//!
//! Work spawned here is not tied to the request that scheduled it: it keeps
//! running after the caller disconnects and is only cancelled when the pool
//! itself shuts down.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Fire-and-forget task pool with its own cancellation scope.
#[derive(Debug, Clone, Default)]
pub struct TaskPool {
    tracker: TaskTracker,
    cancellation: CancellationToken,
}

impl TaskPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `future` in the background. Its result is never observed.
    pub fn spawn_detached<F>(&self, name: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cancellation = self.cancellation.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    tracing::debug!(task = name, "Detached task cancelled");
                }
                _ = future => {
                    tracing::debug!(task = name, "Detached task finished");
                }
            }
        });
    }

    /// Number of tasks still running.
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Wait for every task spawned so far to finish.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Wait up to `grace` for running tasks, then cancel the rest.
    ///
    /// Returns `true` when everything finished within the grace period.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        if tokio::time::timeout(grace, self.tracker.wait()).await.is_ok() {
            return true;
        }
        tracing::warn!(
            remaining = self.tracker.len(),
            "Detached tasks still running after {grace:?}, cancelling"
        );
        self.cancellation.cancel();
        self.tracker.wait().await;
        false
    }
}
