//! Cancellable scheduled tasks.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// A task that runs after a delay unless cancelled first.
///
/// Cancelling aborts the underlying tokio task, so neither the delay nor the
/// work runs past the next await point.
#[derive(Debug)]
pub struct ScheduledTask {
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Spawns `task` to run after `delay`.
    pub fn after<F>(delay: Duration, task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });

        Self { handle }
    }

    /// Cancels the task. Safe to call more than once.
    pub fn cancel(&self) {
        self.handle.abort();
    }
}
