//! Delayed replies that are cancelled on shutdown instead of being orphaned.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Runs futures after a delay unless shutdown is requested first.
#[derive(Clone, Default)]
pub struct ReplyScheduler {
    token: CancellationToken,
    tracker: TaskTracker,
}

impl ReplyScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` after `delay`. Returns false (and drops `task`) when already shut down.
    pub fn schedule<F>(&self, delay: Duration, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.token.is_cancelled() {
            log::debug!("scheduler: shutting down, dropping delayed task");
            return false;
        }
        let token = self.token.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    log::debug!("scheduler: delayed task cancelled by shutdown");
                }
                _ = tokio::time::sleep(delay) => task.await,
            }
        });
        true
    }

    /// Number of scheduled tasks that have not finished.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Token cancelled on shutdown; for other background loops (keep-alive).
    pub fn shutdown_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Wait for every scheduled task to finish without cancelling anything.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Cancel pending tasks and wait for them to unwind.
    pub async fn shutdown(&self) {
        self.token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        log::info!("scheduler: pending replies drained");
    }
}
