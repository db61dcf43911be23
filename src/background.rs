//! Detached, tracked background work.
//!
//! Handlers use [`BackgroundTasks::spawn`] for fire-and-forget jobs such as
//! sending the welcome email after the response has been written. Each task
//! runs behind its own panic boundary; failures are logged and counted but
//! never reach the request that spawned them. At shutdown the server calls
//! [`BackgroundTasks::shutdown`] to wait for whatever is still running.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

use crate::error::panic_message;
use crate::metrics::Metrics;

#[derive(Clone)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
    metrics: Metrics,
}

impl BackgroundTasks {
    pub fn new(metrics: Metrics) -> Self {
        Self { tracker: TaskTracker::new(), metrics }
    }

    /// Launches `task` detached from the caller.
    ///
    /// `name` only labels log lines. After [`shutdown`](Self::shutdown) has
    /// started, new tasks are still run and still awaited.
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.metrics.inc_background_spawned();
        let metrics = self.metrics.clone();
        self.tracker.spawn(async move {
            match AssertUnwindSafe(task).catch_unwind().await {
                Ok(Ok(())) => debug!(task = name, "background task finished"),
                Ok(Err(e)) => {
                    metrics.inc_background_failed();
                    error!(task = name, "background task failed: {:#}", e);
                }
                Err(payload) => {
                    metrics.inc_background_failed();
                    error!(task = name, "background task panicked: {}", panic_message(payload.as_ref()));
                }
            }
        });
    }

    /// Number of tasks still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Waits for all outstanding tasks, giving up after `grace`.
    ///
    /// Returns `true` when every task completed in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            debug!("waiting for {} background task(s)", pending);
        }
        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!("{} background task(s) still running after {:?}", self.tracker.len(), grace);
                false
            }
        }
    }
}
