//! Task scheduler seam
//!
//! Bucket processing is deferred through a [`TaskScheduler`]; a bucket in
//! cooldown hands its task back with a delay instead of sleeping on a worker.

use futures::future::BoxFuture;
use std::time::Duration;
use tokio::runtime::Handle;

/// Runs tasks asynchronously after an optional delay
pub trait TaskScheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: BoxFuture<'static, ()>);
}

/// Scheduler backed by the tokio runtime
///
/// Delays use `tokio::time::sleep`, which parks the task and frees the
/// worker thread.
#[derive(Debug, Clone, Default)]
pub struct TokioScheduler {
    handle: Option<Handle>,
}

impl TokioScheduler {
    /// Spawn onto the runtime that is current when a task is scheduled
    ///
    /// Scheduling outside a tokio runtime panics; use [`Self::with_handle`]
    /// when tasks are queued from non-runtime threads.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn onto a specific runtime
    #[must_use]
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }
}

impl TaskScheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: BoxFuture<'static, ()>) {
        let delayed = async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            task.await;
        };

        match &self.handle {
            Some(handle) => {
                handle.spawn(delayed);
            }
            None => {
                tokio::spawn(delayed);
            }
        }
    }
}
