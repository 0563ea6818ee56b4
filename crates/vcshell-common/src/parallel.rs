//! Bounded, cancellable worker pool.

use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::error;

/// The default number of parallel tasks used by [ParallelTaskSet].
pub const DEFAULT_MAX_PARALLELISM: usize = 16;

/// Why a task in a [ParallelTaskSet] produced no output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskAbort {
    /// The set was cancelled before the task finished.
    #[error("task was cancelled")]
    Cancelled,
    /// The task panicked.
    #[error("task panicked: {0}")]
    Panicked(String),
}

/// Aborts the worker task when the wrapper owning it goes away.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// A collection of tokio tasks which execute in parallel, up to a maximum
/// amount of parallelism.
///
/// Every task is spawned with a key which is handed back together with the
/// task output, so callers can attribute panics and cancellations to the
/// unit of work that caused them.
///
/// Cancelling the token passed to [Self::with_cancellation] makes queued
/// tasks resolve immediately and aborts running ones; both come back as
/// [TaskAbort::Cancelled].
pub struct ParallelTaskSet<K, T> {
    semaphore: Arc<Semaphore>,
    set: JoinSet<(K, Result<T, TaskAbort>)>,
    cancel: CancellationToken,
}

impl<K: Send + 'static, T: Send + 'static> Default for ParallelTaskSet<K, T> {
    fn default() -> Self {
        ParallelTaskSet::new()
    }
}

impl<K: Send + 'static, T: Send + 'static> ParallelTaskSet<K, T> {
    /// Creates a new [ParallelTaskSet], with [DEFAULT_MAX_PARALLELISM] as the
    /// maximum number of tasks to run in parallel.
    pub fn new() -> Self {
        Self::new_with_parallelism(DEFAULT_MAX_PARALLELISM)
    }

    /// Creates a new [ParallelTaskSet], with `max_parallelism` as the
    /// maximum number of tasks to run in parallel. A value of zero is treated
    /// as one.
    pub fn new_with_parallelism(max_parallelism: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_parallelism.max(1))),
            set: JoinSet::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `cancel` to stop the tasks of this set.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the number of tasks not yet joined.
    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// Returns true if no task is left to join.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Spawn a task immediately, but only allow it to execute if the task
    /// set is within the maximum parallelism constraint.
    pub fn spawn<F>(&mut self, key: K, future: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        let cancel = self.cancel.clone();
        self.set.spawn(async move {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => return (key, Err(TaskAbort::Cancelled)),
                permit = semaphore.acquire_owned() => permit,
            };
            let Ok(permit) = permit else {
                return (key, Err(TaskAbort::Cancelled));
            };

            // Run on its own task so a panic surfaces as a JoinError here
            // instead of tearing down the wrapper. The worker never outlives
            // the wrapper, which the set aborts when it is dropped.
            let worker = tokio::spawn(future);
            let _abort = AbortOnDrop(worker.abort_handle());
            let output = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(TaskAbort::Cancelled),
                joined = worker => joined.map_err(|e| TaskAbort::Panicked(e.to_string())),
            };
            drop(permit);
            (key, output)
        });
    }

    /// Waits for the next task to complete and returns its key and output.
    pub async fn join_next(&mut self) -> Option<(K, Result<T, TaskAbort>)> {
        loop {
            match self.set.join_next().await? {
                Ok(output) => return Some(output),
                // The wrapper itself never panics; this only happens when the
                // runtime shuts down underneath us.
                Err(e) => error!("Worker wrapper failed to join: {}", e),
            }
        }
    }

    /// Wait for all tasks to execute and return their keys and output.
    pub async fn join_all(mut self) -> Vec<(K, Result<T, TaskAbort>)> {
        let mut outputs = Vec::with_capacity(self.set.len());
        while let Some(output) = self.join_next().await {
            outputs.push(output);
        }
        outputs
    }
}
