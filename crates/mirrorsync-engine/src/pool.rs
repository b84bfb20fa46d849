//! Fixed-size worker pool draining a shared queue
//!
//! Every worker pops the next item under a lock, releases the lock and runs
//! the handler, so each item is taken exactly once. Workers stop when the
//! queue is empty or when cancellation is signalled; items still queued at
//! that point are handed back as cancelled.

use futures::future::join_all;
use futures::FutureExt;
use mirrorsync_types::{TaskError, WorkerCount};
use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error};

/// Outcome of draining a pool
#[derive(Debug)]
pub struct PoolReport<T, R> {
    /// Items a worker attempted, with the handler's result
    pub finished: Vec<(T, Result<R, TaskError>)>,
    /// Items never taken from the queue
    pub cancelled: Vec<T>,
}

/// Pool of `size` workers over a queue of `T`
#[derive(Debug)]
pub struct WorkerPool<T> {
    queue: Arc<Mutex<VecDeque<T>>>,
    size: usize,
    task_timeout: Option<Duration>,
}

impl<T> WorkerPool<T>
where
    T: Clone + Send + 'static,
{
    /// Queue `items` for `workers` concurrent workers
    pub fn new<I: IntoIterator<Item = T>>(items: I, workers: WorkerCount) -> Self {
        Self {
            queue: Arc::new(Mutex::new(items.into_iter().collect())),
            size: workers.get(),
            task_timeout: None,
        }
    }

    /// Fail any single item that runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Run `handler` over every queued item and wait for all workers to exit
    pub async fn run<R, F, Fut>(self, handler: F, cancel: watch::Receiver<bool>) -> PoolReport<T, R>
    where
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, TaskError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        // Never spawn more workers than there are items
        let pending = self.queue.lock().await.len();
        let worker_count = self.size.min(pending);

        let workers: Vec<_> = (0..worker_count)
            .map(|worker_id| {
                let queue = Arc::clone(&self.queue);
                let handler = Arc::clone(&handler);
                let cancel = cancel.clone();
                let timeout = self.task_timeout;
                tokio::spawn(async move {
                    Self::worker(worker_id, queue, handler, cancel, timeout).await
                })
            })
            .collect();

        let mut finished = Vec::with_capacity(pending);
        for joined in join_all(workers).await {
            match joined {
                Ok(results) => finished.extend(results),
                Err(e) => error!("Worker join error: {}", e),
            }
        }

        let cancelled = self.queue.lock().await.drain(..).collect();
        PoolReport {
            finished,
            cancelled,
        }
    }

    async fn worker<R, F, Fut>(
        worker_id: usize,
        queue: Arc<Mutex<VecDeque<T>>>,
        handler: Arc<F>,
        cancel: watch::Receiver<bool>,
        timeout: Option<Duration>,
    ) -> Vec<(T, Result<R, TaskError>)>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<R, TaskError>>,
    {
        let mut results = Vec::new();

        loop {
            if *cancel.borrow() {
                debug!("Worker {} stopping: cancelled", worker_id);
                break;
            }

            // The guard is dropped before the handler runs
            let next = queue.lock().await.pop_front();
            let Some(item) = next else {
                break;
            };

            let attempt = AssertUnwindSafe((*handler)(item.clone())).catch_unwind();
            let outcome = match timeout {
                Some(limit) => match tokio::time::timeout(limit, attempt).await {
                    Ok(outcome) => outcome,
                    Err(_) => Ok(Err(TaskError::TimedOut {
                        seconds: limit.as_secs(),
                    })),
                },
                None => attempt.await,
            };

            let result = outcome.unwrap_or_else(|panic| {
                Err(TaskError::Aborted {
                    message: panic_message(panic.as_ref()),
                })
            });
            results.push((item, result));
        }

        results
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "worker panicked".to_string())
}
