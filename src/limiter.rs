//! Bounded-concurrency scheduling
//!
//! [`run_bounded`] turns a worklist and an async task into a stream of task
//! outputs, with at most `limit` tasks in flight. Outputs arrive in completion
//! order, which generally differs from input order. The [`Strategy`] only changes
//! how the bound is enforced, never the contract:
//!
//! - `Buffered`: `buffer_unordered` over a stream of futures, polled by the consumer.
//! - `Semaphore`: one spawned task per item, admitted by a counting semaphore.
//! - `Pool`: `limit` spawned workers pulling items from a shared queue.
//! - `Sequential`: one item at a time, in input order.

use crate::config::Strategy;
use futures::stream::{self, BoxStream, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore, mpsc};
use tokio_stream::wrappers::ReceiverStream;

/// Run `task` over every item with at most `limit` invocations in flight
///
/// Each item is handed to `task` exactly once. A `limit` of zero is treated as one.
pub fn run_bounded<I, T, F, Fut>(
    strategy: Strategy,
    items: Vec<I>,
    limit: usize,
    task: F,
) -> BoxStream<'static, T>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    let limit = limit.max(1);
    tracing::debug!(%strategy, limit, items = items.len(), "Dispatching work");

    match strategy {
        Strategy::Buffered => buffered(items, limit, task),
        Strategy::Semaphore => semaphore_gated(items, limit, task),
        Strategy::Pool => worker_pool(items, limit, task),
        Strategy::Sequential => sequential(items, task),
    }
}

fn buffered<I, T, F, Fut>(items: Vec<I>, limit: usize, task: F) -> BoxStream<'static, T>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    stream::iter(items)
        .map(move |item| task(item))
        .buffer_unordered(limit)
        .boxed()
}

fn sequential<I, T, F, Fut>(items: Vec<I>, task: F) -> BoxStream<'static, T>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    stream::iter(items).then(move |item| task(item)).boxed()
}

fn semaphore_gated<I, T, F, Fut>(items: Vec<I>, limit: usize, task: F) -> BoxStream<'static, T>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(limit);
    let permits = Arc::new(Semaphore::new(limit));

    tokio::spawn(async move {
        for item in items {
            // Acquire before dispatch; the permit lives inside the spawned task
            let acquired = tokio::select! {
                biased;
                () = tx.closed() => {
                    tracing::debug!("Result receiver dropped, stopping dispatch");
                    return;
                }
                acquired = Arc::clone(&permits).acquire_owned() => acquired,
            };
            let permit = match acquired {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::error!(error = %e, "Concurrency semaphore closed, stopping dispatch");
                    return;
                }
            };
            let fut = task(item);
            let tx = tx.clone();
            tokio::spawn(async move {
                let output = fut.await;
                drop(permit);
                if tx.send(output).await.is_err() {
                    tracing::warn!("Result receiver dropped, discarding output");
                }
            });
        }
    });

    ReceiverStream::new(rx).boxed()
}

fn worker_pool<I, T, F, Fut>(items: Vec<I>, limit: usize, task: F) -> BoxStream<'static, T>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(limit);
    let workers = limit.min(items.len()).max(1);
    let queue = Arc::new(Mutex::new(items.into_iter()));
    let task = Arc::new(task);

    for worker in 0..workers {
        let queue = Arc::clone(&queue);
        let task = Arc::clone(&task);
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut processed = 0usize;
            loop {
                if tx.is_closed() {
                    tracing::debug!(worker, "Result receiver dropped, stopping worker");
                    break;
                }
                // Hold the queue lock only long enough to take one item
                let next = queue.lock().await.next();
                let Some(item) = next else {
                    break;
                };
                let output = task(item).await;
                processed += 1;
                if tx.send(output).await.is_err() {
                    tracing::warn!(worker, "Result receiver dropped, stopping worker");
                    break;
                }
            }
            tracing::trace!(worker, processed, "Worker finished");
        });
    }

    ReceiverStream::new(rx).boxed()
}
