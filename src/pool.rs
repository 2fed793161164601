//! Fixed-size worker pool
//!
//! Workers are started once and loop forever over a shared `TaskQueue`.
//! A failing or panicking handler only costs the task it was handling.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::queue::TaskQueue;

/// Default number of workers
pub const DEFAULT_WORKERS: usize = 8;

/// A bounded set of long-lived worker tasks
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `size` workers that feed every dequeued task to `handler`
    ///
    /// Each task is handled to completion before the worker dequeues again.
    pub fn spawn<T, H, Fut>(size: usize, queue: Arc<TaskQueue<T>>, handler: H) -> Self
    where
        T: Send + 'static,
        H: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), AppError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let workers = (0..size)
            .map(|index| tokio::spawn(worker_loop(index, queue.clone(), handler.clone())))
            .collect();

        info!("Worker pool started with {} workers", size);
        Self { workers }
    }

    /// Number of workers
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Abort every worker
    ///
    /// Tasks still queued are dropped with the queue.
    pub fn shutdown(self) {
        for worker in &self.workers {
            worker.abort();
        }
        info!("Worker pool stopped");
    }
}

async fn worker_loop<T, H, Fut>(index: usize, queue: Arc<TaskQueue<T>>, handler: Arc<H>)
where
    H: Fn(T) -> Fut,
    Fut: Future<Output = Result<(), AppError>>,
{
    debug!("Worker {} ready", index);

    loop {
        let task = queue.dequeue().await;
        let outcome = AssertUnwindSafe(async { handler(task).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Worker {} handler error: {}", index, e);
            }
            Err(_) => {
                error!("Worker {} handler panicked, continuing", index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;

    async fn recv(rx: &mut mpsc::UnboundedReceiver<u32>) -> u32 {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("worker should handle the task")
            .expect("channel open")
    }

    #[tokio::test]
    async fn test_pool_handles_tasks() {
        let queue = Arc::new(TaskQueue::new());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let pool = WorkerPool::spawn(2, queue.clone(), move |n: u32| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(n);
                Ok(())
            }
        });
        assert_eq!(pool.size(), 2);

        queue.enqueue(1);
        queue.enqueue(2);

        let mut got = vec![recv(&mut rx).await, recv(&mut rx).await];
        got.sort();
        assert_eq!(got, vec![1, 2]);

        pool.shutdown();
    }

    #[tokio::test]
    async fn test_worker_survives_handler_error() {
        let queue = Arc::new(TaskQueue::new());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let pool = WorkerPool::spawn(1, queue.clone(), move |n: u32| {
            let tx = tx.clone();
            async move {
                if n == 0 {
                    return Err(AppError::EmptyRequest);
                }
                let _ = tx.send(n);
                Ok(())
            }
        });

        queue.enqueue(0);
        queue.enqueue(7);

        assert_eq!(recv(&mut rx).await, 7);
        pool.shutdown();
    }

    #[tokio::test]
    async fn test_worker_survives_handler_panic() {
        let queue = Arc::new(TaskQueue::new());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let pool = WorkerPool::spawn(1, queue.clone(), move |n: u32| {
            let tx = tx.clone();
            async move {
                if n == 0 {
                    panic!("bad connection");
                }
                let _ = tx.send(n);
                Ok(())
            }
        });

        queue.enqueue(0);
        queue.enqueue(9);

        assert_eq!(recv(&mut rx).await, 9);
        pool.shutdown();
    }

    #[tokio::test]
    async fn test_pool_bounds_concurrency() {
        let queue = Arc::new(TaskQueue::new());
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        let release = Arc::new(tokio::sync::Notify::new());

        let pool = {
            let release = release.clone();
            WorkerPool::spawn(2, queue.clone(), move |n: u32| {
                let started_tx = started_tx.clone();
                let release = release.clone();
                async move {
                    let _ = started_tx.send(n);
                    release.notified().await;
                    Ok(())
                }
            })
        };

        for n in 0..4 {
            queue.enqueue(n);
        }

        // Two workers pick up the first two tasks in FIFO order
        let mut first = vec![recv(&mut started_rx).await, recv(&mut started_rx).await];
        first.sort();
        assert_eq!(first, vec![0, 1]);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(started_rx.try_recv().is_err());
        assert_eq!(queue.len(), 2);

        pool.shutdown();
    }
}
