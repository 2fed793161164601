//! Shared task queue
//!
//! An unbounded multi-producer, multi-consumer FIFO. Producers never block;
//! consumers suspend while the queue is empty.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

/// Unbounded FIFO shared between the accept loop and the workers
#[derive(Debug)]
pub struct TaskQueue<T> {
    items: Mutex<VecDeque<T>>,
    available: Notify,
}

impl<T> TaskQueue<T> {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Notify::new(),
        }
    }

    /// Push `item` to the tail and wake at most one waiting consumer
    pub fn enqueue(&self, item: T) {
        self.lock().push_back(item);
        self.available.notify_one();
    }

    /// Pop the head, waiting while the queue is empty
    ///
    /// Each item is returned to exactly one caller. The lock is released
    /// while waiting.
    pub async fn dequeue(&self) -> T {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let next = self.lock().pop_front();
            if let Some(item) = next {
                return item;
            }

            notified.await;
        }
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = TaskQueue::new();
        queue.enqueue(1);
        queue.enqueue(2);
        queue.enqueue(3);

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dequeue().await, 1);
        assert_eq!(queue.dequeue().await, 2);
        assert_eq!(queue.dequeue().await, 3);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_dequeue_waits_for_enqueue() {
        let queue = Arc::new(TaskQueue::new());

        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.dequeue().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!consumer.is_finished());

        queue.enqueue("job");
        let item = tokio::time::timeout(Duration::from_secs(2), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item, "job");
    }

    #[tokio::test]
    async fn test_dequeue_preserves_fifo() {
        let queue = TaskQueue::new();
        for n in 0..5 {
            queue.enqueue(n);
        }

        let mut out = Vec::new();
        for _ in 0..5 {
            out.push(queue.dequeue().await);
        }
        assert_eq!(out, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_each_item_delivered_once() {
        let queue = Arc::new(TaskQueue::new());
        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                tokio::spawn(async move {
                    let mut seen = Vec::new();
                    for _ in 0..50 {
                        seen.push(queue.dequeue().await);
                    }
                    seen
                })
            })
            .collect();

        for n in 0..200 {
            queue.enqueue(n);
        }

        let mut all = HashSet::new();
        for consumer in consumers {
            let seen = tokio::time::timeout(Duration::from_secs(5), consumer)
                .await
                .unwrap()
                .unwrap();
            // Each consumer sees its share in queue order
            assert!(seen.windows(2).all(|w| w[0] < w[1]));
            for item in seen {
                assert!(all.insert(item), "item {} delivered twice", item);
            }
        }
        assert_eq!(all.len(), 200);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_idle_consumers_all_woken() {
        let queue = Arc::new(TaskQueue::new());
        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let queue = queue.clone();
                tokio::spawn(async move { queue.dequeue().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(50)).await;
        for n in 0..3 {
            queue.enqueue(n);
        }

        let mut got = Vec::new();
        for consumer in consumers {
            got.push(
                tokio::time::timeout(Duration::from_secs(2), consumer)
                    .await
                    .unwrap()
                    .unwrap(),
            );
        }
        got.sort();
        assert_eq!(got, vec![0, 1, 2]);
    }
}
