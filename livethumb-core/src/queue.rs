//! Bounded intake queue between the directory watcher and the worker pool.
//!
//! Producers block when the queue is full; nothing is dropped. Consumers
//! share a single receiver so every item is delivered to exactly one worker.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use crate::error::{BroadcastError, Result};
use crate::frame::WorkItem;

/// Multi-producer, multi-consumer bounded mailbox of pending frame paths.
#[derive(Clone)]
pub struct IntakeQueue {
    tx: mpsc::Sender<WorkItem>,
    rx: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
    capacity: usize,
}

impl fmt::Debug for IntakeQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntakeQueue")
            .field("capacity", &self.capacity)
            .field("queued", &self.len())
            .finish()
    }
}

impl IntakeQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items currently waiting for a worker.
    pub fn len(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enqueue from async code, waiting while the queue is full.
    pub async fn put(&self, item: WorkItem) -> Result<()> {
        self.tx.send(item).await.map_err(|_| closed())
    }

    /// Enqueue from a plain OS thread (the watcher callback), blocking that
    /// thread while the queue is full.
    ///
    /// Must not be called from within an async execution context.
    pub fn blocking_put(&self, item: WorkItem) -> Result<()> {
        self.tx.blocking_send(item).map_err(|_| closed())
    }

    /// Wait for the next item. Returns `None` only when every producer
    /// handle has been dropped and the queue is drained.
    ///
    /// Idle consumers wait on the shared receiver in turn; cancelling a
    /// pending `get` releases it for the next one.
    pub async fn get(&self) -> Option<WorkItem> {
        let mut guard = self.rx.lock().await;
        guard.recv().await
    }
}

fn closed() -> BroadcastError {
    BroadcastError::Internal("intake queue is closed".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn put_waits_while_full() {
        let queue = IntakeQueue::new(2);
        queue.put(WorkItem::new("a/1")).await.unwrap();
        queue.put(WorkItem::new("a/2")).await.unwrap();
        assert_eq!(queue.len(), 2);

        let blocked =
            timeout(Duration::from_millis(50), queue.put(WorkItem::new("a/3")))
                .await;
        assert!(blocked.is_err(), "put should block when the queue is full");

        assert_eq!(queue.get().await, Some(WorkItem::new("a/1")));
        timeout(Duration::from_millis(50), queue.put(WorkItem::new("a/3")))
            .await
            .expect("put should proceed once space frees up")
            .unwrap();
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn every_item_is_delivered_exactly_once() {
        let queue = IntakeQueue::new(8);
        for i in 0..5 {
            queue.put(WorkItem::new(format!("c/{i}"))).await.unwrap();
        }

        let mut consumers = Vec::new();
        for _ in 0..3 {
            let q = queue.clone();
            consumers.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Ok(Some(item)) =
                    timeout(Duration::from_millis(50), q.get()).await
                {
                    seen.push(item);
                }
                seen
            }));
        }

        let mut all = Vec::new();
        for consumer in consumers {
            all.extend(consumer.await.unwrap());
        }
        all.sort_by(|a, b| a.path().cmp(b.path()));
        let expected: Vec<_> =
            (0..5).map(|i| WorkItem::new(format!("c/{i}"))).collect();
        assert_eq!(all, expected);
    }

    #[tokio::test]
    async fn blocking_put_from_plain_thread() {
        let queue = IntakeQueue::new(1);
        let producer = queue.clone();
        let handle = std::thread::spawn(move || {
            producer.blocking_put(WorkItem::new("t/1")).unwrap();
            producer.blocking_put(WorkItem::new("t/2")).unwrap();
        });

        assert_eq!(queue.get().await, Some(WorkItem::new("t/1")));
        assert_eq!(queue.get().await, Some(WorkItem::new("t/2")));
        tokio::task::spawn_blocking(move || handle.join().unwrap())
            .await
            .unwrap();
    }
}
