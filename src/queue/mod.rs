//! Queue transport contract and dispatch.
//!
//! The core needs very little from the queue: accept a [`WorkItem`] and let
//! an external driver pull items back out. Delivery and retry semantics of
//! the transport are out of scope — the pipeline never relies on queue
//! retries, all retry behavior comes from the scheduler's next due-check.

mod dispatcher;
mod item;

pub use dispatcher::Dispatcher;
pub use item::WorkItem;

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// FIFO queue transport the dispatcher feeds and a driver drains.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Offer an item to the queue. Returns whether the item was accepted.
    async fn enqueue(&self, item: WorkItem) -> bool;

    /// Pull the next item, if any. Used by the external driver loop.
    async fn dequeue(&self) -> Option<WorkItem>;
}

/// In-memory FIFO queue for tests and single-process embedding.
#[derive(Default)]
pub struct InMemoryQueue {
    items: Mutex<VecDeque<WorkItem>>,
}

impl InMemoryQueue {
    /// Create a new empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items currently queued.
    pub fn len(&self) -> usize {
        self.items.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn enqueue(&self, item: WorkItem) -> bool {
        match self.items.lock() {
            Ok(mut items) => {
                items.push_back(item);
                true
            }
            Err(_) => false,
        }
    }

    async fn dequeue(&self) -> Option<WorkItem> {
        self.items.lock().ok()?.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TaskId;

    #[tokio::test]
    async fn test_enqueue_dequeue_is_fifo() {
        let queue = InMemoryQueue::new();

        assert!(queue.enqueue(WorkItem::new(TaskId::new("a"), Default::default())).await);
        assert!(queue.enqueue(WorkItem::new(TaskId::new("b"), Default::default())).await);
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.dequeue().await.unwrap().task_id.as_str(), "a");
        assert_eq!(queue.dequeue().await.unwrap().task_id.as_str(), "b");
        assert!(queue.dequeue().await.is_none());
        assert!(queue.is_empty());
    }
}
