//! Where pending work comes from.

use async_trait::async_trait;
use drover_core::{DroverResult, WorkItem};
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// Source of pending work items.
///
/// The orchestrator pulls one item at a time and never sees the rest of
/// the queue, so implementations are free to reorder, dedupe, or refill
/// between calls.
#[async_trait]
pub trait Backlog: Send + Sync {
    /// Pop the next pending item, or `None` when the backlog is drained.
    async fn next_item(&self) -> DroverResult<Option<WorkItem>>;

    /// Number of items currently waiting.
    async fn len(&self) -> usize;

    /// True when no items are waiting.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// FIFO backlog held in process memory.
pub struct InMemoryBacklog {
    items: Mutex<VecDeque<WorkItem>>,
}

impl InMemoryBacklog {
    /// Creates an empty backlog.
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
        }
    }

    /// Seed the backlog from a list of titles, assigning sequential ids.
    pub fn from_titles<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items = titles
            .into_iter()
            .enumerate()
            .map(|(i, title)| WorkItem::new(format!("W-{}", i + 1), title))
            .collect();
        Self {
            items: Mutex::new(items),
        }
    }

    /// Append an item to the back of the queue.
    pub async fn push(&self, item: WorkItem) {
        let mut items = self.items.lock().await;
        items.push_back(item);
    }
}

impl Default for InMemoryBacklog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backlog for InMemoryBacklog {
    async fn next_item(&self) -> DroverResult<Option<WorkItem>> {
        let mut items = self.items.lock().await;
        Ok(items.pop_front())
    }

    async fn len(&self) -> usize {
        let items = self.items.lock().await;
        items.len()
    }
}

// ─────────────────────────── Tests ───────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_order() {
        let backlog = InMemoryBacklog::from_titles(["first", "second", "third"]);
        assert_eq!(backlog.len().await, 3);

        let a = backlog.next_item().await.unwrap().unwrap();
        let b = backlog.next_item().await.unwrap().unwrap();
        assert_eq!(a.title, "first");
        assert_eq!(a.item_id, "W-1");
        assert_eq!(b.title, "second");
        assert_eq!(backlog.len().await, 1);
    }

    #[tokio::test]
    async fn test_drained_backlog_yields_none() {
        let backlog = InMemoryBacklog::new();
        assert!(backlog.is_empty().await);
        assert!(backlog.next_item().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_push_after_drain() {
        let backlog = InMemoryBacklog::new();
        assert!(backlog.next_item().await.unwrap().is_none());

        backlog.push(WorkItem::new("W-9", "late arrival")).await;
        let item = backlog.next_item().await.unwrap().unwrap();
        assert_eq!(item.title, "late arrival");
    }
}
