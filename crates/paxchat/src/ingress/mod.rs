//! Operator ingress: the FIFO pending-operations queue. A
//! `Mutex<VecDeque<_>>` paired with a `Notify` for async
//! condition-variable-style waiting.

use std::collections::VecDeque;

use tokio::sync::{Mutex, Notify};

/// A FIFO of command strings submitted locally but not yet decided.
/// Drained head-first by the consensus loop; `wait_for_work` parks until
/// either something is enqueued or the queue is already non-empty.
#[derive(Debug, Default)]
pub struct PendingQueue {
    queue: Mutex<VecDeque<String>>,
    notify: Notify,
}

impl PendingQueue {
    pub fn new() -> Self {
        PendingQueue {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    pub async fn push(&self, command: String) {
        self.queue.lock().await.push_back(command);
        self.notify.notify_one();
    }

    /// Returns the head command without removing it, or blocks until one
    /// is available.
    pub async fn wait_for_head(&self) -> String {
        loop {
            if let Some(head) = self.queue.lock().await.front().cloned() {
                return head;
            }
            self.notify.notified().await;
        }
    }

    /// Removes the current head — called once it has been successfully
    /// decided, forwarded (on `ACK`), or permanently discarded after an
    /// unrecoverable timeout.
    pub async fn pop_head(&self) {
        self.queue.lock().await.pop_front();
    }

    pub async fn is_empty(&self) -> bool {
        self.queue.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn fifo_order_is_preserved() {
        let q = PendingQueue::new();
        q.push("create 1".to_string()).await;
        q.push("create 2".to_string()).await;

        assert_eq!(q.wait_for_head().await, "create 1");
        q.pop_head().await;
        assert_eq!(q.wait_for_head().await, "create 2");
    }

    #[tokio::test]
    async fn wait_for_head_unblocks_on_push() {
        let q = Arc::new(PendingQueue::new());
        let reader = {
            let q = q.clone();
            tokio::spawn(async move { q.wait_for_head().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        q.push("query 1 hi".to_string()).await;

        let head = tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(head, "query 1 hi");
    }

    #[tokio::test]
    async fn empty_queue_reports_empty() {
        let q = PendingQueue::new();
        assert!(q.is_empty().await);
        q.push("create 1".to_string()).await;
        assert!(!q.is_empty().await);
    }
}
