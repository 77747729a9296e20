use std::collections::HashMap;

use tokio::sync::Mutex;

/// Per-node buffer of generated answers awaiting an operator `choose`. Not
/// part of replicated state.
///
/// Bounded by eviction: entries for a context id are evicted the moment a
/// `choose` for that id is decided, so the buffer never grows unbounded
/// even if the operator never issues a `choose`.
#[derive(Debug, Default)]
pub struct CollectedResponses {
    inner: Mutex<HashMap<u64, HashMap<i64, String>>>,
}

impl CollectedResponses {
    pub fn new() -> Self {
        CollectedResponses {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub async fn record(&self, context_id: u64, server_id: i64, text: String) {
        self.inner
            .lock()
            .await
            .entry(context_id)
            .or_default()
            .insert(server_id, text);
    }

    pub async fn get(&self, context_id: u64, server_id: i64) -> Option<String> {
        self.inner
            .lock()
            .await
            .get(&context_id)
            .and_then(|by_server| by_server.get(&server_id).cloned())
    }

    pub async fn snapshot(&self, context_id: u64) -> HashMap<i64, String> {
        self.inner
            .lock()
            .await
            .get(&context_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Evicts and returns everything recorded for `context_id`.
    pub async fn evict(&self, context_id: u64) -> HashMap<i64, String> {
        self.inner.lock().await.remove(&context_id).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_and_reads_back_by_server_id() {
        let r = CollectedResponses::new();
        r.record(7, 0, "answer from node 0".to_string()).await;
        r.record(7, 1, "answer from node 1".to_string()).await;

        assert_eq!(r.get(7, 0).await.unwrap(), "answer from node 0");
        assert_eq!(r.get(7, 2).await, None);
    }

    #[tokio::test]
    async fn evict_clears_all_entries_for_the_id() {
        let r = CollectedResponses::new();
        r.record(7, 0, "a".to_string()).await;
        r.record(7, 1, "b".to_string()).await;

        let evicted = r.evict(7).await;
        assert_eq!(evicted.len(), 2);
        assert_eq!(r.snapshot(7).await.len(), 0);
    }
}
