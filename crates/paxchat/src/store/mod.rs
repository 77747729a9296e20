//! The per-node context store: a plain map guarded by one `Mutex`, held
//! only for the duration of each primitive call.

use std::collections::HashMap;

use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("context {0} already exists")]
    AlreadyExists(u64),
    #[error("context {0} does not exist")]
    NotFound(u64),
}

/// Append-only text buffers keyed by context id, all mutually exclusive
/// under one lock. Callers that need to call out to the generator between
/// reading and appending (the `query` applier) must snapshot, drop the
/// guard, call out, then re-acquire — see `crate::consensus::applier` —
/// rather than holding this lock across an `await` on the generator.
#[derive(Debug, Default)]
pub struct ContextStore {
    contexts: Mutex<HashMap<u64, String>>,
}

impl ContextStore {
    pub fn new() -> Self {
        ContextStore {
            contexts: Mutex::new(HashMap::new()),
        }
    }

    pub async fn create(&self, id: u64) -> Result<(), StoreError> {
        let mut contexts = self.contexts.lock().await;
        if contexts.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }
        contexts.insert(id, String::new());
        Ok(())
    }

    pub async fn append_query(&self, id: u64, query: &str) -> Result<(), StoreError> {
        let mut contexts = self.contexts.lock().await;
        let text = contexts.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str("Query: ");
        text.push_str(query);
        Ok(())
    }

    pub async fn append_answer(&self, id: u64, answer: &str) -> Result<(), StoreError> {
        let mut contexts = self.contexts.lock().await;
        let text = contexts.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        text.push_str("\nAnswer: ");
        text.push_str(answer);
        Ok(())
    }

    pub async fn get(&self, id: u64) -> Option<String> {
        self.contexts.lock().await.get(&id).cloned()
    }

    pub async fn snapshot(&self) -> HashMap<u64, String> {
        self.contexts.lock().await.clone()
    }

    /// Overwrite-if-longer reconciliation against a peer's snapshot.
    /// Deliberately non-causal: a longer text always wins regardless of
    /// which write happened first.
    pub async fn merge(&self, other: &HashMap<u64, String>) {
        let mut contexts = self.contexts.lock().await;
        for (id, text) in other {
            let should_overwrite = match contexts.get(id) {
                Some(local) => local.len() < text.len(),
                None => true,
            };
            if should_overwrite {
                contexts.insert(*id, text.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_create_again_fails() {
        let store = ContextStore::new();
        store.create(1).await.unwrap();
        assert!(matches!(store.create(1).await, Err(StoreError::AlreadyExists(1))));
    }

    #[tokio::test]
    async fn append_query_then_answer_produces_expected_text() {
        let store = ContextStore::new();
        store.create(1).await.unwrap();
        store.append_query(1, "hello").await.unwrap();
        store.append_answer(1, "hi there").await.unwrap();
        assert_eq!(store.get(1).await.unwrap(), "Query: hello\nAnswer: hi there");
    }

    #[tokio::test]
    async fn append_on_missing_context_fails() {
        let store = ContextStore::new();
        assert!(matches!(
            store.append_query(1, "x").await,
            Err(StoreError::NotFound(1))
        ));
    }

    #[tokio::test]
    async fn merge_overwrites_only_when_longer() {
        let store = ContextStore::new();
        store.create(1).await.unwrap();
        store.append_query(1, "short").await.unwrap();

        let mut incoming = HashMap::new();
        incoming.insert(1, "Query: short".to_string());
        store.merge(&incoming).await;
        assert_eq!(store.get(1).await.unwrap(), "Query: short");

        incoming.insert(1, "Query: short\nAnswer: a much longer reply".to_string());
        store.merge(&incoming).await;
        assert_eq!(store.get(1).await.unwrap(), "Query: short\nAnswer: a much longer reply");
    }

    #[tokio::test]
    async fn merge_of_snapshot_into_self_is_idempotent() {
        let store = ContextStore::new();
        store.create(1).await.unwrap();
        store.append_query(1, "hello").await.unwrap();
        let before = store.snapshot().await;
        store.merge(&before).await;
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn create_twice_matches_create_once_state() {
        let a = ContextStore::new();
        a.create(1).await.unwrap();
        let _ = a.create(1).await;

        let b = ContextStore::new();
        b.create(1).await.unwrap();

        assert_eq!(a.snapshot().await, b.snapshot().await);
    }
}
