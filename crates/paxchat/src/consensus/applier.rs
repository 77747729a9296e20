//! The command applier, invoked on `DECIDE`: tokenise, dispatch on the
//! parsed `Command`, bump the slot regardless of whether the store
//! operation succeeded, and — on non-leader nodes — merge the decision's
//! `contexts` snapshot and reply `RESPONSE` to the decision's source for a
//! successful `query`.

use std::sync::Arc;

use paxchat_core::Command;
use tracing::{debug, warn};

use crate::generator::Generator;
use crate::store::ContextStore;

use super::responses::CollectedResponses;

/// Outcome of applying one decided command. `response_text` is set only
/// when this node is not the leader and the command was a successful
/// `query` — the caller sends it back to the decision's `src` as a
/// `RESPONSE` frame.
pub struct ApplyOutcome {
    pub response_text: Option<String>,
}

/// Applies `raw` (the decided command string) to `store`, recording any
/// generated answer under `self_id` in `collected_responses`.
///
/// The store's lock is never held across the generator call. `query`
/// snapshots the prompt via
/// [`ContextStore::get`] (which only holds the lock for that call), drops
/// it, awaits the generator, then appends the returned text via
/// [`ContextStore::append_answer`] (a second, independent critical
/// section) — so a concurrent `choose`/`append_answer` on the same id is
/// never silently lost, just ordered after whichever append wins the race
/// to re-acquire the lock.
pub async fn apply(
    raw: &str,
    self_id: i64,
    is_leader: bool,
    store: &ContextStore,
    generator: &Arc<dyn Generator>,
    collected_responses: &CollectedResponses,
) -> ApplyOutcome {
    let command = match Command::parse(raw) {
        Ok(command) => command,
        Err(e) => {
            warn!(error = %e, raw, "applier: command failed to parse, slot consumed as no-op");
            return ApplyOutcome { response_text: None };
        }
    };

    match command {
        Command::Create { context_id } => {
            if let Err(e) = store.create(context_id).await {
                debug!(context_id, error = %e, "create: store precondition failed, no-op");
            }
            ApplyOutcome { response_text: None }
        }
        Command::Query { context_id, text } => {
            if let Err(e) = store.append_query(context_id, &text).await {
                debug!(context_id, error = %e, "query: store precondition failed, no-op");
                return ApplyOutcome { response_text: None };
            }

            let prompt = match store.get(context_id).await {
                Some(current) => format!("{current}\nAnswer: "),
                None => return ApplyOutcome { response_text: None },
            };

            match generator.generate(&prompt).await {
                Ok(answer) => {
                    collected_responses
                        .record(context_id, self_id, answer.clone())
                        .await;
                    if is_leader {
                        ApplyOutcome { response_text: None }
                    } else {
                        ApplyOutcome {
                            response_text: Some(answer),
                        }
                    }
                }
                Err(e) => {
                    warn!(context_id, error = %e, "generator failed, query slot applied without an answer");
                    ApplyOutcome { response_text: None }
                }
            }
        }
        Command::Choose { context_id, text } => {
            if let Err(e) = store.append_answer(context_id, &text).await {
                debug!(context_id, error = %e, "choose: store precondition failed, no-op");
            }
            collected_responses.evict(context_id).await;
            ApplyOutcome { response_text: None }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::EchoGenerator;

    #[tokio::test]
    async fn create_then_query_appends_expected_text_and_records_response() {
        let store = ContextStore::new();
        let generator: Arc<dyn Generator> = Arc::new(EchoGenerator);
        let responses = CollectedResponses::new();

        apply("create 7", 0, true, &store, &generator, &responses).await;
        apply("query 7 hello there", 0, true, &store, &generator, &responses).await;

        assert_eq!(store.get(7).await.unwrap(), "Query: hello there");
        assert!(responses.get(7, 0).await.is_some());
    }

    #[tokio::test]
    async fn non_leader_query_returns_response_text_leader_does_not() {
        let store = ContextStore::new();
        let generator: Arc<dyn Generator> = Arc::new(EchoGenerator);
        let responses = CollectedResponses::new();
        store.create(7).await.unwrap();

        let leader_outcome = apply("query 7 hi", 0, true, &store, &generator, &responses).await;
        assert!(leader_outcome.response_text.is_none());

        let follower_outcome =
            apply("query 7 hi", 1, false, &store, &generator, &responses).await;
        assert!(follower_outcome.response_text.is_some());
    }

    #[tokio::test]
    async fn choose_evicts_collected_responses_for_that_id() {
        let store = ContextStore::new();
        let generator: Arc<dyn Generator> = Arc::new(EchoGenerator);
        let responses = CollectedResponses::new();
        store.create(7).await.unwrap();
        responses.record(7, 0, "echo:2".to_string()).await;

        apply("choose 7 final answer", 0, true, &store, &generator, &responses).await;

        assert_eq!(store.get(7).await.unwrap(), "\nAnswer: final answer");
        assert!(responses.get(7, 0).await.is_none());
    }

    #[tokio::test]
    async fn malformed_command_is_a_logged_no_op() {
        let store = ContextStore::new();
        let generator: Arc<dyn Generator> = Arc::new(EchoGenerator);
        let responses = CollectedResponses::new();

        let outcome = apply("frobnicate", 0, true, &store, &generator, &responses).await;
        assert!(outcome.response_text.is_none());
    }
}
