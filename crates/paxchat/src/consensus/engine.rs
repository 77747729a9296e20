//! The consensus engine: ballots, leader election, the accept/decide
//! round, forwarding, and the acceptor/proposer state machine.
//!
//! One engine per node, driven by a spawned loop, with round state behind
//! an async mutex and `Notify` standing in for condition-variable waits.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use paxchat_core::{Ballot, Command, Frame, Header, NONE_ID};
use tokio::sync::{mpsc, Mutex, Notify};
use tracing::{debug, info, warn};

use crate::generator::Generator;
use crate::ingress::PendingQueue;
use crate::store::ContextStore;

use super::applier;
use super::responses::CollectedResponses;

const ELECTION_TIMEOUT: Duration = Duration::from_secs(10);
const FORWARD_ACK_TIMEOUT: Duration = Duration::from_secs(10);
const ACCEPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Backoff before re-entering the accept phase after a timeout, so a
/// steadily failing round does not become a tight spin.
const ACCEPT_RETRY_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, thiserror::Error)]
pub enum ConsensusError {
    #[error("outbound channel to the relay is closed")]
    OutboundClosed,
}

struct RoundState {
    seq: i64,
    promised_ballot: Ballot,
    leader_id: i64,
    promising_ballot: Option<Ballot>,
    promised_count: usize,
    accepting_ballot: Option<Ballot>,
    accepted_count: usize,
}

enum ForwardOutcome {
    Acked,
    TimedOut,
}

/// One node's consensus state machine. `run` drains the pending queue
/// forever; `handle_frame` dispatches an inbound frame from the relay.
pub struct ConsensusEngine {
    id: i64,
    num_nodes: usize,
    majority: usize,
    state: Mutex<RoundState>,
    promised_notify: Notify,
    accepted_notify: Notify,
    ack_notify: Notify,
    next_op: AtomicI64,
    store: Arc<ContextStore>,
    pending: Arc<PendingQueue>,
    generator: Arc<dyn Generator>,
    responses: CollectedResponses,
    outbound: mpsc::Sender<Frame>,
}

impl ConsensusEngine {
    pub fn new(
        id: i64,
        num_nodes: usize,
        store: Arc<ContextStore>,
        pending: Arc<PendingQueue>,
        generator: Arc<dyn Generator>,
        outbound: mpsc::Sender<Frame>,
    ) -> Self {
        ConsensusEngine {
            id,
            num_nodes,
            majority: num_nodes / 2,
            state: Mutex::new(RoundState {
                seq: 1,
                promised_ballot: Ballot::NONE,
                leader_id: NONE_ID,
                promising_ballot: None,
                promised_count: 0,
                accepting_ballot: None,
                accepted_count: 0,
            }),
            promised_notify: Notify::new(),
            accepted_notify: Notify::new(),
            ack_notify: Notify::new(),
            next_op: AtomicI64::new(0),
            store,
            pending,
            generator,
            responses: CollectedResponses::new(),
            outbound,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn collected_responses(&self) -> &CollectedResponses {
        &self.responses
    }

    pub fn store(&self) -> &ContextStore {
        &self.store
    }

    pub async fn enqueue_local(&self, command: String) {
        self.pending.push(command).await;
    }

    fn current_ballot(&self, seq: i64) -> Ballot {
        Ballot::new(seq, self.id, self.next_op.load(Ordering::SeqCst))
    }

    /// `seq` is bumped to `max(current_seq, promised_seq) + 1` on a failed
    /// proposal, not merely incremented.
    async fn bump_ballot(&self) {
        let mut state = self.state.lock().await;
        state.seq = state.seq.max(state.promised_ballot.seq) + 1;
    }

    /// Drains the pending-operations queue forever, driving the
    /// propose/forward/accept state machine. Returns once the outbound
    /// channel to the relay closes — there is no point electing or
    /// proposing when nothing can reach a peer any more.
    pub async fn run(self: Arc<Self>) -> Result<(), ConsensusError> {
        loop {
            let head = self.pending.wait_for_head().await;
            loop {
                let leader_id = self.state.lock().await.leader_id;
                if leader_id == NONE_ID {
                    if self.run_election().await? {
                        continue;
                    }
                    self.bump_ballot().await;
                    self.pending.pop_head().await;
                    break;
                } else if leader_id != self.id {
                    match self.forward_to_leader(leader_id, &head).await? {
                        ForwardOutcome::Acked => {
                            self.pending.pop_head().await;
                            break;
                        }
                        ForwardOutcome::TimedOut => {
                            if self.run_election().await? {
                                continue;
                            }
                            self.bump_ballot().await;
                            self.pending.pop_head().await;
                            break;
                        }
                    }
                } else if self.run_accept_phase(&head).await? {
                    self.pending.pop_head().await;
                    break;
                } else {
                    tokio::time::sleep(ACCEPT_RETRY_BACKOFF).await;
                    debug!("accept phase timed out, retaining head and retrying");
                }
            }
        }
    }

    async fn run_election(&self) -> Result<bool, ConsensusError> {
        let ballot = {
            let mut state = self.state.lock().await;
            let ballot = self.current_ballot(state.seq);
            state.promised_ballot = ballot;
            state.promising_ballot = Some(ballot);
            state.promised_count = 0;
            ballot
        };
        self.broadcast(Header::Propose, ballot, String::new(), NONE_ID).await?;

        let won = tokio::time::timeout(ELECTION_TIMEOUT, async {
            loop {
                if self.state.lock().await.promised_count >= self.majority {
                    return;
                }
                self.promised_notify.notified().await;
            }
        })
        .await
        .is_ok();

        let mut state = self.state.lock().await;
        state.promising_ballot = None;
        if won {
            state.leader_id = self.id;
            info!(node = self.id, "won election");
        }
        Ok(won)
    }

    async fn forward_to_leader(&self, leader_id: i64, command: &str) -> Result<ForwardOutcome, ConsensusError> {
        let ballot = self.current_ballot(self.state.lock().await.seq);
        self.send_frame(Header::Forward, leader_id, ballot, command.to_string(), NONE_ID)
            .await?;

        Ok(match tokio::time::timeout(FORWARD_ACK_TIMEOUT, self.ack_notify.notified()).await {
            Ok(_) => ForwardOutcome::Acked,
            Err(_) => ForwardOutcome::TimedOut,
        })
    }

    async fn run_accept_phase(&self, command: &str) -> Result<bool, ConsensusError> {
        let ballot = {
            let mut state = self.state.lock().await;
            let ballot = self.current_ballot(state.seq);
            state.accepting_ballot = Some(ballot);
            state.accepted_count = 0;
            ballot
        };
        self.broadcast(Header::Accept, ballot, command.to_string(), NONE_ID).await?;

        let accepted = tokio::time::timeout(ACCEPT_TIMEOUT, async {
            loop {
                if self.state.lock().await.accepted_count >= self.majority {
                    return;
                }
                self.accepted_notify.notified().await;
            }
        })
        .await
        .is_ok();

        self.state.lock().await.accepting_ballot = None;
        if !accepted {
            return Ok(false);
        }

        applier::apply(
            command,
            self.id,
            true,
            &self.store,
            &self.generator,
            &self.responses,
        )
        .await;
        self.next_op.fetch_add(1, Ordering::SeqCst);

        self.broadcast(Header::Decide, ballot, command.to_string(), NONE_ID).await?;
        Ok(true)
    }

    pub async fn handle_frame(&self, frame: Frame) {
        match frame.header {
            Header::Propose => self.handle_propose(frame).await,
            Header::Promise => self.handle_promise(frame).await,
            Header::Accept => self.handle_accept(frame).await,
            Header::Accepted => self.handle_accepted(frame).await,
            Header::Decide => self.handle_decide(frame).await,
            Header::Forward => self.handle_forward(frame).await,
            Header::Ack => self.handle_ack(frame).await,
            Header::Response => self.handle_response(frame).await,
            Header::Kill => warn!("KILL reached the engine; the node loop should intercept it"),
        }
    }

    async fn handle_propose(&self, frame: Frame) {
        self.send_response(Header::Promise, frame.src, frame.ballot_number, String::new(), NONE_ID, true)
            .await;
    }

    async fn handle_promise(&self, frame: Frame) {
        let mut state = self.state.lock().await;
        if state.promising_ballot == Some(frame.ballot_number) {
            state.promised_count += 1;
            drop(state);
            self.promised_notify.notify_one();
        }
    }

    async fn handle_accept(&self, frame: Frame) {
        self.send_response(Header::Accepted, frame.src, frame.ballot_number, String::new(), NONE_ID, true)
            .await;
    }

    async fn handle_accepted(&self, frame: Frame) {
        let mut state = self.state.lock().await;
        if state.accepting_ballot == Some(frame.ballot_number) {
            state.accepted_count += 1;
            drop(state);
            self.accepted_notify.notify_one();
        }
    }

    async fn handle_forward(&self, frame: Frame) {
        let is_leader = self.state.lock().await.leader_id == self.id;
        if !is_leader {
            debug!(src = frame.src, "forfeiting FORWARD, no longer leader");
            return;
        }
        self.pending.push(frame.message.clone()).await;
        self.send_response(Header::Ack, frame.src, frame.ballot_number, String::new(), NONE_ID, false)
            .await;
    }

    async fn handle_ack(&self, _frame: Frame) {
        self.ack_notify.notify_one();
    }

    async fn handle_decide(&self, frame: Frame) {
        let is_leader = self.state.lock().await.leader_id == self.id;
        let outcome = applier::apply(
            &frame.message,
            self.id,
            is_leader,
            &self.store,
            &self.generator,
            &self.responses,
        )
        .await;
        self.store.merge(&frame.contexts).await;
        self.next_op.fetch_add(1, Ordering::SeqCst);

        if let Some(text) = outcome.response_text {
            let context_id = Command::parse(&frame.message)
                .map(|c| c.context_id() as i64)
                .unwrap_or(NONE_ID);
            self.send_response(Header::Response, frame.src, frame.ballot_number, text, context_id, false)
                .await;
        }
    }

    async fn handle_response(&self, frame: Frame) {
        if frame.context_id >= 0 {
            self.responses
                .record(frame.context_id as u64, frame.src, frame.message)
                .await;
        }
    }

    /// Refuses silently if `requires_ballot_comparison` and the ballot is
    /// stale, and — for `PROMISE`/`ACCEPTED` specifically — updates
    /// `leader_id`/`promised_ballot` on the *send* path, not only on
    /// receipt.
    async fn send_response(
        &self,
        header: Header,
        dest: i64,
        ballot_number: Ballot,
        message: String,
        context_id: i64,
        requires_ballot_comparison: bool,
    ) {
        {
            let mut state = self.state.lock().await;
            if requires_ballot_comparison && state.promised_ballot > ballot_number {
                return;
            }
            if matches!(header, Header::Promise | Header::Accepted) {
                state.leader_id = dest;
                state.promised_ballot = ballot_number;
            }
        }
        if let Err(err) = self.send_frame(header, dest, ballot_number, message, context_id).await {
            warn!(%err, "failed to send response frame");
        }
    }

    async fn send_frame(
        &self,
        header: Header,
        dest: i64,
        ballot_number: Ballot,
        message: String,
        context_id: i64,
    ) -> Result<(), ConsensusError> {
        let contexts = self.store.snapshot().await;
        let frame = Frame::new(header, self.id, dest, ballot_number)
            .with_message(message)
            .with_context_id(context_id)
            .with_contexts(contexts);
        self.outbound.send(frame).await.map_err(|_| ConsensusError::OutboundClosed)
    }

    async fn broadcast(
        &self,
        header: Header,
        ballot_number: Ballot,
        message: String,
        context_id: i64,
    ) -> Result<(), ConsensusError> {
        for dest in 0..self.num_nodes as i64 {
            if dest == self.id {
                continue;
            }
            self.send_frame(header, dest, ballot_number, message.clone(), context_id)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::EchoGenerator;

    fn engine(id: i64, num_nodes: usize) -> (Arc<ConsensusEngine>, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(64);
        let engine = ConsensusEngine::new(
            id,
            num_nodes,
            Arc::new(ContextStore::new()),
            Arc::new(PendingQueue::new()),
            Arc::new(EchoGenerator),
            tx,
        );
        (Arc::new(engine), rx)
    }

    #[tokio::test]
    async fn majority_is_floor_of_half() {
        let (e, _rx) = engine(0, 3);
        assert_eq!(e.majority, 1);
        let (e, _rx) = engine(0, 5);
        assert_eq!(e.majority, 2);
    }

    #[tokio::test]
    async fn acceptor_promises_when_ballot_not_stale() {
        let (e, mut rx) = engine(1, 3);
        let ballot = Ballot::new(1, 0, 0);
        let propose = Frame::new(Header::Propose, 0, 1, ballot);

        e.handle_frame(propose).await;

        let reply = rx.recv().await.unwrap();
        assert_eq!(reply.header, Header::Promise);
        assert_eq!(reply.dest, 0);
        assert_eq!(e.state.lock().await.leader_id, 0);
    }

    #[tokio::test]
    async fn acceptor_refuses_a_stale_proposal() {
        let (e, mut rx) = engine(1, 3);
        e.handle_frame(Frame::new(Header::Propose, 0, 1, Ballot::new(5, 0, 2)))
            .await;
        let _ = rx.recv().await.unwrap();

        e.handle_frame(Frame::new(Header::Propose, 2, 1, Ballot::new(1, 2, 0)))
            .await;
        assert!(tokio::time::timeout(Duration::from_millis(50), rx.recv())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn forward_is_forfeited_when_not_leader() {
        let (e, mut rx) = engine(1, 3);
        e.handle_frame(Frame::new(Header::Forward, 0, 1, Ballot::new(1, 0, 0)).with_message("create 1"))
            .await;
        assert!(tokio::time::timeout(Duration::from_millis(50), rx.recv())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn forward_is_acked_when_leader() {
        let (e, mut rx) = engine(1, 3);
        e.state.lock().await.leader_id = 1;

        e.handle_frame(Frame::new(Header::Forward, 0, 1, Ballot::new(1, 0, 0)).with_message("create 1"))
            .await;

        let reply = rx.recv().await.unwrap();
        assert_eq!(reply.header, Header::Ack);
        assert!(!e.pending.is_empty().await);
    }

    #[tokio::test]
    async fn decide_applies_and_merges_contexts() {
        let (e, _rx) = engine(1, 3);
        let mut contexts = std::collections::HashMap::new();
        contexts.insert(9u64, "Query: from peer".to_string());

        let frame = Frame::new(Header::Decide, 0, 1, Ballot::new(1, 0, 0))
            .with_message("create 7")
            .with_contexts(contexts);
        e.handle_frame(frame).await;

        assert_eq!(e.store.get(7).await.unwrap(), "");
        assert_eq!(e.store.get(9).await.unwrap(), "Query: from peer");
    }

    #[tokio::test]
    async fn bump_ballot_uses_max_of_seq_and_promised_seq() {
        let (e, _rx) = engine(0, 3);
        {
            let mut state = e.state.lock().await;
            state.seq = 2;
            state.promised_ballot = Ballot::new(9, 1, 0);
        }
        e.bump_ballot().await;
        assert_eq!(e.state.lock().await.seq, 10);
    }
}
