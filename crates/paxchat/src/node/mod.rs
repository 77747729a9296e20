//! The node: wires the transport, consensus engine, context store and
//! generator together, and exposes the node CLI grammar.
//!
//! `start`/`stop` lifecycle: an `AtomicBool running` flag and `JoinHandle`s
//! behind `RwLock<Option<_>>`, aborted on stop.

mod cli_command;

pub use cli_command::{NodeCommand, NodeCommandError};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use paxchat_core::{Frame, Header};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::NodeSettings;
use crate::consensus::{ConsensusEngine, ConsensusError};
use crate::generator::Generator;
use crate::ingress::PendingQueue;
use crate::store::ContextStore;
use crate::transport::{Connection, ConnectionEvent};
use crate::util::logging::DecisionLogger;

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("failed to bind local socket on port {0}: {1}")]
    Bind(u16, std::io::Error),
    #[error("failed to connect to relay at {0}:{1}: {2}")]
    Connect(String, u16, std::io::Error),
    #[error("node is not running")]
    NotRunning,
}

struct NodeInner {
    id: i64,
    settings: NodeSettings,
    store: Arc<ContextStore>,
    pending: Arc<PendingQueue>,
    engine: Arc<ConsensusEngine>,
    outbound_rx: tokio::sync::Mutex<Option<mpsc::Receiver<Frame>>>,
    running: AtomicBool,
    decision_logger: Option<DecisionLogger>,
    connection: RwLock<Option<Connection>>,
}

/// A single consensus node. Holds one connection to the relay; all peer
/// traffic is relayed through it.
pub struct Node {
    inner: Arc<NodeInner>,
    dispatch_handle: RwLock<Option<JoinHandle<()>>>,
    engine_handle: RwLock<Option<JoinHandle<Result<(), ConsensusError>>>>,
    outbound_handle: RwLock<Option<JoinHandle<()>>>,
}

impl Node {
    pub fn new(settings: NodeSettings, generator: Arc<dyn Generator>) -> Self {
        let id = settings.id;
        let store = Arc::new(ContextStore::new());
        let pending = Arc::new(PendingQueue::new());
        let (outbound_tx, outbound_rx) = mpsc::channel(256);

        let engine = Arc::new(ConsensusEngine::new(
            id,
            settings.num_servers,
            store.clone(),
            pending.clone(),
            generator,
            outbound_tx,
        ));

        let decision_logger = DecisionLogger::new(&settings.logging, &id.to_string());

        let inner = Arc::new(NodeInner {
            id,
            settings,
            store,
            pending,
            engine,
            outbound_rx: tokio::sync::Mutex::new(Some(outbound_rx)),
            running: AtomicBool::new(false),
            decision_logger,
            connection: RwLock::new(None),
        });

        Node {
            inner,
            dispatch_handle: RwLock::new(None),
            engine_handle: RwLock::new(None),
            outbound_handle: RwLock::new(None),
        }
    }

    pub fn id(&self) -> i64 {
        self.inner.id
    }

    pub fn store(&self) -> &ContextStore {
        &self.inner.store
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Binds locally to `target_port + 1 + id` (so the relay can learn
    /// this node's id from its source port), connects to the relay, and
    /// spawns the read-dispatch loop and the consensus engine loop.
    pub async fn start(&self) -> Result<(), NodeError> {
        let local_port = self.inner.settings.target_port + 1 + self.inner.id as u16;
        let local_addr = std::net::SocketAddr::from(([0, 0, 0, 0], local_port));
        let socket = tokio::net::TcpSocket::new_v4().map_err(|e| NodeError::Bind(local_port, e))?;
        socket.set_reuseaddr(true).ok();
        socket.bind(local_addr).map_err(|e| NodeError::Bind(local_port, e))?;

        let stream: TcpStream = socket
            .connect(std::net::SocketAddr::new(
                self.inner
                    .settings
                    .target_host
                    .parse()
                    .unwrap_or(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST)),
                self.inner.settings.target_port,
            ))
            .await
            .map_err(|e| {
                NodeError::Connect(self.inner.settings.target_host.clone(), self.inner.settings.target_port, e)
            })?;

        let (events_tx, events_rx) = mpsc::channel(256);
        let connection = Connection::spawn(stream, events_tx);
        *self.inner.connection.write().await = Some(connection);

        self.inner.running.store(true, Ordering::SeqCst);

        let dispatch_handle = self.spawn_dispatch_loop(events_rx);
        let engine_handle = tokio::spawn(self.inner.engine.clone().run());
        let outbound_handle = self.spawn_outbound_forwarder();

        *self.dispatch_handle.write().await = Some(dispatch_handle);
        *self.engine_handle.write().await = Some(engine_handle);
        *self.outbound_handle.write().await = Some(outbound_handle);

        info!(id = self.inner.id, port = local_port, "node started");
        Ok(())
    }

    pub async fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);

        if let Some(conn) = self.inner.connection.write().await.take() {
            conn.close();
        }
        if let Some(handle) = self.dispatch_handle.write().await.take() {
            handle.abort();
        }
        if let Some(handle) = self.engine_handle.write().await.take() {
            handle.abort();
        }
        if let Some(handle) = self.outbound_handle.write().await.take() {
            handle.abort();
        }
        if let Some(logger) = &self.inner.decision_logger {
            logger.shutdown();
        }

        info!(id = self.inner.id, "node stopped");
    }

    /// Drains frames the engine queues for the relay and writes them out
    /// over the node's single connection.
    fn spawn_outbound_forwarder(&self) -> JoinHandle<()> {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let mut rx = match inner.outbound_rx.lock().await.take() {
                Some(rx) => rx,
                None => return,
            };
            while let Some(frame) = rx.recv().await {
                let conn = inner.connection.read().await;
                if let Some(conn) = conn.as_ref() {
                    if conn.send(frame).await.is_err() {
                        warn!(id = inner.id, "failed to send frame: connection closed");
                    }
                }
            }
        })
    }

    fn spawn_dispatch_loop(&self, mut events: mpsc::Receiver<ConnectionEvent>) -> JoinHandle<()> {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    ConnectionEvent::Frame(frame) => {
                        if frame.header == Header::Kill {
                            warn!(id = inner.id, "received KILL, shutting down");
                            inner.running.store(false, Ordering::SeqCst);
                            return;
                        }
                        if frame.header == Header::Decide {
                            if let Some(logger) = &inner.decision_logger {
                                logger.log(frame.ballot_number.op, &frame.message);
                            }
                        }
                        inner.engine.handle_frame(frame).await;
                    }
                    ConnectionEvent::Closed => {
                        warn!(id = inner.id, "relay connection closed");
                        inner.running.store(false, Ordering::SeqCst);
                        return;
                    }
                }
            }
        })
    }

    /// Dispatches one node CLI line.
    pub async fn handle_cli_line(&self, line: &str) -> Result<Option<String>, NodeCommandError> {
        let command = NodeCommand::parse(line)?;
        match command {
            NodeCommand::Create { context_id } => {
                self.inner.engine.enqueue_local(format!("create {context_id}")).await;
                Ok(None)
            }
            NodeCommand::Query { context_id, text } => {
                self.inner
                    .engine
                    .enqueue_local(format!("query {context_id} {text}"))
                    .await;
                Ok(None)
            }
            NodeCommand::Choose { context_id, server_id } => {
                let text = match self.inner.engine.collected_responses().get(context_id, server_id).await {
                    Some(text) => text,
                    None => {
                        warn!(context_id, server_id, "choose: no collected response from that server, ignoring");
                        return Ok(None);
                    }
                };
                self.inner.engine.collected_responses().evict(context_id).await;
                self.inner
                    .engine
                    .enqueue_local(format!("choose {context_id} {text}"))
                    .await;
                Ok(None)
            }
            NodeCommand::View { context_id } => Ok(Some(self.inner.store.get(context_id).await.unwrap_or_default())),
            NodeCommand::ViewAll => {
                let snapshot = self.inner.store.snapshot().await;
                let mut lines: Vec<String> = snapshot
                    .into_iter()
                    .map(|(id, text)| format!("{id}: {text}"))
                    .collect();
                lines.sort();
                Ok(Some(lines.join("\n")))
            }
            NodeCommand::Exit => {
                self.stop().await;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::EchoGenerator;

    fn node(id: i64) -> Node {
        Node::new(NodeSettings::minimal(id, "127.0.0.1", 7000), Arc::new(EchoGenerator))
    }

    #[tokio::test]
    async fn choose_with_no_collected_response_is_a_no_op() {
        let node = node(0);
        let result = node.handle_cli_line("choose 1 0").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn choose_with_a_collected_response_evicts_it() {
        let node = node(0);
        node.inner.engine.collected_responses().record(1, 0, "echo:5".to_string()).await;

        node.handle_cli_line("choose 1 0").await.unwrap();

        assert!(node.inner.engine.collected_responses().get(1, 0).await.is_none());
    }
}
