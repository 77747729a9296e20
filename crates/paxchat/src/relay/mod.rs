//! The star-topology relay: an accept loop that derives a logical node id
//! from the connecting peer's source port, a connectivity matrix seeded on
//! connect, per-frame matrix checks at forward time, and the
//! `failLink`/`fixLink`/`failNode`/`exit` operator commands. One task per
//! peer, with forwarding funnelled through a single mpsc channel.

mod matrix;
mod operator;

pub use matrix::ConnectivityMatrix;
pub use operator::OperatorCommand;

use std::collections::HashMap;
use std::time::Duration;

use paxchat_core::{Frame, Header};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::transport::{Connection, ConnectionEvent};

/// Minimum delay the relay holds a frame before forwarding it. Overridable
/// via `--forward-delay-ms` but never allowed below this floor — the delay
/// is a testing aid the test suite depends on, not a tunable knob to
/// disable.
pub const MIN_FORWARD_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("failed to bind relay listener on port {0}: {1}")]
    Bind(u16, std::io::Error),
    #[error("peer address {0} does not map to a valid node id")]
    UnmappedPeer(std::net::SocketAddr),
}

/// Event delivered to the relay's central loop, tagged with the node id
/// that produced it (or `None` for the accept loop itself).
enum RelayEvent {
    PeerFrame { src: i64, frame: Frame },
    PeerClosed { src: i64 },
    Accepted { id: i64, stream: TcpStream },
}

struct Peer {
    connection: Connection,
}

/// The relay server. Owns the connectivity matrix and the open peer table;
/// `run` drives both the accept loop and the forwarding loop until `exit`
/// or the listener is shut down.
pub struct Relay {
    base_port: u16,
    num_servers: usize,
    forward_delay: Duration,
    matrix: Mutex<ConnectivityMatrix>,
    peers: Mutex<HashMap<i64, Peer>>,
}

impl Relay {
    pub fn new(base_port: u16, num_servers: usize, forward_delay: Duration) -> Self {
        let forward_delay = forward_delay.max(MIN_FORWARD_DELAY);
        Relay {
            base_port,
            num_servers,
            forward_delay,
            matrix: Mutex::new(ConnectivityMatrix::new(num_servers)),
            peers: Mutex::new(HashMap::new()),
        }
    }

    fn node_id_for_port(&self, port: u16) -> Option<i64> {
        let offset = port.checked_sub(self.base_port + 1)? as i64;
        if (offset as usize) < self.num_servers {
            Some(offset)
        } else {
            None
        }
    }

    /// Runs the relay until an `exit` operator command or the listener
    /// closes. `operator_commands` is typically fed by the stdin CLI task
    /// (`cli::relay_main`) but is a plain channel so tests can drive it
    /// directly.
    pub async fn run(
        self: std::sync::Arc<Self>,
        mut operator_commands: mpsc::Receiver<OperatorCommand>,
    ) -> Result<(), RelayError> {
        let listener = TcpListener::bind(("0.0.0.0", self.base_port))
            .await
            .map_err(|e| RelayError::Bind(self.base_port, e))?;
        info!(port = self.base_port, "relay listening");

        let (events_tx, mut events_rx) = mpsc::channel::<RelayEvent>(256);

        let accept_task: JoinHandle<()> = {
            let events_tx = events_tx.clone();
            let relay = self.clone();
            tokio::spawn(async move {
                loop {
                    match listener.accept().await {
                        Ok((stream, addr)) => match relay.node_id_for_port(addr.port()) {
                            Some(id) => {
                                if events_tx
                                    .send(RelayEvent::Accepted { id, stream })
                                    .await
                                    .is_err()
                                {
                                    return;
                                }
                            }
                            None => {
                                warn!(%addr, "rejecting peer with unmapped source port");
                            }
                        },
                        Err(e) => {
                            warn!(error = %e, "accept failed");
                            return;
                        }
                    }
                }
            })
        };

        loop {
            tokio::select! {
                Some(event) = events_rx.recv() => {
                    match event {
                        RelayEvent::Accepted { id, stream } => {
                            self.register_peer(id, stream, events_tx.clone()).await;
                        }
                        RelayEvent::PeerFrame { src, frame } => {
                            self.forward(src, frame).await;
                        }
                        RelayEvent::PeerClosed { src } => {
                            info!(node = src, "peer connection closed");
                            self.peers.lock().await.remove(&src);
                        }
                    }
                }
                Some(cmd) = operator_commands.recv() => {
                    if matches!(cmd, OperatorCommand::Exit) {
                        info!("relay shutting down");
                        accept_task.abort();
                        return Ok(());
                    }
                    self.handle_operator_command(cmd).await;
                }
                else => {
                    accept_task.abort();
                    return Ok(());
                }
            }
        }
    }

    async fn register_peer(
        &self,
        id: i64,
        stream: TcpStream,
        relay_events: mpsc::Sender<RelayEvent>,
    ) {
        let (conn_events_tx, mut conn_events_rx) = mpsc::channel(64);
        let connection = Connection::spawn(stream, conn_events_tx);

        {
            let already: Vec<usize> = self
                .peers
                .lock()
                .await
                .keys()
                .copied()
                .map(|k| k as usize)
                .collect();
            let mut matrix = self.matrix.lock().await;
            matrix.seed_peer(id as usize, already.into_iter());
        }

        self.peers.lock().await.insert(id, Peer { connection });
        info!(node = id, "peer connected");

        tokio::spawn(async move {
            while let Some(event) = conn_events_rx.recv().await {
                let forwarded = match event {
                    ConnectionEvent::Frame(frame) => RelayEvent::PeerFrame { src: id, frame },
                    ConnectionEvent::Closed => RelayEvent::PeerClosed { src: id },
                };
                if relay_events.send(forwarded).await.is_err() {
                    return;
                }
            }
        });
    }

    async fn forward(self: &std::sync::Arc<Self>, src: i64, frame: Frame) {
        let dest = frame.dest;
        let allowed = {
            let matrix = self.matrix.lock().await;
            src == paxchat_core::NONE_ID || matrix.is_connected(src as usize, dest as usize)
        };
        if !allowed {
            debug!(src, dest, "dropping frame: matrix rejects link");
            return;
        }

        let relay = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(relay.forward_delay).await;
            let peers = relay.peers.lock().await;
            if let Some(peer) = peers.get(&dest) {
                if peer.connection.send(frame).await.is_err() {
                    debug!(dest, "forward failed: peer gone");
                }
            } else {
                debug!(dest, "dropping frame: no such peer");
            }
        });
    }

    async fn handle_operator_command(&self, cmd: OperatorCommand) {
        match cmd {
            OperatorCommand::FailLink(s, d) => {
                self.matrix.lock().await.set_link(s as usize, d as usize, false);
                info!(s, d, "link failed");
            }
            OperatorCommand::FixLink(s, d) => {
                self.matrix.lock().await.set_link(s as usize, d as usize, true);
                info!(s, d, "link restored");
            }
            OperatorCommand::FailNode(n) => {
                self.kill_node(n).await;
            }
            OperatorCommand::Exit => unreachable!("handled by caller"),
        }
    }

    /// Synthesises a `KILL` frame and delivers it directly (bypassing the
    /// forwarding delay and matrix check, since `failNode` must reach the
    /// node even across a severed link).
    async fn kill_node(&self, n: i64) {
        let mut peers = self.peers.lock().await;
        if let Some(peer) = peers.remove(&n) {
            let _ = peer.connection.send(Frame::kill(n)).await;
            peer.connection.close();
            info!(node = n, "node killed");
        } else {
            warn!(node = n, "failNode: no such peer");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_for_port_matches_offset_convention() {
        let relay = Relay::new(7000, 3, MIN_FORWARD_DELAY);
        assert_eq!(relay.node_id_for_port(7001), Some(0));
        assert_eq!(relay.node_id_for_port(7002), Some(1));
        assert_eq!(relay.node_id_for_port(7003), Some(2));
        assert_eq!(relay.node_id_for_port(7004), None);
        assert_eq!(relay.node_id_for_port(7000), None);
    }

    #[test]
    fn forward_delay_is_clamped_to_the_floor() {
        let relay = Relay::new(7000, 3, Duration::from_millis(10));
        assert_eq!(relay.forward_delay, MIN_FORWARD_DELAY);
    }
}
