use paxchat_core::Frame;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::frame_io::{read_frame, write_frame};
use super::TransportError;

/// Something the reader half of a [`Connection`] observed.
#[derive(Debug)]
pub enum ConnectionEvent {
    Frame(Frame),
    Closed,
}

/// A single peer connection, split into an independent reader task and
/// writer task so a slow or stalled write never blocks draining inbound
/// frames (and vice versa).
///
/// The reader forwards every frame it decodes, plus a final `Closed`
/// event, onto the `events` channel supplied by the caller. The writer
/// drains `outbound` and serialises frames onto the socket one at a time,
/// so a frame's length prefix and body are never interleaved with another
/// frame's.
pub struct Connection {
    outbound: mpsc::Sender<Frame>,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl Connection {
    /// Splits `stream` and spawns its reader/writer tasks. `events` receives
    /// every frame read from the peer; the returned `Connection` accepts
    /// frames to send via [`Connection::send`].
    pub fn spawn(stream: TcpStream, events: mpsc::Sender<ConnectionEvent>) -> Connection {
        let (read_half, write_half) = stream.into_split();
        let (outbound_tx, outbound_rx) = mpsc::channel(64);

        let reader_task = tokio::spawn(reader_loop(read_half, events));
        let writer_task = tokio::spawn(writer_loop(write_half, outbound_rx));

        Connection {
            outbound: outbound_tx,
            reader_task,
            writer_task,
        }
    }

    /// Queues `frame` for the writer task. Fails only once the connection
    /// has been torn down.
    pub async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        self.outbound
            .send(frame)
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Aborts both tasks immediately. Used on `KILL` and on explicit
    /// `failLink`/`failNode` teardown; a graceful peer simply stops
    /// sending and the reader task observes EOF on its own.
    pub fn close(&self) {
        self.reader_task.abort();
        self.writer_task.abort();
    }
}

async fn reader_loop<R>(mut reader: R, events: mpsc::Sender<ConnectionEvent>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    loop {
        match read_frame(&mut reader).await {
            Ok(frame) => {
                if events.send(ConnectionEvent::Frame(frame)).await.is_err() {
                    return;
                }
            }
            Err(_) => {
                let _ = events.send(ConnectionEvent::Closed).await;
                return;
            }
        }
    }
}

async fn writer_loop<W>(mut writer: W, mut outbound: mpsc::Receiver<Frame>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = outbound.recv().await {
        if write_frame(&mut writer, &frame).await.is_err() {
            return;
        }
    }
}

// `OwnedReadHalf`/`OwnedWriteHalf` already implement `AsyncRead`/`AsyncWrite`;
// the generic loops above exist so tests can exercise them over an in-memory
// duplex pipe instead of a real socket.
#[allow(dead_code)]
fn assert_halves_are_streams(_r: &OwnedReadHalf, _w: &OwnedWriteHalf) {}

#[cfg(test)]
mod tests {
    use super::*;
    use paxchat_core::{Ballot, Header};
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn writer_loop_serialises_queued_frames() {
        let (client, mut server) = tokio::io::duplex(4096);
        let (tx, rx) = mpsc::channel(8);

        tokio::spawn(writer_loop(client, rx));

        let frame = Frame::new(Header::Ack, 1, 0, Ballot::new(1, 1, 0));
        tx.send(frame.clone()).await.unwrap();
        drop(tx);

        let got = read_frame(&mut server).await.unwrap();
        assert_eq!(got, frame);
    }

    #[tokio::test]
    async fn reader_loop_emits_closed_on_eof() {
        let (mut client, server) = tokio::io::duplex(4096);
        let (events_tx, mut events_rx) = mpsc::channel(8);

        tokio::spawn(reader_loop(server, events_tx));
        client.shutdown().await.unwrap();
        drop(client);

        let event = events_rx.recv().await.unwrap();
        assert!(matches!(event, ConnectionEvent::Closed));
    }
}
