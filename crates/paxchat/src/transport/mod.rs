//! Framed TCP transport: length-prefixed JSON frames over `tokio::net::TcpStream`.
//!
//! Actor-per-socket concurrency shape: a dedicated reader task and a
//! dedicated writer task per connection, communicating with the rest of
//! the node over channels instead of sharing a locked socket.

mod connection;
mod frame_io;

pub use connection::{Connection, ConnectionEvent};
pub use frame_io::{read_frame, write_frame, MAX_FRAME_LEN};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,
    #[error("frame exceeds maximum size ({0} bytes)")]
    FrameTooLarge(u32),
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
