//! Length-prefixed JSON framing over any `AsyncRead`/`AsyncWrite` stream.
//!
//! Wire shape: a 4-byte big-endian unsigned length prefix followed by that
//! many bytes of UTF-8 JSON. `tokio::io::AsyncReadExt::read_exact` already
//! implements "loop until the requested byte count is satisfied or the
//! stream closes", so this module is a thin typed wrapper around it rather
//! than a hand-rolled retry loop.

use paxchat_core::Frame;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::TransportError;

/// Frames above this size are rejected before the body is read, so a
/// corrupt or adversarial length prefix can't force an unbounded
/// allocation.
pub const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

pub async fn read_frame<R>(reader: &mut R) -> Result<Frame, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .await
        .map_err(|_| TransportError::Closed)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge(len));
    }

    let mut body = vec![0u8; len as usize];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|_| TransportError::Closed)?;

    let frame: Frame = serde_json::from_slice(&body).map_err(TransportError::Malformed)?;
    Ok(frame)
}

pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(frame).map_err(TransportError::Malformed)?;
    let len = u32::try_from(body.len()).map_err(|_| TransportError::FrameTooLarge(u32::MAX))?;

    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}
