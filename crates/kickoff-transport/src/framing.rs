//! Length-prefixed framing for stream transports.
//!
//! Wire format: a 4-byte big-endian length, then that many payload bytes.
//! The payload itself is opaque here; the protocol layer decides what it
//! means.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default upper bound on a single frame (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Writes one frame: length prefix, then payload, then flush.
///
/// Fails with `InvalidInput` if `payload` is larger than `max_len`.
pub async fn write_frame<W>(
    writer: &mut W,
    payload: &[u8],
    max_len: usize,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > max_len || payload.len() > u32::MAX as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("frame too large: {} bytes (max {max_len})", payload.len()),
        ));
    }
    let len = (payload.len() as u32).to_be_bytes();
    writer.write_all(&len).await?;
    writer.write_all(payload).await?;
    writer.flush().await
}

/// Reads one frame.
///
/// Returns `Ok(None)` if the stream ends exactly on a frame boundary,
/// `UnexpectedEof` if it ends mid-frame, and `InvalidData` if the length
/// prefix exceeds `max_len`.
pub async fn read_frame<R>(
    reader: &mut R,
    max_len: usize,
) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        let n = reader.read(&mut len_buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream closed inside a length prefix",
            ));
        }
        filled += n;
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {len} bytes (max {max_len})"),
        ));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}
