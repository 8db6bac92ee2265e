//! Length-prefixed JSON framing
//!
//! Each frame is a big-endian `u32` body length followed by a `serde_json`
//! body. Bodies larger than the configured buffer size are rejected.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::TransportError;

const HEADER_LEN: usize = 4;

/// Serialize `value` into a complete frame
pub fn encode_frame<T>(value: &T, limit: usize) -> Result<Bytes, TransportError>
where
    T: Serialize + ?Sized,
{
    let body = serde_json::to_vec(value)?;
    if body.len() > limit {
        return Err(TransportError::FrameTooLarge {
            size: body.len(),
            limit,
        });
    }

    let mut frame = BytesMut::with_capacity(HEADER_LEN + body.len());
    frame.put_u32(body.len() as u32);
    frame.put_slice(&body);
    Ok(frame.freeze())
}

/// Encode and write one frame
pub async fn write_frame<W, T>(writer: &mut W, value: &T, limit: usize) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let frame = encode_frame(value, limit)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Buffered frame reader.
///
/// [`FrameReader::read_frame`] is cancel safe: partial frames stay in the
/// buffer, so it can be wrapped in `tokio::time::timeout` and retried.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    buffer: BytesMut,
    limit: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, limit: usize) -> Self {
        Self {
            inner,
            buffer: BytesMut::with_capacity(HEADER_LEN + limit.min(64 * 1024)),
            limit,
        }
    }

    /// Read and decode the next frame
    pub async fn read_frame<T: DeserializeOwned>(&mut self) -> Result<T, TransportError> {
        loop {
            if let Some(body) = self.split_frame()? {
                return Ok(serde_json::from_slice(&body)?);
            }
            if self.inner.read_buf(&mut self.buffer).await? == 0 {
                return Err(TransportError::Closed);
            }
        }
    }

    fn split_frame(&mut self) -> Result<Option<Bytes>, TransportError> {
        if self.buffer.len() < HEADER_LEN {
            return Ok(None);
        }

        let size = (&self.buffer[..HEADER_LEN]).get_u32() as usize;
        if size > self.limit {
            return Err(TransportError::FrameTooLarge {
                size,
                limit: self.limit,
            });
        }

        let needed = HEADER_LEN + size;
        if self.buffer.len() < needed {
            self.buffer.reserve(needed - self.buffer.len());
            return Ok(None);
        }

        self.buffer.advance(HEADER_LEN);
        Ok(Some(self.buffer.split_to(size).freeze()))
    }
}
