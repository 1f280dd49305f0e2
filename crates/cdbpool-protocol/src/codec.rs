use bytes::{BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound used when the caller has no configured limit.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("frame of {len} bytes exceeds limit {max}")]
    FrameTooLarge { len: usize, max: usize },
}

/// Writes one length-prefixed frame: u32 big-endian body length, then the bincode body.
pub async fn write_frame<S, T>(stream: &mut S, msg: &T, max_frame: usize) -> Result<(), CodecError>
where
    S: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = bincode::serialize(msg).map_err(|e| CodecError::Encode(e.to_string()))?;
    if body.len() > max_frame || body.len() > u32::MAX as usize {
        return Err(CodecError::FrameTooLarge {
            len: body.len(),
            max: max_frame,
        });
    }
    let mut buf = BytesMut::with_capacity(body.len() + 4);
    buf.put_u32(body.len() as u32);
    buf.extend_from_slice(&body);
    stream.write_all(&buf).await?;
    stream.flush().await?;
    Ok(())
}

pub async fn read_frame<S, T>(stream: &mut S, max_frame: usize) -> Result<T, CodecError>
where
    S: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = stream.read_u32().await? as usize;
    if len > max_frame {
        return Err(CodecError::FrameTooLarge { len, max: max_frame });
    }
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    bincode::deserialize(&buf).map_err(|e| CodecError::Decode(e.to_string()))
}
