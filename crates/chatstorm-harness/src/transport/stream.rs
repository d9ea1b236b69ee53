//! Length-prefixed framing over any async byte stream (TCP in production,
//! in-memory duplex pipes in tests).

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};

use chatstorm_core::error::{HarnessError, Result};
use chatstorm_core::protocol::frame::{InboundFrame, WireVariant, HEADER_LEN};

use crate::config::TargetSection;
use crate::transport::{Connection, FrameReader, FrameWriter};

pub struct LengthPrefixedReader<R> {
    inner: R,
    variant: WireVariant,
    max_body: usize,
}

impl<R> LengthPrefixedReader<R> {
    pub fn new(inner: R, variant: WireVariant, max_body: usize) -> Self {
        Self {
            inner,
            variant,
            max_body,
        }
    }
}

#[async_trait]
impl<R> FrameReader for LengthPrefixedReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn read_frame(&mut self) -> Result<InboundFrame> {
        let mut header = [0u8; HEADER_LEN];
        self.inner
            .read_exact(&mut header)
            .await
            .map_err(|e| HarnessError::from_io("read header", e))?;

        let len = self.variant.checked_body_len(&header, self.max_body)?;

        let mut body = vec![0u8; len];
        self.inner
            .read_exact(&mut body)
            .await
            .map_err(|e| HarnessError::from_io("read body", e))?;

        Ok(self.variant.classify(Bytes::from(body)))
    }

    async fn read_some(&mut self, max: usize) -> Result<Bytes> {
        let mut buf = vec![0u8; max.max(1)];
        let n = self
            .inner
            .read(&mut buf)
            .await
            .map_err(|e| HarnessError::from_io("read", e))?;
        if n == 0 {
            return Err(HarnessError::ConnectionLost("eof".into()));
        }
        buf.truncate(n);
        Ok(Bytes::from(buf))
    }
}

pub struct LengthPrefixedWriter<W> {
    inner: W,
    variant: WireVariant,
}

impl<W> LengthPrefixedWriter<W> {
    pub fn new(inner: W, variant: WireVariant) -> Self {
        Self { inner, variant }
    }
}

#[async_trait]
impl<W> FrameWriter for LengthPrefixedWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write_frame(&mut self, body: &[u8]) -> Result<()> {
        let frame = self.variant.encode(body)?;
        self.inner
            .write_all(&frame)
            .await
            .map_err(|e| HarnessError::from_io("write frame", e))?;
        self.inner
            .flush()
            .await
            .map_err(|e| HarnessError::from_io("flush frame", e))
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.inner
            .shutdown()
            .await
            .map_err(|e| HarnessError::from_io("shutdown", e))
    }
}

/// Wrap an already-connected byte stream.
pub fn framed<S>(stream: S, variant: WireVariant, max_body: usize) -> Connection
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (r, w) = tokio::io::split(stream);
    Connection::new(
        LengthPrefixedReader::new(r, variant, max_body),
        LengthPrefixedWriter::new(w, variant),
    )
}

pub async fn dial(target: &TargetSection, limit: Duration) -> Result<Connection> {
    let addr = target.addr();
    let stream = timeout(limit, TcpStream::connect(&addr))
        .await
        .map_err(|_| {
            HarnessError::ConnectFailed(format!("{addr}: timed out after {}ms", limit.as_millis()))
        })?
        .map_err(|e| HarnessError::ConnectFailed(format!("{addr}: {e}")))?;

    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(error = %e, "set_nodelay failed");
    }

    let (r, w) = stream.into_split();
    Ok(Connection::new(
        LengthPrefixedReader::new(r, target.wire, target.max_frame_bytes),
        LengthPrefixedWriter::new(w, target.wire),
    ))
}
