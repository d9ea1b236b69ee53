//! Transport layer (byte stream or WebSocket).
//!
//! Every wire variant is exposed through the same pair of traits so a
//! session never branches on framing: `FrameReader` yields decoded frames,
//! `FrameWriter` accepts JSON bodies and applies the variant's header.

pub mod stream;
pub mod writer;
pub mod ws;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::Duration;

use chatstorm_core::error::Result;
use chatstorm_core::protocol::frame::{InboundFrame, WireVariant};

use crate::config::TargetSection;

pub use writer::SharedWriter;

/// Inbound half of a connection.
#[async_trait]
pub trait FrameReader: Send {
    /// Read exactly one frame.
    ///
    /// A vanished peer is `ConnectionLost`; an unparseable header is
    /// `Framing`. Both end the connection.
    async fn read_frame(&mut self) -> Result<InboundFrame>;

    /// Read whatever the peer sends next, up to `max` bytes, without
    /// framing it. Waits for at least one byte; EOF is `ConnectionLost`.
    async fn read_some(&mut self, max: usize) -> Result<Bytes>;
}

/// Outbound half of a connection.
#[async_trait]
pub trait FrameWriter: Send {
    /// Write one body as a complete frame and flush it.
    async fn write_frame(&mut self, body: &[u8]) -> Result<()>;
    async fn shutdown(&mut self) -> Result<()>;
}

/// A dialed connection, already split into its two halves.
pub struct Connection {
    pub reader: Box<dyn FrameReader>,
    pub writer: Box<dyn FrameWriter>,
}

impl Connection {
    pub fn new(reader: impl FrameReader + 'static, writer: impl FrameWriter + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }
}

/// Dial the configured target using its wire variant.
pub async fn dial(target: &TargetSection) -> Result<Connection> {
    let limit = Duration::from_millis(target.connect_timeout_ms);
    match target.wire {
        WireVariant::HexLength | WireVariant::BinaryLength => stream::dial(target, limit).await,
        WireVariant::TransportNative => ws::dial(target, limit).await,
    }
}
