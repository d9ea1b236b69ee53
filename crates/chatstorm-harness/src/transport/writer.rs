//! Single-writer guard shared by a session's Sender and Receiver.
//!
//! The Sender writes chat traffic and the Receiver writes heartbeat replies;
//! the async mutex keeps each frame contiguous on the wire. Closing takes the
//! writer out of the slot, so only the first `close` reaches the transport.

use std::sync::Arc;

use tokio::sync::Mutex;

use chatstorm_core::error::{HarnessError, Result};

use crate::transport::FrameWriter;

#[derive(Clone)]
pub struct SharedWriter {
    slot: Arc<Mutex<Option<Box<dyn FrameWriter>>>>,
}

impl SharedWriter {
    pub fn new(writer: Box<dyn FrameWriter>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(writer))),
        }
    }

    pub async fn send(&self, body: &[u8]) -> Result<()> {
        let mut slot = self.slot.lock().await;
        match slot.as_mut() {
            Some(w) => w.write_frame(body).await,
            None => Err(HarnessError::ConnectionLost("connection already closed".into())),
        }
    }

    /// Close the connection. Returns `true` only for the call that actually
    /// closed it; later calls are no-ops.
    pub async fn close(&self) -> bool {
        let taken = self.slot.lock().await.take();
        let Some(mut w) = taken else {
            return false;
        };
        if let Err(e) = w.shutdown().await {
            tracing::debug!(error = %e, "shutdown during close failed");
        }
        true
    }

    pub async fn is_closed(&self) -> bool {
        self.slot.lock().await.is_none()
    }
}
