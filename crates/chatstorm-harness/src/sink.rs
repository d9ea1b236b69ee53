//! Event sink: the hand-off from a session's network tasks to presentation.
//!
//! One bounded queue per session. The producer side never blocks on chat
//! traffic (lossy: a full queue drops the event and counts it); terminal
//! events get a bounded reliable push so a slow consumer still learns how a
//! session ended. The consumer pulls with `try_pull`, `drain`, the async
//! `pull_timeout`, or `pull_blocking_timeout` from a thread that has no
//! async runtime at all.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use flume::{RecvTimeoutError, TryRecvError, TrySendError};

use chatstorm_core::protocol::envelope::ChannelId;

/// One unit of delivery to presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Relayed chat line. `own` is true when the line echoes this session.
    ChatLine { from: String, text: String, own: bool },
    /// Join / rejoin / leave notice. `channel` is the envelope's channel, or
    /// the session's current channel when the server omitted it.
    Lifecycle {
        event: String,
        user_name: String,
        channel: Option<ChannelId>,
    },
    /// Error envelope sent by the server.
    ServerError { message: String },
    /// Dial failed; the session never ran.
    ConnectFailed { reason: String },
    /// Peer reset or truncated the connection.
    ConnectionLost { reason: String },
    /// Any other terminal fault (framing error, unexpected I/O).
    Fault { detail: String },
}

impl SessionEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionEvent::ConnectFailed { .. }
                | SessionEvent::ConnectionLost { .. }
                | SessionEvent::Fault { .. }
        )
    }
}

/// Delivery strategy for a push.
#[derive(Debug, Clone, Copy)]
pub enum Delivery {
    /// Do not wait; drop if the queue is full.
    Lossy,
    /// Wait for queue space up to `timeout_ms`.
    Reliable { timeout_ms: u64 },
}

/// Producer half.
#[derive(Clone)]
pub struct EventSink {
    tx: flume::Sender<SessionEvent>,
    dropped: Arc<AtomicU64>,
    reliable_timeout_ms: u64,
}

/// Consumer half.
pub struct EventFeed {
    rx: flume::Receiver<SessionEvent>,
    dropped: Arc<AtomicU64>,
}

/// Result of a timed pull.
#[derive(Debug, PartialEq, Eq)]
pub enum Pull {
    Event(SessionEvent),
    /// Nothing arrived within the timeout.
    Empty,
    /// Producer is gone and the queue is drained.
    Closed,
}

pub fn channel(capacity: usize, reliable_timeout_ms: u64) -> (EventSink, EventFeed) {
    let (tx, rx) = flume::bounded(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        EventSink {
            tx,
            dropped: Arc::clone(&dropped),
            reliable_timeout_ms,
        },
        EventFeed { rx, dropped },
    )
}

impl EventSink {
    /// Push with the delivery matching the event: terminal events are
    /// reliable, everything else lossy. Returns whether it was queued.
    pub async fn push(&self, ev: SessionEvent) -> bool {
        let delivery = if ev.is_terminal() {
            Delivery::Reliable {
                timeout_ms: self.reliable_timeout_ms,
            }
        } else {
            Delivery::Lossy
        };
        self.push_with(ev, delivery).await
    }

    pub async fn push_with(&self, ev: SessionEvent, delivery: Delivery) -> bool {
        let ev = match self.tx.try_send(ev) {
            Ok(()) => return true,
            Err(TrySendError::Disconnected(_)) => return false,
            Err(TrySendError::Full(ev)) => ev,
        };

        let queued = match delivery {
            Delivery::Lossy => false,
            Delivery::Reliable { timeout_ms } => matches!(
                tokio::time::timeout(Duration::from_millis(timeout_ms), self.tx.send_async(ev)).await,
                Ok(Ok(()))
            ),
        };
        if !queued {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        queued
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EventFeed {
    pub fn try_pull(&mut self) -> Option<SessionEvent> {
        self.rx.try_recv().ok()
    }

    /// Everything queued right now, without waiting.
    pub fn drain(&mut self) -> Vec<SessionEvent> {
        self.rx.drain().collect()
    }

    /// Async pull; needs a tokio runtime for the timer.
    pub async fn pull_timeout(&mut self, wait: Duration) -> Pull {
        match tokio::time::timeout(wait, self.rx.recv_async()).await {
            Ok(Ok(ev)) => Pull::Event(ev),
            Ok(Err(_)) => Pull::Closed,
            Err(_) => Pull::Empty,
        }
    }

    /// Blocking pull for a consumer living outside any async runtime (a UI
    /// thread ticking on its own clock). Must not be called from async code.
    pub fn pull_blocking_timeout(&mut self, wait: Duration) -> Pull {
        match self.rx.recv_timeout(wait) {
            Ok(ev) => Pull::Event(ev),
            Err(RecvTimeoutError::Timeout) => Pull::Empty,
            Err(RecvTimeoutError::Disconnected) => Pull::Closed,
        }
    }

    /// Non-waiting pull that tells an idle queue from a finished one.
    pub fn poll(&mut self) -> Pull {
        match self.rx.try_recv() {
            Ok(ev) => Pull::Event(ev),
            Err(TryRecvError::Empty) => Pull::Empty,
            Err(TryRecvError::Disconnected) => Pull::Closed,
        }
    }

    /// Events the producer had to drop because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
