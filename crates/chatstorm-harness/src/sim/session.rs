//! One simulated chat client.
//!
//! Lifecycle: `Connecting -> Joined -> Running -> Draining -> Closed`.
//! While Running, a Sender task (think, then switch channel or send a line)
//! and a Receiver task (frames in, heartbeats answered, envelopes out to the
//! sink) share one connection. Whichever task ends first decides the outcome;
//! the other is halted between frames and awaited before the connection is
//! closed. A frame that has started going out is always finished.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use chatstorm_core::error::{HarnessError, Result};
use chatstorm_core::protocol::envelope::{
    decode_inbound, join_json, message_json, now_ms, ChannelId, InboundEnvelope, MessageShape,
};
use chatstorm_core::protocol::frame::{InboundFrame, HEARTBEAT_REPLY};
use chatstorm_core::ErrorKind;

use crate::config::HarnessConfig;
use crate::sim::channel::{ChannelDirectory, ChannelSet, ChannelState};
use crate::sim::generator::{Action, MessageGenerator};
use crate::sim::SessionId;
use crate::sink::{EventSink, SessionEvent};
use crate::transport::{self, Connection, FrameReader, SharedWriter};

/// How long the second task may take to reach a frame boundary after the
/// first one ended. Past this it is aborted, even mid-frame.
const HALT_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Connecting,
    Joined,
    Running,
    Draining,
    Closed,
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SessionOutcome {
    ConnectFailed,
    /// Stop signal observed.
    Stopped,
    ConnectionLost,
    FramingError,
    Fault,
    /// The session task itself panicked (reported by the fleet).
    Panicked,
}

impl SessionOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionOutcome::ConnectFailed => "connect-failed",
            SessionOutcome::Stopped => "stopped",
            SessionOutcome::ConnectionLost => "connection-lost",
            SessionOutcome::FramingError => "framing-error",
            SessionOutcome::Fault => "fault",
            SessionOutcome::Panicked => "panicked",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub id: SessionId,
    pub user_name: String,
    pub phases: Vec<SessionPhase>,
    pub outcome: SessionOutcome,
    pub frames_sent: u64,
    pub frames_received: u64,
    /// Heartbeat probes answered.
    pub heartbeats: u64,
    /// Frames dropped because their body was not decodable JSON.
    pub discarded: u64,
    /// Events the sink dropped because its queue was full.
    pub events_dropped: u64,
}

impl SessionReport {
    fn new(id: SessionId, user_name: String) -> Self {
        Self {
            id,
            user_name,
            phases: vec![SessionPhase::Connecting],
            outcome: SessionOutcome::Stopped,
            frames_sent: 0,
            frames_received: 0,
            heartbeats: 0,
            discarded: 0,
            events_dropped: 0,
        }
    }

    /// Placeholder for a session whose task panicked.
    pub fn panicked(id: SessionId, user_name: String) -> Self {
        let mut r = Self::new(id, user_name);
        r.phases.push(SessionPhase::Closed);
        r.outcome = SessionOutcome::Panicked;
        r
    }

    pub fn reached(&self, phase: SessionPhase) -> bool {
        self.phases.contains(&phase)
    }
}

#[derive(Default)]
struct Counters {
    sent: AtomicU64,
    received: AtomicU64,
    heartbeats: AtomicU64,
    discarded: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

enum LoopEnd {
    Stopped,
    Failed(HarnessError),
}

pub struct ClientSession {
    id: SessionId,
    user_name: String,
    cfg: Arc<HarnessConfig>,
    sink: EventSink,
    stop: CancellationToken,
    directory: Arc<ChannelDirectory>,
    generator: MessageGenerator,
}

impl ClientSession {
    /// The generator is seeded from `fleet.seed` offset by the session index,
    /// so seeded fleets replay identically.
    pub fn new(
        id: SessionId,
        cfg: Arc<HarnessConfig>,
        sink: EventSink,
        stop: CancellationToken,
        directory: Arc<ChannelDirectory>,
    ) -> Self {
        let user_name = cfg.fleet.display_name(id.0);
        let seed = cfg.fleet.seed.map(|s| s.wrapping_add(id.0 as u64));
        Self {
            id,
            user_name,
            cfg,
            sink,
            stop,
            directory,
            generator: MessageGenerator::new(seed),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// Dial the configured target and run to completion.
    pub async fn run(self) -> SessionReport {
        let conn = transport::dial(&self.cfg.target).await;
        self.run_with(conn).await
    }

    /// Run over an already-attempted dial.
    pub async fn run_with(self, conn: Result<Connection>) -> SessionReport {
        let span = tracing::info_span!("session", session = %self.id, user = %self.user_name);
        self.drive(conn).instrument(span).await
    }

    async fn drive(self, conn: Result<Connection>) -> SessionReport {
        let ClientSession {
            id,
            user_name,
            cfg,
            sink,
            stop,
            directory,
            generator,
        } = self;

        let mut report = SessionReport::new(id, user_name.clone());

        let conn = match conn {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "connect failed");
                sink.push(SessionEvent::ConnectFailed {
                    reason: e.to_string(),
                })
                .await;
                report.phases.push(SessionPhase::Closed);
                report.outcome = SessionOutcome::ConnectFailed;
                report.events_dropped = sink.dropped();
                return report;
            }
        };
        tracing::info!(wire = cfg.target.wire.as_str(), "connected");

        let counters = Arc::new(Counters::default());
        let writer = SharedWriter::new(conn.writer);

        // Halted by a stop request or by whichever task ends first.
        let halt = stop.child_token();
        let mut sender = Sender {
            id,
            user_name: user_name.clone(),
            shape: cfg.fleet.message_shape,
            delay_ms: (cfg.fleet.min_delay_ms, cfg.fleet.max_delay_ms),
            len: (cfg.fleet.min_len, cfg.fleet.max_len),
            channels: ChannelSet::new(cfg.fleet.channels),
            state: ChannelState::new(),
            generator,
            writer: writer.clone(),
            directory: Arc::clone(&directory),
            counters: Arc::clone(&counters),
            halt: halt.clone(),
        };

        report.phases.push(SessionPhase::Joined);
        let initial = sender.channels.pick(sender.generator.rng());

        let end = match sender.join(initial).await {
            Err(e) => LoopEnd::Failed(e),
            Ok(()) => {
                report.phases.push(SessionPhase::Running);
                let receiver = Receiver {
                    reader: conn.reader,
                    writer: writer.clone(),
                    halt: halt.clone(),
                    dispatch: Dispatcher {
                        id,
                        user_name: user_name.clone(),
                        sink: sink.clone(),
                        directory: Arc::clone(&directory),
                        counters: Arc::clone(&counters),
                    },
                };
                run_both(sender, receiver, halt).await
            }
        };

        report.phases.push(SessionPhase::Draining);
        let closed = writer.close().await;
        tracing::debug!(closed, "connection closed");
        directory.release(id);

        report.outcome = match end {
            LoopEnd::Stopped => SessionOutcome::Stopped,
            LoopEnd::Failed(e) => {
                let (outcome, event) = terminal(e);
                sink.push(event).await;
                outcome
            }
        };
        report.phases.push(SessionPhase::Closed);

        report.frames_sent = counters.sent.load(Ordering::Relaxed);
        report.frames_received = counters.received.load(Ordering::Relaxed);
        report.heartbeats = counters.heartbeats.load(Ordering::Relaxed);
        report.discarded = counters.discarded.load(Ordering::Relaxed);
        report.events_dropped = sink.dropped();

        tracing::info!(
            outcome = report.outcome.as_str(),
            sent = report.frames_sent,
            received = report.frames_received,
            "session closed"
        );
        report
    }
}

/// Run Sender and Receiver; the first to finish wins. The other is halted,
/// which it observes only between frames, and awaited so nothing touches the
/// connection afterwards.
async fn run_both(sender: Sender, receiver: Receiver, halt: CancellationToken) -> LoopEnd {
    let span = tracing::Span::current();
    let mut send_task: JoinHandle<LoopEnd> =
        tokio::spawn(sender.run().instrument(span.clone()));
    let mut recv_task: JoinHandle<LoopEnd> = tokio::spawn(receiver.run().instrument(span));

    let (first, sender_first) = tokio::select! {
        r = &mut send_task => (r, true),
        r = &mut recv_task => (r, false),
    };
    let (role, mut other) = if sender_first {
        ("sender", recv_task)
    } else {
        ("receiver", send_task)
    };

    halt.cancel();
    if timeout(HALT_GRACE, &mut other).await.is_err() {
        tracing::warn!(role, grace_ms = HALT_GRACE.as_millis() as u64, "peer task stuck, aborting");
        other.abort();
        let _ = other.await;
    }

    match first {
        Ok(end) => {
            tracing::debug!(role, "task finished first");
            end
        }
        Err(e) => LoopEnd::Failed(HarnessError::Unexpected(format!("{role} task failed: {e}"))),
    }
}

fn terminal(e: HarnessError) -> (SessionOutcome, SessionEvent) {
    tracing::warn!(error = %e, code = e.kind().as_str(), "session ended");
    let reason = e.to_string();
    match e.kind() {
        ErrorKind::ConnectionLost => (
            SessionOutcome::ConnectionLost,
            SessionEvent::ConnectionLost { reason },
        ),
        ErrorKind::Framing => (SessionOutcome::FramingError, SessionEvent::Fault { detail: reason }),
        _ => (SessionOutcome::Fault, SessionEvent::Fault { detail: reason }),
    }
}

struct Sender {
    id: SessionId,
    user_name: String,
    shape: MessageShape,
    delay_ms: (u64, u64),
    len: (usize, usize),
    channels: ChannelSet,
    state: ChannelState,
    generator: MessageGenerator,
    writer: SharedWriter,
    directory: Arc<ChannelDirectory>,
    counters: Arc<Counters>,
    halt: CancellationToken,
}

impl Sender {
    async fn run(mut self) -> LoopEnd {
        let halt = self.halt.clone();
        loop {
            let wait = self.generator.think_time(self.delay_ms.0, self.delay_ms.1);
            tokio::select! {
                _ = halt.cancelled() => return LoopEnd::Stopped,
                _ = tokio::time::sleep(wait) => {}
            }
            if halt.is_cancelled() {
                return LoopEnd::Stopped;
            }

            // Not raced against `halt`: a write is never cut short.
            let step = match self.generator.choose_action() {
                Action::Switch => self.switch_channel().await,
                Action::Send => self.send_message().await,
            };
            if let Err(e) = step {
                return LoopEnd::Failed(e);
            }
        }
    }

    async fn switch_channel(&mut self) -> Result<()> {
        let target = self.channels.pick(self.generator.rng());
        match self.state.switch_target(target) {
            Some(next) => self.join(next).await,
            None => {
                tracing::trace!(channel = %target, "already in channel");
                Ok(())
            }
        }
    }

    /// Write a join; the channel only changes once the frame is out.
    async fn join(&mut self, channel: ChannelId) -> Result<()> {
        let body = join_json(&self.user_name, channel, now_ms());
        self.writer.send(body.as_bytes()).await?;
        Counters::bump(&self.counters.sent);
        self.state.commit(channel);
        self.directory.assign(self.id, channel);
        tracing::info!(channel = %channel, "joined channel");
        Ok(())
    }

    async fn send_message(&mut self) -> Result<()> {
        let text = self.generator.random_text(self.len.0, self.len.1);
        let body = message_json(self.shape, &self.user_name, &text, now_ms());
        self.writer.send(body.as_bytes()).await?;
        Counters::bump(&self.counters.sent);
        tracing::debug!(len = text.len(), "message sent");
        Ok(())
    }
}

struct Receiver {
    reader: Box<dyn FrameReader>,
    writer: SharedWriter,
    halt: CancellationToken,
    dispatch: Dispatcher,
}

/// Turns decoded bodies into sink events.
struct Dispatcher {
    id: SessionId,
    user_name: String,
    sink: EventSink,
    directory: Arc<ChannelDirectory>,
    counters: Arc<Counters>,
}

impl Receiver {
    async fn run(mut self) -> LoopEnd {
        loop {
            // Only the read is raced; the heartbeat reply below always completes.
            let frame = tokio::select! {
                _ = self.halt.cancelled() => return LoopEnd::Stopped,
                r = self.reader.read_frame() => r,
            };

            let counters = &self.dispatch.counters;
            match frame {
                Ok(InboundFrame::Heartbeat) => {
                    Counters::bump(&counters.received);
                    if let Err(e) = self.writer.send(HEARTBEAT_REPLY).await {
                        return LoopEnd::Failed(e);
                    }
                    Counters::bump(&counters.heartbeats);
                    tracing::trace!("heartbeat answered");
                }
                Ok(InboundFrame::Body(body)) => {
                    Counters::bump(&counters.received);
                    self.dispatch.dispatch(&body).await;
                }
                Err(e) => return LoopEnd::Failed(e),
            }
        }
    }
}

impl Dispatcher {
    async fn dispatch(&self, body: &[u8]) {
        let envelopes = match decode_inbound(body) {
            Ok(v) => v,
            Err(e) => {
                Counters::bump(&self.counters.discarded);
                tracing::debug!(error = %e, "discarding frame");
                return;
            }
        };

        for env in envelopes {
            let event = match env {
                InboundEnvelope::User { user_name, event } => SessionEvent::ChatLine {
                    own: user_name == self.user_name,
                    from: user_name,
                    text: event,
                },
                InboundEnvelope::System {
                    event,
                    user_name,
                    channel_id,
                } => SessionEvent::Lifecycle {
                    event,
                    user_name,
                    channel: channel_id.or_else(|| self.directory.current(self.id)),
                },
                InboundEnvelope::Error { message } => SessionEvent::ServerError { message },
            };
            self.sink.push(event).await;
        }
    }
}
