//! chatstorm harness binary.
//!
//! `chatstorm-harness [fleet|fuzz] [CONFIG]` (see `--help`)
//! - fleet: spawn the configured clients, log their transcripts, stop on Ctrl+C
//! - fuzz: run the protocol fuzzer once and log its verdict

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

use chatstorm_harness::cli::{Cli, Mode};
use chatstorm_harness::config::{self, HarnessConfig};
use chatstorm_harness::fuzz::{ProbeOutcome, ProtocolFuzzer};
use chatstorm_harness::sim::{fleet, ChannelDirectory, SessionId, SessionOutcome};
use chatstorm_harness::sink::{EventFeed, Pull, SessionEvent};

/// Transcript consumers wake at least this often.
const PULL_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let Cli { mode, config: path } = Cli::parse();

    let cfg = match config::load_from_file(&path) {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            tracing::error!(%path, code = e.kind().as_str(), error = %e, "config load failed");
            return ExitCode::from(2);
        }
    };

    match mode {
        Mode::Fleet => run_fleet(cfg).await,
        Mode::Fuzz => run_fuzz(&cfg).await,
    }
}

async fn run_fleet(cfg: Arc<HarnessConfig>) -> ExitCode {
    let mut handle = fleet::spawn(cfg.fleet.clients, Arc::clone(&cfg));
    let directory = handle.directory();

    let consumers: Vec<_> = handle
        .take_feeds()
        .into_iter()
        .map(|(id, feed)| tokio::spawn(transcript(id, feed, Arc::clone(&cfg), Arc::clone(&directory))))
        .collect();

    let stop = handle.stop_all_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        stop.cancel();
    });

    let summary = handle.await_all().await;
    // Feeds close once their sessions are gone.
    for c in consumers {
        let _ = c.await;
    }

    for (outcome, sessions) in summary.by_outcome() {
        tracing::info!(outcome = outcome.as_str(), sessions, "fleet outcome");
    }
    for (channel, members) in directory.occupancy() {
        tracing::debug!(%channel, members, "channel still occupied");
    }
    tracing::info!(
        sessions = summary.reports.len(),
        frames_sent = summary.frames_sent(),
        frames_received = summary.frames_received(),
        events_dropped = summary.events_dropped(),
        "fleet finished"
    );

    if summary.count(SessionOutcome::Panicked) > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn run_fuzz(cfg: &HarnessConfig) -> ExitCode {
    match ProtocolFuzzer::new(cfg).run().await {
        Ok(report) => {
            match &report.outcome {
                ProbeOutcome::Replied { bytes, preview } => {
                    tracing::info!(bytes, %preview, "server replied")
                }
                ProbeOutcome::Timeout => tracing::warn!("no response from server (possible hang)"),
                ProbeOutcome::ConnectionClosed { reason } => {
                    tracing::warn!(%reason, "server closed the connection")
                }
            }
            tracing::info!(
                oversized_len = report.oversized_len,
                nested_depth = report.nested_depth,
                nested_len = report.nested_len,
                outcome = report.outcome.as_str(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "fuzz report"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(code = e.kind().as_str(), error = %e, "fuzz run failed");
            ExitCode::FAILURE
        }
    }
}

async fn transcript(
    id: SessionId,
    mut feed: EventFeed,
    cfg: Arc<HarnessConfig>,
    directory: Arc<ChannelDirectory>,
) {
    loop {
        match feed.pull_timeout(PULL_INTERVAL).await {
            Pull::Event(ev) => render(id, &ev, &cfg, &directory),
            Pull::Empty => continue,
            Pull::Closed => break,
        }
    }
    let dropped = feed.dropped();
    if dropped > 0 {
        tracing::warn!(session = %id, dropped, "transcript events dropped");
    }
}

fn render(id: SessionId, ev: &SessionEvent, cfg: &HarnessConfig, directory: &ChannelDirectory) {
    let channel = match ev {
        SessionEvent::Lifecycle { channel, .. } => *channel,
        _ => directory.current(id),
    };
    let color = channel.map_or("white", |c| cfg.fleet.channel_color(c));
    let ch = channel.map_or_else(|| "-".to_string(), |c| c.to_string());

    match ev {
        SessionEvent::ChatLine { from, text, own } => {
            tracing::info!(session = %id, channel = %ch, color, own, "[{from}] {text}")
        }
        SessionEvent::Lifecycle {
            event, user_name, ..
        } => tracing::info!(session = %id, channel = %ch, color, "* {user_name} {event}"),
        SessionEvent::ServerError { message } => {
            tracing::warn!(session = %id, channel = %ch, "server error: {message}")
        }
        SessionEvent::ConnectFailed { reason } => {
            tracing::warn!(session = %id, "connect failed: {reason}")
        }
        SessionEvent::ConnectionLost { reason } => {
            tracing::warn!(session = %id, "connection lost: {reason}")
        }
        SessionEvent::Fault { detail } => tracing::warn!(session = %id, "fault: {detail}"),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("signal received, stopping fleet");
}
