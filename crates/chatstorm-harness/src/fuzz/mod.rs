//! Protocol fuzzer: one connection, two hostile frames, one verdict.
//!
//! Sends an oversized message, waits `settle_ms`, sends a deeply nested
//! join, then waits up to `response_timeout_ms` for anything back. What the
//! server does is a classification, never a harness error.

pub mod payload;

use tokio::time::{sleep, timeout, Duration, Instant};

use chatstorm_core::error::{HarnessError, Result};

use crate::config::{FuzzSection, HarnessConfig, TargetSection};
use crate::transport::{self, Connection};

/// Most bytes taken from the server's first reply.
const REPLY_READ_BYTES: usize = 1024;

/// Bytes of a reply kept for the report.
const PREVIEW_BYTES: usize = 120;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The server sent at least one byte back, framed or not.
    Replied { bytes: usize, preview: String },
    /// Nothing within the wait bound.
    Timeout,
    /// The server closed or reset the connection.
    ConnectionClosed { reason: String },
}

impl ProbeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeOutcome::Replied { .. } => "replied",
            ProbeOutcome::Timeout => "timeout",
            ProbeOutcome::ConnectionClosed { .. } => "connection-closed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FuzzReport {
    pub oversized_len: usize,
    pub nested_depth: usize,
    pub nested_len: usize,
    pub outcome: ProbeOutcome,
    /// Time from the first write to the verdict.
    pub elapsed: Duration,
}

pub struct ProtocolFuzzer {
    target: TargetSection,
    fuzz: FuzzSection,
}

impl ProtocolFuzzer {
    pub fn new(cfg: &HarnessConfig) -> Self {
        Self {
            target: cfg.target.clone(),
            fuzz: cfg.fuzz.clone(),
        }
    }

    /// Dial and probe. Only a failed dial is an error (`ConnectFailed`).
    pub async fn run(&self) -> Result<FuzzReport> {
        tracing::info!(target = %self.target.addr(), wire = self.target.wire.as_str(), "fuzzing");
        let conn = transport::dial(&self.target).await?;
        Ok(self.run_with(conn).await)
    }

    pub async fn run_with(&self, conn: Connection) -> FuzzReport {
        let Connection {
            mut reader,
            mut writer,
        } = conn;

        let oversized = payload::oversized_body(self.fuzz.oversized_bytes);
        let nested = payload::nested_body(self.fuzz.nesting_depth);
        let started = Instant::now();

        let outcome = async {
            tracing::info!(len = oversized.len(), "sending oversized frame");
            if let Err(e) = writer.write_frame(oversized.as_bytes()).await {
                return closed(e);
            }

            sleep(Duration::from_millis(self.fuzz.settle_ms)).await;

            tracing::info!(
                depth = self.fuzz.nesting_depth,
                len = nested.len(),
                "sending deep json frame"
            );
            if let Err(e) = writer.write_frame(nested.as_bytes()).await {
                return closed(e);
            }

            let wait = Duration::from_millis(self.fuzz.response_timeout_ms);
            // Raw bytes, not frames: a partial or malformed reply still counts.
            match timeout(wait, reader.read_some(REPLY_READ_BYTES)).await {
                Err(_) => ProbeOutcome::Timeout,
                Ok(Ok(bytes)) => ProbeOutcome::Replied {
                    bytes: bytes.len(),
                    preview: preview(&bytes),
                },
                Ok(Err(e)) => closed(e),
            }
        }
        .await;

        if let Err(e) = writer.shutdown().await {
            tracing::debug!(error = %e, "shutdown after probe failed");
        }

        let report = FuzzReport {
            oversized_len: oversized.len(),
            nested_depth: self.fuzz.nesting_depth,
            nested_len: nested.len(),
            outcome,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            outcome = report.outcome.as_str(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "fuzz finished"
        );
        report
    }
}

fn closed(e: HarnessError) -> ProbeOutcome {
    ProbeOutcome::ConnectionClosed {
        reason: e.to_string(),
    }
}

fn preview(body: &[u8]) -> String {
    let cut = body.len().min(PREVIEW_BYTES);
    String::from_utf8_lossy(body.get(..cut).unwrap_or_default()).into_owned()
}
