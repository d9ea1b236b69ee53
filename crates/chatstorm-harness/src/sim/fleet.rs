//! Fleet orchestrator: N independent sessions and their collective result.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::HarnessConfig;
use crate::sim::channel::ChannelDirectory;
use crate::sim::session::{ClientSession, SessionOutcome, SessionReport};
use crate::sim::SessionId;
use crate::sink::{self, EventFeed};

struct Member {
    id: SessionId,
    user_name: String,
    stop: CancellationToken,
    task: JoinHandle<SessionReport>,
}

pub struct FleetHandle {
    /// Parent of every session token; cancelling it stops the whole fleet.
    root: CancellationToken,
    members: Vec<Member>,
    feeds: Vec<(SessionId, EventFeed)>,
    directory: Arc<ChannelDirectory>,
}

/// Spawn `count` sessions onto the current runtime. Each session gets its own
/// stop token and event feed; none shares fate with another.
pub fn spawn(count: usize, cfg: Arc<HarnessConfig>) -> FleetHandle {
    let root = CancellationToken::new();
    let directory = Arc::new(ChannelDirectory::new());
    let mut members = Vec::with_capacity(count);
    let mut feeds = Vec::with_capacity(count);

    for i in 0..count {
        let id = SessionId(i);
        let (events, feed) = sink::channel(
            cfg.fleet.sink_capacity,
            cfg.fleet.sink_reliable_timeout_ms,
        );
        let stop = root.child_token();
        let session = ClientSession::new(
            id,
            Arc::clone(&cfg),
            events,
            stop.clone(),
            Arc::clone(&directory),
        );
        let user_name = session.user_name().to_string();

        members.push(Member {
            id,
            user_name,
            stop,
            task: tokio::spawn(session.run()),
        });
        feeds.push((id, feed));
    }

    tracing::info!(clients = count, target = %cfg.target.addr(), "fleet spawned");
    FleetHandle {
        root,
        members,
        feeds,
        directory,
    }
}

impl FleetHandle {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Hand the event feeds to presentation. Later calls return nothing.
    pub fn take_feeds(&mut self) -> Vec<(SessionId, EventFeed)> {
        std::mem::take(&mut self.feeds)
    }

    pub fn user_name(&self, id: SessionId) -> Option<&str> {
        self.members
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.user_name.as_str())
    }

    /// Signal one session to stop. Returns false for an unknown id.
    pub fn stop(&self, id: SessionId) -> bool {
        match self.members.iter().find(|m| m.id == id) {
            Some(m) => {
                m.stop.cancel();
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&self) {
        self.root.cancel();
    }

    /// Detached handle on `stop_all`, usable after `await_all` took the fleet.
    pub fn stop_all_token(&self) -> CancellationToken {
        self.root.clone()
    }

    pub fn directory(&self) -> Arc<ChannelDirectory> {
        Arc::clone(&self.directory)
    }

    /// Wait until every session is Closed. A panicked session yields a
    /// `Panicked` report; the others are unaffected.
    pub async fn await_all(self) -> FleetSummary {
        let mut pending: FuturesUnordered<_> = self
            .members
            .into_iter()
            .map(|m| async move {
                match m.task.await {
                    Ok(report) => report,
                    Err(e) => {
                        tracing::warn!(session = %m.id, error = %e, "session task failed");
                        SessionReport::panicked(m.id, m.user_name)
                    }
                }
            })
            .collect();

        let mut reports = Vec::new();
        while let Some(report) = pending.next().await {
            reports.push(report);
        }
        reports.sort_by_key(|r| r.id);

        FleetSummary { reports }
    }
}

#[derive(Debug, Clone)]
pub struct FleetSummary {
    /// One report per session, ordered by id.
    pub reports: Vec<SessionReport>,
}

impl FleetSummary {
    pub fn by_outcome(&self) -> BTreeMap<SessionOutcome, usize> {
        let mut out = BTreeMap::new();
        for r in &self.reports {
            *out.entry(r.outcome).or_insert(0) += 1;
        }
        out
    }

    pub fn count(&self, outcome: SessionOutcome) -> usize {
        self.reports.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn frames_sent(&self) -> u64 {
        self.reports.iter().map(|r| r.frames_sent).sum()
    }

    pub fn frames_received(&self) -> u64 {
        self.reports.iter().map(|r| r.frames_received).sum()
    }

    pub fn events_dropped(&self) -> u64 {
        self.reports.iter().map(|r| r.events_dropped).sum()
    }
}
