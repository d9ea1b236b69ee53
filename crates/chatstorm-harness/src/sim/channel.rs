//! Channel state: the configured channel range, one session's current
//! channel, and the fleet-wide directory of who sits where.

use dashmap::{DashMap, DashSet};
use rand::Rng;

use chatstorm_core::protocol::envelope::ChannelId;

use crate::sim::SessionId;

/// Channels `1..=count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSet {
    count: u32,
}

impl ChannelSet {
    pub fn new(count: u32) -> Self {
        Self {
            count: count.max(1),
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn pick<R: Rng>(&self, rng: &mut R) -> ChannelId {
        ChannelId(rng.random_range(1..=self.count))
    }

    pub fn contains(&self, channel: ChannelId) -> bool {
        (1..=self.count).contains(&channel.get())
    }
}

/// A session's current channel. Unassigned until the first join is written.
#[derive(Debug, Clone, Default)]
pub struct ChannelState {
    current: Option<ChannelId>,
}

impl ChannelState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<ChannelId> {
        self.current
    }

    /// The join to send for a switch towards `target`, or `None` when the
    /// session already sits there.
    pub fn switch_target(&self, target: ChannelId) -> Option<ChannelId> {
        if self.current == Some(target) {
            None
        } else {
            Some(target)
        }
    }

    /// Record a join that was written successfully.
    pub fn commit(&mut self, channel: ChannelId) {
        self.current = Some(channel);
    }
}

/// Fleet-wide view: session -> channel, channel -> sessions.
#[derive(Default)]
pub struct ChannelDirectory {
    by_session: DashMap<SessionId, ChannelId>,
    by_channel: DashMap<ChannelId, DashSet<SessionId>>,
}

impl ChannelDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `session` into `channel`, leaving its previous channel.
    pub fn assign(&self, session: SessionId, channel: ChannelId) {
        if let Some(prev) = self.by_session.insert(session, channel) {
            if prev == channel {
                return;
            }
            self.leave(prev, session);
        }
        self.by_channel
            .entry(channel)
            .or_insert_with(DashSet::new)
            .insert(session);
    }

    pub fn current(&self, session: SessionId) -> Option<ChannelId> {
        self.by_session.get(&session).map(|c| *c.value())
    }

    /// Forget `session` entirely (on close).
    pub fn release(&self, session: SessionId) {
        if let Some((_, channel)) = self.by_session.remove(&session) {
            self.leave(channel, session);
        }
    }

    /// Sessions in `channel`, sorted.
    pub fn members(&self, channel: ChannelId) -> Vec<SessionId> {
        let mut out: Vec<SessionId> = self
            .by_channel
            .get(&channel)
            .map(|set| set.iter().map(|s| *s.key()).collect())
            .unwrap_or_default();
        out.sort();
        out
    }

    /// `(channel, member count)` for every occupied channel, sorted by channel.
    pub fn occupancy(&self) -> Vec<(ChannelId, usize)> {
        let mut out: Vec<(ChannelId, usize)> = self
            .by_channel
            .iter()
            .map(|e| (*e.key(), e.value().len()))
            .collect();
        out.sort();
        out
    }

    fn leave(&self, channel: ChannelId, session: SessionId) {
        if let Some(set) = self.by_channel.get(&channel) {
            set.remove(&session);
        }
        self.by_channel.remove_if(&channel, |_, set| set.is_empty());
    }
}
