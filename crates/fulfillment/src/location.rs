//! Ephemeral store of agents' last known positions.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common::{AggregateId, UserId};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use domain::GeoPoint;

/// An agent's last reported position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentLocation {
    pub point: GeoPoint,
    pub order: Option<AggregateId>,
    pub reported_at: DateTime<Utc>,
}

/// Last-write-wins location store with a freshness window.
///
/// Entries older than the TTL read as absent and are removed by
/// [`LocationStore::prune`].
#[derive(Debug, Clone)]
pub struct LocationStore {
    entries: Arc<DashMap<UserId, AgentLocation>>,
    ttl: Duration,
}

impl LocationStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Records a position. A report older than the stored one is dropped.
    ///
    /// Returns whether the report was kept.
    pub fn record(&self, agent: UserId, location: AgentLocation) -> bool {
        match self.entries.entry(agent) {
            Entry::Occupied(mut current) => {
                if current.get().reported_at > location.reported_at {
                    tracing::debug!(%agent, "dropping out-of-order location report");
                    return false;
                }
                current.insert(location);
                true
            }
            Entry::Vacant(slot) => {
                slot.insert(location);
                true
            }
        }
    }

    /// Returns the agent's position if it is still fresh at `now`.
    pub fn get(&self, agent: UserId, now: DateTime<Utc>) -> Option<AgentLocation> {
        self.entries
            .get(&agent)
            .map(|entry| *entry.value())
            .filter(|location| location.reported_at + self.ttl > now)
    }

    /// Removes stale entries. Returns how many were removed.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, location| location.reported_at + self.ttl > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
