// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

//! Connection Manager (§4.5): water-mark trim with tag/protect weighting.
//! A bespoke struct owned by the driver and consulted the way
//! `RelayManager` is, rather than libp2p's `connection_limits` behaviour,
//! so the trim policy can reason about per-peer tags and protection that a
//! flat connection cap can't express.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use dep2p_identity::NodeId;

struct PeerState {
    tags: HashMap<String, i64>,
    protected_tags: std::collections::HashSet<String>,
    established_at: Instant,
}

impl PeerState {
    fn new() -> Self {
        Self {
            tags: HashMap::new(),
            protected_tags: std::collections::HashSet::new(),
            established_at: Instant::now(),
        }
    }

    fn weight(&self) -> i64 {
        self.tags.values().sum()
    }

    fn is_protected(&self) -> bool {
        !self.protected_tags.is_empty()
    }
}

/// Tracks per-peer tag weights and protection, and decides which peers to
/// evict when the connection count exceeds `high_water`.
pub struct ConnectionManager {
    low_water: usize,
    high_water: usize,
    grace_period: Duration,
    peers: HashMap<NodeId, PeerState>,
}

impl ConnectionManager {
    pub fn new(low_water: usize, high_water: usize, grace_period: Duration) -> Self {
        Self {
            low_water,
            high_water,
            grace_period,
            peers: HashMap::new(),
        }
    }

    /// Tag and protect calls are idempotent and independent of whether a
    /// connection currently exists for `peer` (spec §4.5).
    pub fn tag_peer(&mut self, peer: NodeId, tag: &str, weight: i64) {
        self.peers.entry(peer).or_insert_with(PeerState::new).tags.insert(tag.to_string(), weight);
    }

    pub fn untag_peer(&mut self, peer: NodeId, tag: &str) {
        if let Some(state) = self.peers.get_mut(&peer) {
            state.tags.remove(tag);
        }
    }

    pub fn protect_peer(&mut self, peer: NodeId, tag: &str) {
        self.peers
            .entry(peer)
            .or_insert_with(PeerState::new)
            .protected_tags
            .insert(tag.to_string());
    }

    pub fn unprotect_peer(&mut self, peer: NodeId, tag: &str) {
        if let Some(state) = self.peers.get_mut(&peer) {
            state.protected_tags.remove(tag);
        }
    }

    /// Records a newly established connection; the peer is immune from
    /// trimming for `grace_period`.
    pub fn on_connected(&mut self, peer: NodeId) {
        self.peers.entry(peer).or_insert_with(PeerState::new).established_at = Instant::now();
    }

    pub fn on_disconnected(&mut self, peer: &NodeId) {
        self.peers.remove(peer);
    }

    /// Returns the peers to evict, in ascending weight order, so the live
    /// connection count falls to `low_water`. Peers within their grace
    /// period or holding a protected tag are never selected.
    pub fn trim(&self, live_connection_count: usize) -> Vec<NodeId> {
        if live_connection_count <= self.high_water {
            return Vec::new();
        }
        let to_evict = live_connection_count - self.low_water;

        let mut candidates: Vec<(NodeId, i64)> = self
            .peers
            .iter()
            .filter(|(_, state)| !state.is_protected() && state.established_at.elapsed() >= self.grace_period)
            .map(|(peer, state)| (*peer, state.weight()))
            .collect();
        candidates.sort_by_key(|(_, weight)| *weight);
        candidates.into_iter().take(to_evict).map(|(peer, _)| peer).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> NodeId {
        dep2p_identity::KeyPair::generate().node_id()
    }

    #[test]
    fn trim_is_noop_below_high_water() {
        let manager = ConnectionManager::new(2, 5, Duration::ZERO);
        assert!(manager.trim(4).is_empty());
    }

    #[test]
    fn trim_evicts_lowest_weight_first() {
        let mut manager = ConnectionManager::new(1, 2, Duration::ZERO);
        let light = node();
        let heavy = node();
        manager.on_connected(light);
        manager.on_connected(heavy);
        manager.tag_peer(light, "default", 1);
        manager.tag_peer(heavy, "default", 100);

        let evicted = manager.trim(3);
        assert_eq!(evicted, vec![light]);
    }

    #[test]
    fn protected_peer_is_never_evicted() {
        let mut manager = ConnectionManager::new(0, 1, Duration::ZERO);
        let peer = node();
        manager.on_connected(peer);
        manager.protect_peer(peer, "pinned");

        assert!(manager.trim(5).is_empty());
    }

    #[test]
    fn peer_within_grace_period_is_immune() {
        let mut manager = ConnectionManager::new(0, 1, Duration::from_secs(3600));
        let peer = node();
        manager.on_connected(peer);

        assert!(manager.trim(5).is_empty());
    }
}
