// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

//! Grace period, flap suppression, and post-removal protection (§4.11),
//! kept per-peer in a small state machine rather than scattered across
//! the driver's event loop: a single peer's bookkeeping lives behind one
//! struct, the same way `connection_manager::PeerState` isolates its own
//! per-peer data, instead of threading timers through the `SwarmDriver`
//! directly.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Initial grace period granted after a Layer-1/Layer-2 disconnect signal,
/// before the peer is actually evicted from the realm's member set.
pub const INITIAL_GRACE: Duration = Duration::from_secs(15);
/// A grace period may be extended at most this many times...
pub const MAX_GRACE_EXTENSIONS: u32 = 2;
/// ...and never past this total.
pub const MAX_GRACE_TOTAL: Duration = Duration::from_secs(45);

/// Reconnect cycles within this window count toward flap suppression.
const FLAP_WINDOW: Duration = Duration::from_secs(60);
/// This many cycles inside `FLAP_WINDOW` trips the freeze.
const FLAP_THRESHOLD: usize = 3;
/// Once tripped, eviction decisions for the peer are frozen this long.
pub const FLAP_FREEZE: Duration = Duration::from_secs(300);

/// After a peer is evicted, re-admission via PubSub or DHT gossip is
/// refused for this long, so a stale announcement can't immediately
/// resurrect a peer that was just kicked.
pub const POST_REMOVAL_PROTECTION: Duration = Duration::from_secs(30);

/// Per-peer grace/flap/protection state. One instance per (realm, peer)
/// pair, owned by whatever subsystem tracks realm membership.
pub struct PeerDisconnectState {
    grace_started_at: Option<Instant>,
    grace_extensions_used: u32,
    reconnect_cycles: VecDeque<Instant>,
    frozen_until: Option<Instant>,
    removed_at: Option<Instant>,
}

impl Default for PeerDisconnectState {
    fn default() -> Self {
        Self {
            grace_started_at: None,
            grace_extensions_used: 0,
            reconnect_cycles: VecDeque::new(),
            frozen_until: None,
            removed_at: None,
        }
    }
}

/// What the caller should do after feeding a disconnect signal in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraceDecision {
    /// Still within grace; keep waiting.
    Wait,
    /// Grace has run out (or flap-frozen); proceed to eviction.
    Evict,
    /// Flap suppression is active; hold off on any decision at all.
    Frozen,
}

impl PeerDisconnectState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call when a disconnect is first observed. Starts (or re-enters) the
    /// grace period.
    pub fn on_disconnect(&mut self, now: Instant) {
        if self.frozen_until.map(|until| now < until).unwrap_or(false) {
            return;
        }
        self.grace_started_at.get_or_insert(now);
    }

    /// Call when the peer reconnects before grace expired. Records a flap
    /// cycle and clears the grace timer.
    pub fn on_reconnect(&mut self, now: Instant) {
        self.grace_started_at = None;
        self.grace_extensions_used = 0;
        self.reconnect_cycles.push_back(now);
        while let Some(&oldest) = self.reconnect_cycles.front() {
            if now.duration_since(oldest) > FLAP_WINDOW {
                self.reconnect_cycles.pop_front();
            } else {
                break;
            }
        }
        if self.reconnect_cycles.len() >= FLAP_THRESHOLD {
            self.frozen_until = Some(now + FLAP_FREEZE);
            self.reconnect_cycles.clear();
        }
    }

    /// Extends the current grace period by `INITIAL_GRACE`, if the peer
    /// hasn't already used up its two extensions or hit the 45s cap.
    pub fn try_extend_grace(&mut self, now: Instant) -> bool {
        let Some(started) = self.grace_started_at else {
            return false;
        };
        if self.grace_extensions_used >= MAX_GRACE_EXTENSIONS {
            return false;
        }
        if now.duration_since(started) + INITIAL_GRACE > MAX_GRACE_TOTAL {
            return false;
        }
        self.grace_extensions_used += 1;
        true
    }

    /// Evaluates the current grace/flap state and returns what the caller
    /// should do next.
    pub fn evaluate(&mut self, now: Instant) -> GraceDecision {
        if let Some(until) = self.frozen_until {
            if now < until {
                return GraceDecision::Frozen;
            }
            self.frozen_until = None;
        }
        let Some(started) = self.grace_started_at else {
            return GraceDecision::Wait;
        };
        let elapsed = now.duration_since(started);
        let allotted = INITIAL_GRACE * (self.grace_extensions_used + 1);
        let allotted = allotted.min(MAX_GRACE_TOTAL);
        if elapsed >= allotted {
            GraceDecision::Evict
        } else {
            GraceDecision::Wait
        }
    }

    /// Marks the peer as evicted at `now`, starting the post-removal
    /// protection window.
    pub fn mark_removed(&mut self, now: Instant) {
        self.removed_at = Some(now);
        self.grace_started_at = None;
    }

    /// Whether a re-admission attempt (from PubSub or DHT gossip) at `now`
    /// must be refused because the peer was just evicted.
    pub fn is_protected_from_readmission(&self, now: Instant) -> bool {
        self.removed_at
            .map(|removed| now.duration_since(removed) < POST_REMOVAL_PROTECTION)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grace_evicts_only_after_default_window() {
        let mut state = PeerDisconnectState::new();
        let t0 = Instant::now();
        state.on_disconnect(t0);
        assert_eq!(state.evaluate(t0 + Duration::from_secs(1)), GraceDecision::Wait);
        assert_eq!(
            state.evaluate(t0 + INITIAL_GRACE + Duration::from_millis(1)),
            GraceDecision::Evict
        );
    }

    #[test]
    fn extension_pushes_eviction_out_but_caps_at_45s() {
        let mut state = PeerDisconnectState::new();
        let t0 = Instant::now();
        state.on_disconnect(t0);
        assert!(state.try_extend_grace(t0 + Duration::from_secs(5)));
        assert!(state.try_extend_grace(t0 + Duration::from_secs(10)));
        assert!(!state.try_extend_grace(t0 + Duration::from_secs(20)));
        assert_eq!(
            state.evaluate(t0 + MAX_GRACE_TOTAL - Duration::from_secs(1)),
            GraceDecision::Wait
        );
        assert_eq!(
            state.evaluate(t0 + MAX_GRACE_TOTAL + Duration::from_millis(1)),
            GraceDecision::Evict
        );
    }

    #[test]
    fn three_cycles_in_window_trips_freeze() {
        let mut state = PeerDisconnectState::new();
        let t0 = Instant::now();
        state.on_disconnect(t0);
        state.on_reconnect(t0 + Duration::from_secs(1));
        state.on_disconnect(t0 + Duration::from_secs(2));
        state.on_reconnect(t0 + Duration::from_secs(3));
        state.on_disconnect(t0 + Duration::from_secs(4));
        state.on_reconnect(t0 + Duration::from_secs(5));
        assert_eq!(state.evaluate(t0 + Duration::from_secs(6)), GraceDecision::Frozen);
    }

    #[test]
    fn freeze_clears_after_cooldown() {
        let mut state = PeerDisconnectState::new();
        let t0 = Instant::now();
        for i in 0..3 {
            let base = t0 + Duration::from_secs(i);
            state.on_disconnect(base);
            state.on_reconnect(base + Duration::from_millis(500));
        }
        assert_eq!(state.evaluate(t0 + Duration::from_secs(10)), GraceDecision::Frozen);
        assert_eq!(state.evaluate(t0 + FLAP_FREEZE + Duration::from_secs(11)), GraceDecision::Wait);
    }

    #[test]
    fn post_removal_protection_expires_after_30s() {
        let mut state = PeerDisconnectState::new();
        let t0 = Instant::now();
        state.mark_removed(t0);
        assert!(state.is_protected_from_readmission(t0 + Duration::from_secs(5)));
        assert!(!state.is_protected_from_readmission(t0 + Duration::from_secs(31)));
    }
}
