// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

//! Disconnect detection (§4.11): four cooperating layers —
//!
//! 1. QUIC connection-close / timeout (the transport layer tells us
//!    directly; see `driver.rs`'s `SwarmEvent::ConnectionClosed` handling).
//! 2. Application-level ping failure.
//! 3. The witness network (`witness` module): other members attest to a
//!    suspected disconnect and vote.
//! 4. Grace period, flap suppression, and post-removal protection
//!    (`state` module), which governs how quickly a suspected disconnect
//!    actually turns into a realm eviction.
//!
//! `DisconnectTracker` ties 3 and 4 together per realm.

mod state;
mod witness;

pub use state::{
    GraceDecision, PeerDisconnectState, FLAP_FREEZE, INITIAL_GRACE, MAX_GRACE_EXTENSIONS,
    MAX_GRACE_TOTAL, POST_REMOVAL_PROTECTION,
};
pub use witness::{
    fast_path_applies, RateLimiter, TallyOutcome, VoteTally, BROADCAST_JITTER_MAX,
    MAX_REPORTS_PER_MINUTE,
};

use std::collections::HashMap;
use std::time::Instant;

use dep2p_identity::NodeId;
use dep2p_protocol::{ConfirmationType, WitnessReport};

/// Per-realm bookkeeping: one `PeerDisconnectState` per suspected peer,
/// one `VoteTally` per in-flight report, and a single shared
/// `RateLimiter` across all witnesses in the realm.
#[derive(Default)]
pub struct DisconnectTracker {
    peers: HashMap<NodeId, PeerDisconnectState>,
    tallies: HashMap<[u8; 16], (NodeId, VoteTally)>,
    rate_limiter: RateLimiter,
}

/// What to do with an incoming `WitnessReport`, decided by `DisconnectTracker::submit_report`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportDecision {
    /// The reporting witness is rate-limited; drop the report.
    RateLimited,
    /// Fast path: evict immediately, no vote required.
    ImmediateEvict,
    /// Slow path: broadcast for confirmation and start tallying.
    AwaitConfirmation,
}

impl DisconnectTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn peer_state(&mut self, target: NodeId) -> &mut PeerDisconnectState {
        self.peers.entry(target).or_insert_with(PeerDisconnectState::new)
    }

    /// Feeds in a freshly-received `WitnessReport`, applying the rate
    /// limit and the fast-path rule (§4.11) before deciding whether a
    /// vote round is needed at all.
    pub fn submit_report(
        &mut self,
        report: &WitnessReport,
        realm_member_count: usize,
        now: Instant,
    ) -> ReportDecision {
        if !self.rate_limiter.try_record_emission(report.witness(), now) {
            return ReportDecision::RateLimited;
        }
        if fast_path_applies(report, realm_member_count) {
            self.peer_state(report.target()).on_disconnect(now);
            return ReportDecision::ImmediateEvict;
        }
        self.tallies
            .entry(report.report_id())
            .or_insert_with(|| (report.target(), VoteTally::new()));
        self.peer_state(report.target()).on_disconnect(now);
        ReportDecision::AwaitConfirmation
    }

    /// Records one confirmation vote against an in-flight report and
    /// returns the current tally outcome.
    pub fn record_confirmation(&mut self, report_id: [u8; 16], vote: ConfirmationType) -> TallyOutcome {
        let Some((_, tally)) = self.tallies.get_mut(&report_id) else {
            return TallyOutcome::Pending;
        };
        tally.record_vote(vote);
        tally.outcome()
    }

    /// Evaluates the grace/flap state for `target` and, if the grace
    /// period has elapsed, clears its tally and marks it removed.
    pub fn evaluate_grace(&mut self, target: NodeId, now: Instant) -> GraceDecision {
        let decision = self.peer_state(target).evaluate(now);
        if decision == GraceDecision::Evict {
            self.peer_state(target).mark_removed(now);
            self.tallies.retain(|_, (peer, _)| *peer != target);
        }
        decision
    }

    pub fn on_reconnect(&mut self, target: NodeId, now: Instant) {
        self.peer_state(target).on_reconnect(now);
    }

    pub fn is_protected_from_readmission(&self, target: NodeId, now: Instant) -> bool {
        self.peers
            .get(&target)
            .map(|state| state.is_protected_from_readmission(now))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dep2p_identity::KeyPair;
    use dep2p_protocol::{DetectionMethod, RealmId};
    use std::time::Duration;

    fn realm() -> RealmId {
        RealmId::derive_from_hashed_key(&[1u8; 32])
    }

    fn report(witness: &KeyPair, report_id: [u8; 16], target: NodeId, method: DetectionMethod) -> WitnessReport {
        WitnessReport::sign_new(witness, report_id, target, realm(), method, 1_000, 1_000).unwrap()
    }

    #[test]
    fn quic_close_in_small_realm_evicts_immediately() {
        let mut tracker = DisconnectTracker::new();
        let witness = KeyPair::generate();
        let target = KeyPair::generate().node_id();
        let r = report(&witness, [1u8; 16], target, DetectionMethod::QuicClose);
        let decision = tracker.submit_report(&r, 3, Instant::now());
        assert_eq!(decision, ReportDecision::ImmediateEvict);
    }

    #[test]
    fn rate_limited_witness_is_dropped() {
        let mut tracker = DisconnectTracker::new();
        let witness = KeyPair::generate();
        let target = KeyPair::generate().node_id();
        let now = Instant::now();
        for i in 0..MAX_REPORTS_PER_MINUTE {
            let r = report(&witness, [i as u8; 16], target, DetectionMethod::PingFailed);
            tracker.submit_report(&r, 50, now);
        }
        let r = report(&witness, [99u8; 16], target, DetectionMethod::PingFailed);
        assert_eq!(tracker.submit_report(&r, 50, now), ReportDecision::RateLimited);
    }

    #[test]
    fn post_removal_protection_follows_grace_eviction() {
        let mut tracker = DisconnectTracker::new();
        let target = KeyPair::generate().node_id();
        let t0 = Instant::now();
        tracker.peer_state(target).on_disconnect(t0);
        assert_eq!(tracker.evaluate_grace(target, t0 + Duration::from_secs(1)), GraceDecision::Wait);
        let decision = tracker.evaluate_grace(target, t0 + INITIAL_GRACE + Duration::from_secs(1));
        assert_eq!(decision, GraceDecision::Evict);
        assert!(tracker.is_protected_from_readmission(target, t0 + INITIAL_GRACE + Duration::from_secs(2)));
    }
}
