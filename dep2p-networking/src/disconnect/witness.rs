// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

//! Layer 3 of disconnect detection (§4.11): the witness network. A node
//! that observes a peer's connection end may broadcast a `WitnessReport`;
//! other members vote AGREE/DISAGREE/ABSTAIN and the tally decides
//! eviction: aggregate observations, compare the count against a fixed
//! bound. The tally itself is a simple vote count, not a statistical
//! divergence test.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use dep2p_identity::NodeId;
use dep2p_protocol::{ConfirmationType, WitnessReport};

/// Each witness may emit at most this many reports per minute per realm.
pub const MAX_REPORTS_PER_MINUTE: usize = 10;
const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Jitter window for the slow-path broadcast delay, to suppress duplicate
/// reports for the same disconnect.
pub const BROADCAST_JITTER_MAX: Duration = Duration::from_millis(500);

/// Tracks, per witness, how many reports it has emitted in the current
/// rate-limit window.
#[derive(Default)]
pub struct RateLimiter {
    emitted: HashMap<NodeId, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` (and records the emission) if `witness` may emit
    /// another report right now; `false` if it has hit the 10/min cap.
    pub fn try_record_emission(&mut self, witness: NodeId, now: Instant) -> bool {
        let history = self.emitted.entry(witness).or_default();
        while let Some(&oldest) = history.front() {
            if now.duration_since(oldest) > RATE_WINDOW {
                history.pop_front();
            } else {
                break;
            }
        }
        if history.len() >= MAX_REPORTS_PER_MINUTE {
            return false;
        }
        history.push_back(now);
        true
    }
}

/// The outcome of tallying votes for one in-flight `WitnessReport`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TallyOutcome {
    /// Not enough votes yet to decide either way.
    Pending,
    /// Evict the target: either the fast path fired, or the slow-path
    /// decision rule (≥1 effective vote, zero DISAGREE, or a simple
    /// majority among ≥2 effective votes) was satisfied.
    Evict,
    /// A DISAGREE vote blocked eviction outright (with only one effective
    /// vote so far) or the majority went against eviction.
    Rejected,
}

/// Tracks confirmations received for one `WitnessReport` and applies the
/// decision rule of spec §4.11: with at least one effective (non-ABSTAIN)
/// vote and zero DISAGREE, a single AGREE suffices; with two or more
/// effective votes, simple majority decides. This deliberately avoids a
/// fixed quorum, which would deadlock small networks.
#[derive(Default)]
pub struct VoteTally {
    agree: usize,
    disagree: usize,
}

impl VoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_vote(&mut self, vote: ConfirmationType) {
        match vote {
            ConfirmationType::Agree => self.agree += 1,
            ConfirmationType::Disagree => self.disagree += 1,
            ConfirmationType::Abstain => {}
        }
    }

    pub fn effective_votes(&self) -> usize {
        self.agree + self.disagree
    }

    pub fn outcome(&self) -> TallyOutcome {
        let effective = self.effective_votes();
        if effective == 0 {
            return TallyOutcome::Pending;
        }
        if effective == 1 {
            return if self.disagree == 0 {
                TallyOutcome::Evict
            } else {
                TallyOutcome::Rejected
            };
        }
        if self.agree > self.disagree {
            TallyOutcome::Evict
        } else {
            TallyOutcome::Rejected
        }
    }
}

/// Decides whether `report` should trigger immediate fast-path eviction
/// without waiting for any votes at all.
pub fn fast_path_applies(report: &WitnessReport, realm_member_count: usize) -> bool {
    report.qualifies_for_fast_path(realm_member_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> NodeId {
        dep2p_identity::KeyPair::generate().node_id()
    }

    #[test]
    fn single_agree_with_no_disagree_evicts() {
        let mut tally = VoteTally::new();
        tally.record_vote(ConfirmationType::Agree);
        assert_eq!(tally.outcome(), TallyOutcome::Evict);
    }

    #[test]
    fn single_disagree_rejects() {
        let mut tally = VoteTally::new();
        tally.record_vote(ConfirmationType::Disagree);
        assert_eq!(tally.outcome(), TallyOutcome::Rejected);
    }

    #[test]
    fn majority_of_two_plus_decides() {
        let mut tally = VoteTally::new();
        tally.record_vote(ConfirmationType::Agree);
        tally.record_vote(ConfirmationType::Agree);
        tally.record_vote(ConfirmationType::Disagree);
        assert_eq!(tally.outcome(), TallyOutcome::Evict);
    }

    #[test]
    fn abstain_never_counts_as_effective() {
        let mut tally = VoteTally::new();
        tally.record_vote(ConfirmationType::Abstain);
        assert_eq!(tally.outcome(), TallyOutcome::Pending);
    }

    #[test]
    fn rate_limiter_caps_at_ten_per_minute() {
        let mut limiter = RateLimiter::new();
        let witness = node();
        let now = Instant::now();
        for _ in 0..MAX_REPORTS_PER_MINUTE {
            assert!(limiter.try_record_emission(witness, now));
        }
        assert!(!limiter.try_record_emission(witness, now));
    }

    #[test]
    fn rate_limiter_window_resets() {
        let mut limiter = RateLimiter::new();
        let witness = node();
        let now = Instant::now();
        for _ in 0..MAX_REPORTS_PER_MINUTE {
            limiter.try_record_emission(witness, now);
        }
        let later = now + RATE_WINDOW + Duration::from_secs(1);
        assert!(limiter.try_record_emission(witness, later));
    }
}
