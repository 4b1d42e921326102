// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

//! Server-side relay policy (§4.8): classifies a would-be circuit by the
//! protocol namespace it carries, in the style `protocol_router.rs`
//! already established for realm-scoped admission.
//!
//! Two kinds of relay service exist:
//!
//! - **System Relay**: any node may act as one; it forwards only
//!   `/dep2p/sys/*` circuits, rate-capped per circuit.
//! - **Realm Relay**: forwards `/dep2p/app/<realm>/*` and
//!   `/dep2p/realm/<realm>/*` circuits, but only for callers who have
//!   already proven membership in that realm (the relay itself must also
//!   hold the realm's PSK to make that determination).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use dep2p_identity::NodeId;
use dep2p_protocol::is_reserved_prefix;
use dep2p_realm::RealmSlot;

/// Bandwidth/time cap applied to every System Relay circuit.
pub const SYSTEM_RELAY_BYTES_PER_SEC: u64 = 10 * 1024;
pub const SYSTEM_RELAY_MAX_DURATION: Duration = Duration::from_secs(60);

/// If more than this many disconnects are reported for a single circuit
/// within a minute, the relay suppresses further forwarding for it rather
/// than keep re-establishing a circuit that is clearly thrashing.
const DISCONNECT_ANOMALY_THRESHOLD: usize = 5;
const DISCONNECT_ANOMALY_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayAdmission {
    SystemRelay,
    RealmRelay,
    Denied,
}

/// Decides, given the realm currently held (if any) by the local relay
/// server and the circuit's target protocol, what kind of relaying (if
/// any) applies.
pub fn classify_circuit(realm: &RealmSlot, protocol: &str) -> RelayAdmission {
    if protocol.starts_with(dep2p_protocol::sys::RELAY_HOP) || protocol.starts_with(dep2p_protocol::sys::RELAY_STOP) {
        return RelayAdmission::SystemRelay;
    }
    let Some(segment) = dep2p_protocol::extract_realm_segment(protocol) else {
        return if is_reserved_prefix(protocol) {
            RelayAdmission::SystemRelay
        } else {
            RelayAdmission::Denied
        };
    };
    match realm.current_realm_id() {
        Some(current) if current.to_hex() == segment => RelayAdmission::RealmRelay,
        _ => RelayAdmission::Denied,
    }
}

/// Per-relayed-peer disconnect counters used for batch-anomaly
/// suppression.
#[derive(Default)]
pub struct RelayAnomalyTracker {
    disconnects: HashMap<NodeId, Vec<Instant>>,
}

impl RelayAnomalyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a disconnect for `peer` and returns `true` if the relay
    /// should temporarily stop forwarding circuits for it.
    pub fn record_disconnect(&mut self, peer: NodeId, now: Instant) -> bool {
        let history = self.disconnects.entry(peer).or_default();
        history.retain(|&t| now.duration_since(t) <= DISCONNECT_ANOMALY_WINDOW);
        history.push(now);
        history.len() > DISCONNECT_ANOMALY_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dep2p_identity::KeyPair;
    use dep2p_realm::RealmKey;

    #[test]
    fn sys_protocol_classified_as_system_relay() {
        let slot = RealmSlot::new(KeyPair::generate().node_id());
        assert_eq!(
            classify_circuit(&slot, dep2p_protocol::sys::RELAY_HOP),
            RelayAdmission::SystemRelay
        );
    }

    #[test]
    fn app_protocol_denied_without_matching_realm() {
        let slot = RealmSlot::new(KeyPair::generate().node_id());
        let realm_id = RealmKey::generate().realm_id();
        let proto = dep2p_protocol::app_protocol(realm_id, "chat/1.0.0").unwrap();
        assert_eq!(classify_circuit(&slot, &proto), RelayAdmission::Denied);
    }

    #[test]
    fn app_protocol_admitted_for_joined_realm() {
        let own = KeyPair::generate().node_id();
        let slot = RealmSlot::new(own);
        let key = RealmKey::generate();
        let realm_id = slot.join(key).unwrap();
        let proto = dep2p_protocol::app_protocol(realm_id, "chat/1.0.0").unwrap();
        assert_eq!(classify_circuit(&slot, &proto), RelayAdmission::RealmRelay);
    }

    #[test]
    fn anomaly_tracker_trips_after_threshold() {
        let mut tracker = RelayAnomalyTracker::new();
        let peer = KeyPair::generate().node_id();
        let now = Instant::now();
        let mut tripped = false;
        for _ in 0..=DISCONNECT_ANOMALY_THRESHOLD {
            tripped = tracker.record_disconnect(peer, now);
        }
        assert!(tripped);
    }
}
