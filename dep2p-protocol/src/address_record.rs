// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

use std::time::{Duration, Instant};

use libp2p::Multiaddr;
use serde::{Deserialize, Serialize};

use crate::NodeId;

/// Where an [`AddressRecord`] was learned from. Drives both its default TTL
/// and its default verification priority (spec §3/§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressSource {
    /// Learned from a successful direct dial, or promoted by an explicit
    /// dialback.
    Direct,
    /// Learned from a DHT `PeerRecord`.
    Dht,
    /// Learned via local-network mDNS discovery.
    Mdns,
    /// Learned from a relay reservation/circuit address.
    Relay,
    /// Learned from a STUN-derived external-address observation.
    Stun,
    /// Explicitly configured by the operator.
    UserConfigured,
}

/// `user-advertise` priority tier.
pub const PRIORITY_USER_ADVERTISE: u16 = 150;
/// `verified-direct` priority tier.
pub const PRIORITY_VERIFIED_DIRECT: u16 = 100;
/// `STUN-discovered` priority tier.
pub const PRIORITY_STUN_DISCOVERED: u16 = 75;
/// `relay-guaranteed` priority tier.
pub const PRIORITY_RELAY_GUARANTEED: u16 = 50;
/// `local-listen` priority tier (mDNS-learned, same-LAN addresses).
pub const PRIORITY_LOCAL_LISTEN: u16 = 10;
/// `unverified` priority tier, the default for anything not independently
/// confirmed (e.g. a bare DHT-learned address before dialback).
pub const PRIORITY_UNVERIFIED: u16 = 0;

/// Minimum priority for an address to be considered publishable (e.g. into
/// a `PeerRecord`'s `direct_addrs`).
pub const PUBLISHABLE_THRESHOLD: u16 = 50;

impl AddressSource {
    /// Default verification priority for a freshly learned address from
    /// this source, before any promotion (e.g. a later dialback).
    pub fn default_priority(self) -> u16 {
        match self {
            AddressSource::UserConfigured => PRIORITY_USER_ADVERTISE,
            AddressSource::Direct => PRIORITY_VERIFIED_DIRECT,
            AddressSource::Stun => PRIORITY_STUN_DISCOVERED,
            AddressSource::Relay => PRIORITY_RELAY_GUARANTEED,
            AddressSource::Mdns => PRIORITY_LOCAL_LISTEN,
            AddressSource::Dht => PRIORITY_UNVERIFIED,
        }
    }

    /// Default TTL for this source, or `None` if the address should not
    /// expire on its own (operator-pinned addresses).
    pub fn default_ttl(self) -> Option<Duration> {
        match self {
            AddressSource::Direct => Some(Duration::from_secs(60 * 60)),
            AddressSource::Dht => Some(Duration::from_secs(30 * 60)),
            AddressSource::Mdns => Some(Duration::from_secs(5 * 60)),
            AddressSource::Relay => Some(Duration::from_secs(10 * 60)),
            // STUN-derived addresses are verified the same way direct
            // dialback is (§4.7); the TTL table does not list `stun`
            // separately so it inherits the `direct` TTL.
            AddressSource::Stun => Some(Duration::from_secs(60 * 60)),
            // Operator-pinned addresses persist until explicitly removed.
            AddressSource::UserConfigured => None,
        }
    }
}

/// `(NodeId, Multiaddr, TTL, source, verification-priority)`.
#[derive(Debug, Clone)]
pub struct AddressRecord {
    node_id: NodeId,
    addr: Multiaddr,
    source: AddressSource,
    priority: u16,
    ttl: Option<Duration>,
    learned_at: Instant,
}

impl AddressRecord {
    pub fn new(node_id: NodeId, addr: Multiaddr, source: AddressSource) -> Self {
        Self {
            node_id,
            addr,
            priority: source.default_priority(),
            ttl: source.default_ttl(),
            source,
            learned_at: Instant::now(),
        }
    }

    /// Builds a record with a priority override, e.g. after a later
    /// dialback promotes a `Stun` record up to `verified-direct`.
    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = priority;
        self
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn addr(&self) -> &Multiaddr {
        &self.addr
    }

    pub fn source(&self) -> AddressSource {
        self.source
    }

    pub fn priority(&self) -> u16 {
        self.priority
    }

    /// An address is publishable iff its priority is at or above
    /// [`PUBLISHABLE_THRESHOLD`].
    pub fn is_publishable(&self) -> bool {
        self.priority >= PUBLISHABLE_THRESHOLD
    }

    pub fn is_expired(&self) -> bool {
        match self.ttl {
            Some(ttl) => self.learned_at.elapsed() >= ttl,
            None => false,
        }
    }

    /// Promotes this record's priority to `verified-direct` following a
    /// successful explicit dialback, per spec §4.7.
    pub fn promote_to_verified_direct(&mut self) {
        self.priority = PRIORITY_VERIFIED_DIRECT;
        self.ttl = AddressSource::Direct.default_ttl();
    }

    /// Resets the learned-at clock, e.g. on re-confirmation from the same
    /// source.
    pub fn refresh(&mut self) {
        self.learned_at = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_id() -> NodeId {
        dep2p_identity::KeyPair::generate().node_id()
    }

    #[test]
    fn relay_guaranteed_is_publishable_but_unverified_is_not() {
        let addr: Multiaddr = "/ip4/127.0.0.1/udp/1/quic-v1".parse().unwrap();
        let relay = AddressRecord::new(node_id(), addr.clone(), AddressSource::Relay);
        assert!(relay.is_publishable());

        let dht = AddressRecord::new(node_id(), addr, AddressSource::Dht);
        assert!(!dht.is_publishable());
    }

    #[test]
    fn promotion_raises_priority_and_ttl_class() {
        let addr: Multiaddr = "/ip4/127.0.0.1/udp/1/quic-v1".parse().unwrap();
        let mut stun = AddressRecord::new(node_id(), addr, AddressSource::Stun);
        assert_eq!(stun.priority(), PRIORITY_STUN_DISCOVERED);
        stun.promote_to_verified_direct();
        assert_eq!(stun.priority(), PRIORITY_VERIFIED_DIRECT);
    }

    #[test]
    fn user_configured_addresses_never_expire() {
        let addr: Multiaddr = "/ip4/127.0.0.1/udp/1/quic-v1".parse().unwrap();
        let record = AddressRecord::new(node_id(), addr, AddressSource::UserConfigured);
        assert!(!record.is_expired());
    }
}
