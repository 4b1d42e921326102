// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

//! NAT (§4.7): STUN-derived candidate discovery, UPnP port mapping, and
//! hole-punch coordination. Grounded in the standalone `nat-detection`
//! binary's use of `libp2p::autonat`/`libp2p::upnp` as the library-level
//! STUN-equivalent and UPnP client; here they're `Toggle`d behaviours wired
//! into `NodeBehaviour` (see `behaviour.rs`) rather than a standalone tool.

use dep2p_identity::NodeId;
use dep2p_protocol::{AddressRecord, AddressSource, NatClass};
use libp2p::Multiaddr;

/// A STUN-like external-address observation. Per spec §4.7, STUN is
/// itself treated as a third-party verification mechanism, so its result
/// is marked verified (priority 75) immediately rather than waiting on a
/// dialback — this breaks the cold-start chicken-and-egg of requiring
/// dialback before an address can be published at all.
pub fn record_from_stun_observation(node_id: NodeId, observed: Multiaddr) -> AddressRecord {
    AddressRecord::new(node_id, observed, AddressSource::Stun)
}

/// A UPnP/NAT-PMP port mapping succeeded: the mapped public address goes
/// straight to `verified-direct` (priority 100), since a confirmed router
/// mapping is as strong a verification signal as a dialback.
pub fn record_from_upnp_mapping(node_id: NodeId, mapped: Multiaddr) -> AddressRecord {
    AddressRecord::new(node_id, mapped, AddressSource::Direct)
}

/// A successful explicit dialback promotes a previously-unverified or
/// STUN-discovered address to `verified-direct`.
pub fn promote_via_dialback(mut record: AddressRecord) -> AddressRecord {
    record.promote_to_verified_direct();
    record
}

/// One side's offer of an observed address pair exchanged over the Relay
/// signaling channel (§4.7/§4.8) to coordinate a simultaneous UDP send.
#[derive(Debug, Clone)]
pub struct HolePunchOffer {
    pub peer: NodeId,
    pub observed_addrs: Vec<Multiaddr>,
}

/// Outcome of a coordinated hole-punch attempt. QUIC's shared single-socket
/// model (§4.2) gives meaningfully higher success odds than TCP punching,
/// but it can still fail under symmetric NAT on both ends, at which point
/// the caller should fall through to a relayed circuit (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HolePunchOutcome {
    Succeeded,
    FallThroughToRelay,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> NodeId {
        dep2p_identity::KeyPair::generate().node_id()
    }

    #[test]
    fn stun_observation_is_verified_on_arrival() {
        let addr: Multiaddr = "/ip4/203.0.113.1/udp/4001/quic-v1".parse().unwrap();
        let record = record_from_stun_observation(node(), addr);
        assert!(record.is_publishable());
        assert_eq!(record.source(), AddressSource::Stun);
    }

    #[test]
    fn upnp_mapping_is_direct_verified() {
        let addr: Multiaddr = "/ip4/203.0.113.1/udp/4001/quic-v1".parse().unwrap();
        let record = record_from_upnp_mapping(node(), addr);
        assert_eq!(record.source(), AddressSource::Direct);
        assert!(record.is_publishable());
    }

    #[test]
    fn nat_class_reexport_resolves() {
        assert!(NatClass::Public.ttl() > NatClass::Symmetric.ttl());
    }
}
