// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

//! Client-side relay candidate tracking (§4.8): maintain a bounded pool of
//! relay candidates discovered via identify, request a reservation with a
//! few of them, and keep the swarm's external address set in sync as
//! reservations come and go.

use std::collections::{BTreeMap, HashSet, VecDeque};

use libp2p::core::transport::ListenerId;
use libp2p::multiaddr::Protocol;
use libp2p::{Multiaddr, PeerId, StreamProtocol, Swarm};
use tracing::{debug, info, trace, warn};

use crate::behaviour::NodeBehaviour;

const MAX_CONCURRENT_RELAY_CONNECTIONS: usize = 3;
const MAX_POTENTIAL_CANDIDATES: usize = 15;
const RELAY_STOP_PROTOCOL: &str = "/libp2p/circuit/relay/0.2.0/stop";

/// Tracks relayed connections on the client side of a node. Disabled
/// (`enabled = false`) until the node concludes it is behind a NAT it
/// cannot otherwise traverse (driven by autonat results in `driver.rs`).
pub struct RelayManager {
    self_peer_id: PeerId,
    enabled: bool,
    candidates: VecDeque<(PeerId, Multiaddr)>,
    waiting_for_reservation: BTreeMap<PeerId, Multiaddr>,
    connected_relays: BTreeMap<PeerId, Multiaddr>,
    relayed_listener_id_map: BTreeMap<ListenerId, PeerId>,
}

impl RelayManager {
    pub fn new(self_peer_id: PeerId) -> Self {
        Self {
            self_peer_id,
            enabled: false,
            candidates: VecDeque::new(),
            waiting_for_reservation: BTreeMap::new(),
            connected_relays: BTreeMap::new(),
            relayed_listener_id_map: BTreeMap::new(),
        }
    }

    pub fn enable(&mut self, enable: bool) {
        debug!(enable, "relay client enabled state changed");
        self.enabled = enable;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Relays we are currently using should never be pruned by the
    /// connection manager's water marks; callers consult this before
    /// trimming.
    pub fn keep_alive_peer(&self, peer_id: &PeerId) -> bool {
        self.connected_relays.contains_key(peer_id) || self.waiting_for_reservation.contains_key(peer_id)
    }

    /// Considers a peer discovered via identify as a relay candidate, if
    /// it advertises the relay STOP protocol and isn't already relayed
    /// itself.
    pub fn add_potential_candidate(
        &mut self,
        peer_id: PeerId,
        addrs: &HashSet<Multiaddr>,
        stream_protocols: &[StreamProtocol],
    ) {
        if self.candidates.len() >= MAX_POTENTIAL_CANDIDATES {
            trace!("relay candidate pool full, dropping {peer_id}");
            return;
        }
        if !stream_protocols.iter().any(|p| p.as_ref() == RELAY_STOP_PROTOCOL) {
            return;
        }
        let Some(addr) = addrs.iter().find(|a| !a.iter().any(|p| p == Protocol::P2pCircuit)) else {
            return;
        };
        if let Some(relay_addr) = Self::craft_relay_address(addr, Some(peer_id)) {
            debug!(%peer_id, %relay_addr, "added relay candidate");
            self.candidates.push_back((peer_id, relay_addr));
        }
    }

    /// Drains candidates into reservation requests until either the
    /// concurrent-connection cap or the candidate pool is exhausted. Meant
    /// to run periodically from the driver's poll loop.
    pub fn try_connecting_to_relay(&mut self, swarm: &mut Swarm<NodeBehaviour>) {
        if !self.enabled || self.connected_relays.len() >= MAX_CONCURRENT_RELAY_CONNECTIONS {
            return;
        }
        let slots = MAX_CONCURRENT_RELAY_CONNECTIONS - self.connected_relays.len();
        let mut made = 0;
        while made < slots {
            let Some((peer_id, relay_addr)) = self.candidates.pop_front() else {
                break;
            };
            if self.connected_relays.contains_key(&peer_id) || self.waiting_for_reservation.contains_key(&peer_id) {
                continue;
            }
            match swarm.listen_on(relay_addr.clone()) {
                Ok(id) => {
                    info!(%peer_id, %relay_addr, "requesting relay reservation");
                    self.waiting_for_reservation.insert(peer_id, relay_addr);
                    self.relayed_listener_id_map.insert(id, peer_id);
                    made += 1;
                }
                Err(err) => warn!(%peer_id, %err, "failed to listen on relay address"),
            }
        }
    }

    pub fn update_on_successful_reservation(&mut self, peer_id: &PeerId, swarm: &mut Swarm<NodeBehaviour>) {
        if let Some(addr) = self.waiting_for_reservation.remove(peer_id) {
            info!(%peer_id, %addr, "relay reservation confirmed");
            swarm.add_external_address(addr.clone());
            self.connected_relays.insert(*peer_id, addr);
        }
    }

    pub fn update_on_listener_closed(&mut self, listener_id: &ListenerId, swarm: &mut Swarm<NodeBehaviour>) {
        let Some(peer_id) = self.relayed_listener_id_map.remove(listener_id) else {
            return;
        };
        if let Some(addr) = self.connected_relays.remove(&peer_id) {
            info!(%peer_id, "relay listener closed, dropping external address");
            swarm.remove_external_address(&addr);
            if let Ok(addr_with_self) = addr.clone().with_p2p(self.self_peer_id) {
                swarm.remove_external_address(&addr_with_self);
            }
        } else {
            self.waiting_for_reservation.remove(&peer_id);
        }
    }

    /// Builds `/ip4/.../udp/.../quic-v1/p2p/<relay>/p2p-circuit`, the
    /// address form a reservation request is dialed on.
    fn craft_relay_address(addr: &Multiaddr, peer_id: Option<PeerId>) -> Option<Multiaddr> {
        let mut out = Multiaddr::empty();
        out.push(addr.iter().find(|p| matches!(p, Protocol::Ip4(_)))?);
        out.push(addr.iter().find(|p| matches!(p, Protocol::Udp(_)))?);
        out.push(Protocol::QuicV1);
        let peer = match peer_id {
            Some(id) => Protocol::P2p(id),
            None => addr.iter().find(|p| matches!(p, Protocol::P2p(_)))?,
        };
        out.push(peer);
        out.push(Protocol::P2pCircuit);
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted_relay_address_has_circuit_suffix() {
        let addr: Multiaddr = "/ip4/203.0.113.7/udp/4001/quic-v1".parse().unwrap();
        let relay = PeerId::random();
        let crafted = RelayManager::craft_relay_address(&addr, Some(relay)).unwrap();
        assert!(crafted.iter().any(|p| p == Protocol::P2pCircuit));
    }

    #[test]
    fn new_manager_is_disabled_by_default() {
        let manager = RelayManager::new(PeerId::random());
        assert!(!manager.is_enabled());
    }
}
