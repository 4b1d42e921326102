// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

use std::fmt;
use std::str::FromStr;

use libp2p::multiaddr::Protocol;
use libp2p::{Multiaddr, PeerId};

use crate::{Error, NodeId, Result};

/// A multiaddr with no `/p2p/<NodeId>` tail. Only meaningful paired with a
/// [`NodeId`] obtained some other way (e.g. from a `Connect(node_id, addrs)`
/// call, or the peer field of a DHT query).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DialAddress(Multiaddr);

/// A multiaddr carrying a `/p2p/<NodeId>` tail: self-sufficient for
/// `Connect`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FullAddress(Multiaddr);

impl DialAddress {
    pub fn new(addr: Multiaddr) -> Self {
        let mut addr = addr;
        // A dial address by definition carries no peer id tail; strip one if
        // present rather than erroring, since callers often build these by
        // popping the tail off a FullAddress.
        while matches!(addr.iter().last(), Some(Protocol::P2p(_))) {
            addr.pop();
        }
        Self(addr)
    }

    pub fn as_multiaddr(&self) -> &Multiaddr {
        &self.0
    }

    pub fn into_multiaddr(self) -> Multiaddr {
        self.0
    }

    /// Appends a `/p2p/<NodeId>` tail, producing a self-sufficient
    /// [`FullAddress`].
    pub fn with_node_id(&self, node_id: NodeId) -> FullAddress {
        let mut addr = self.0.clone();
        addr.push(Protocol::P2p(*node_id.as_peer_id()));
        FullAddress(addr)
    }
}

impl FullAddress {
    /// Parses a string multiaddr, requiring a `/p2p/<NodeId>` tail.
    pub fn parse(s: &str) -> Result<Self> {
        let addr = Multiaddr::from_str(s)?;
        Self::from_multiaddr(addr)
    }

    pub fn from_multiaddr(addr: Multiaddr) -> Result<Self> {
        match addr.iter().last() {
            Some(Protocol::P2p(_)) => Ok(Self(addr)),
            _ => Err(Error::MissingPeerIdTail),
        }
    }

    /// Splits into the dial-only address and the carried [`NodeId`].
    pub fn into_parts(self) -> (DialAddress, NodeId) {
        let mut addr = self.0;
        let Some(Protocol::P2p(peer_id)) = addr.pop() else {
            unreachable!("FullAddress invariant: always has a /p2p tail")
        };
        (DialAddress(addr), NodeId::from_peer_id(peer_id))
    }

    pub fn node_id(&self) -> NodeId {
        let Some(Protocol::P2p(peer_id)) = self.0.iter().last() else {
            unreachable!("FullAddress invariant: always has a /p2p tail")
        };
        NodeId::from_peer_id(peer_id)
    }

    pub fn as_multiaddr(&self) -> &Multiaddr {
        &self.0
    }

    pub fn into_multiaddr(self) -> Multiaddr {
        self.0
    }
}

impl fmt::Display for DialAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Display for FullAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Crafts a `/.../p2p/<relay>/p2p-circuit` address used both to dial a
/// reservation and to advertise a relayed address for a client behind NAT.
///
/// Takes the IP + UDP(+quic-v1) prefix of `addr`, appends the relay's own
/// peer id, then the circuit marker.
pub fn craft_relay_circuit_address(
    relay_addr: &Multiaddr,
    relay_peer_id: PeerId,
) -> Result<Multiaddr> {
    let mut out = Multiaddr::empty();

    let ip = relay_addr
        .iter()
        .find(|p| matches!(p, Protocol::Ip4(_) | Protocol::Ip6(_)))
        .ok_or(Error::CannotCraftRelayAddress)?;
    out.push(ip);

    let port = relay_addr
        .iter()
        .find(|p| matches!(p, Protocol::Udp(_) | Protocol::Tcp(_)))
        .ok_or(Error::CannotCraftRelayAddress)?;
    out.push(port);

    if relay_addr.iter().any(|p| matches!(p, Protocol::QuicV1)) {
        out.push(Protocol::QuicV1);
    }

    out.push(Protocol::P2p(relay_peer_id));
    out.push(Protocol::P2pCircuit);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_node_id() -> NodeId {
        dep2p_identity::KeyPair::generate().node_id()
    }

    #[test]
    fn full_address_round_trips_through_parts() {
        let node_id = sample_node_id();
        let base: Multiaddr = "/ip4/203.0.113.1/udp/4001/quic-v1".parse().unwrap();
        let dial = DialAddress::new(base.clone());
        let full = dial.with_node_id(node_id);

        assert_eq!(full.node_id(), node_id);

        let (dial_back, node_id_back) = full.into_parts();
        assert_eq!(dial_back.as_multiaddr(), &base);
        assert_eq!(node_id_back, node_id);
    }

    #[test]
    fn parse_rejects_address_without_tail() {
        let err = FullAddress::parse("/ip4/203.0.113.1/udp/4001/quic-v1").unwrap_err();
        assert!(matches!(err, Error::MissingPeerIdTail));
    }

    #[test]
    fn parse_then_render_is_identity() {
        let node_id = sample_node_id();
        let s = format!("/ip4/203.0.113.1/udp/4001/quic-v1/p2p/{node_id}");
        let full = FullAddress::parse(&s).expect("parse");
        assert_eq!(full.to_string(), s);
    }

    #[test]
    fn dial_address_strips_existing_tail() {
        let node_id = sample_node_id();
        let s = format!("/ip4/203.0.113.1/udp/4001/quic-v1/p2p/{node_id}");
        let addr: Multiaddr = s.parse().unwrap();
        let dial = DialAddress::new(addr);
        assert!(!dial
            .as_multiaddr()
            .iter()
            .any(|p| matches!(p, Protocol::P2p(_))));
    }
}
