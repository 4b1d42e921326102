// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

//! The combined libp2p `NetworkBehaviour` (§4.2-§4.10): Kademlia for the
//! DHT record layer, identify for address/protocol exchange, relay client
//! and server
//! (the latter `Toggle`d so only nodes that opt in run a relay), ping for
//! liveness, request/response for realm-gated messaging, and DCUtR for
//! hole punching. Gossipsub is `Toggle`d off unless the node joins a
//! realm that uses it for membership sync. `stream` backs the
//! `OpenStream` half of §4.12's messaging shim: a caller-retained duplex
//! that request/response's one-shot semantics can't express.

use libp2p::identify;
use libp2p::kad;
use libp2p::ping;
use libp2p::relay;
use libp2p::request_response;
use libp2p::swarm::behaviour::toggle::Toggle;
use libp2p::swarm::NetworkBehaviour;
use libp2p::{autonat, dcutr, gossipsub, upnp, StreamProtocol};
use std::time::Duration;

use crate::messaging::{Request, Response};

/// The request/response wire version. Bumping this breaks compatibility
/// with every node running an older `dep2p-networking`.
const REQUEST_RESPONSE_PROTOCOL: &str = "/dep2p/req-res/1.0.0";
const REQUEST_TIMEOUT_DEFAULT: Duration = Duration::from_secs(30);

/// Top-level behaviour, scoped to dep2p's component set (no autonomous
/// chunk-replication behaviours, since dep2p has no storage layer).
#[derive(NetworkBehaviour)]
pub struct NodeBehaviour {
    pub kademlia: kad::Behaviour<kad::store::MemoryStore>,
    pub identify: identify::Behaviour,
    pub ping: ping::Behaviour,
    /// STUN-equivalent external-address verification (§4.7): dialed peers
    /// act as probe servers and hand back our observed address, which is
    /// marked verified on arrival per spec rather than waiting on an
    /// explicit dialback.
    pub autonat: autonat::Behaviour,
    /// Port-mapping attempt on startup (§4.7); `Toggle`d off when
    /// `NetworkConfig::enable_upnp` is false.
    pub upnp: Toggle<upnp::tokio::Behaviour>,
    pub relay_client: Toggle<relay::client::Behaviour>,
    pub relay_server: Toggle<relay::Behaviour>,
    pub dcutr: Toggle<dcutr::Behaviour>,
    pub request_response: request_response::cbor::Behaviour<Request, Response>,
    pub gossipsub: Toggle<gossipsub::Behaviour>,
    pub stream: libp2p_stream::Behaviour,
}

/// Builds the request/response behaviour with dep2p's wire protocol
/// string and timeouts.
pub(crate) fn build_request_response(
    support: request_response::ProtocolSupport,
) -> request_response::cbor::Behaviour<Request, Response> {
    let cfg = request_response::Config::default().with_request_timeout(REQUEST_TIMEOUT_DEFAULT);
    request_response::cbor::Behaviour::new(
        [(StreamProtocol::new(REQUEST_RESPONSE_PROTOCOL), support)],
        cfg,
    )
}
