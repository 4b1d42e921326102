// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

use dep2p_identity::NodeId;
use libp2p::swarm::DialError;
use libp2p::TransportError;

/// The closed error taxonomy of §7: each variant names a distinguishable
/// failure mode rather than wrapping a library type directly, so callers can
/// match on intent instead of implementation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("identity error: {0}")]
    Identity(#[from] dep2p_identity::Error),

    #[error("socket bind failed: {0}")]
    SocketBind(#[source] std::io::Error),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError<std::io::Error>),

    #[error("security negotiation failed")]
    SecurityNegotiation,
    #[error("muxer negotiation failed")]
    MuxerNegotiation,
    #[error("handshake failed")]
    HandshakeFailed,
    #[error("remote presented a public key that does not hash to the expected NodeID")]
    PeerMismatch,
    #[error("outbound dial requires a pre-declared NodeID")]
    NoPeerId,

    #[error("all dial candidates failed")]
    AllCandidatesFailed { attempts: usize },
    #[error("dial error: {0}")]
    Dial(#[from] DialError),
    #[error("no publishable address known for {0}")]
    NotReachable(NodeId),
    #[error("no peer record found in the DHT for {0}")]
    RecordNotFound(NodeId),

    #[error("registering protocol with reserved prefix {0:?}")]
    ReservedProtocol(String),
    #[error("remote is not a verified member of the target realm")]
    NotMember,
    #[error("protocol belongs to a different realm than the one currently joined")]
    CrossRealmProtocol,

    #[error(transparent)]
    Realm(#[from] dep2p_realm::Error),

    #[error("relay reservation slots exhausted")]
    ResourceExhausted,
    #[error("relay does not forward protocol {0:?}")]
    ProtocolNotWhitelisted(String),

    #[error("bootstrap cache error: {0}")]
    BootstrapCache(#[from] dep2p_bootstrap_cache::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
