// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

//! Events forwarded by the `SwarmDriver` to upper layers.

use dep2p_identity::NodeId;
use libp2p::Multiaddr;
use tokio::sync::oneshot;

use crate::messaging::{Request, Response};
use crate::Result;

/// Where to send a `Response` once application code has produced one.
pub enum MsgResponder {
    /// The request originated locally (a loopback call); respond via a
    /// one-shot channel instead of a wire write.
    FromSelf(Option<oneshot::Sender<Result<Response>>>),
    /// The request came from a remote peer; respond over the open stream.
    FromPeer(libp2p::request_response::ResponseChannel<Response>),
}

/// Why a connection went away (§4.4). `Graceful` is reserved for QUIC
/// `CONNECTION_CLOSE` frames (high-confidence, feeds Layer 2/3 of
/// disconnect detection directly); `Timeout` is idle-keep-alive expiry
/// (low-confidence, may be a temporary partition); `Local` is this node
/// closing the connection itself; `Error` covers everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Graceful,
    Timeout,
    Error,
    Local,
}

/// Events forwarded by the underlying `SwarmDriver`, for upper layers to
/// react to (e.g. an application dispatching requests to protocol
/// handlers, or a CLI printing connectivity changes).
#[allow(clippy::large_enum_variant)]
pub enum NetworkEvent {
    /// Incoming request from a peer, already admitted by the protocol
    /// router.
    RequestReceived { req: Request, channel: MsgResponder },
    /// A response arrived that nobody was waiting on at the call site.
    ResponseReceived { res: Response },
    /// A transport-level connection to `peer` was established.
    PeerConnected { peer: NodeId, addr: Multiaddr, num_conns: u32 },
    /// A transport-level connection to `peer` ended (Layer 1/2 of
    /// disconnect detection; does not by itself mean realm eviction).
    PeerDisconnected { peer: NodeId, num_conns: u32, reason: DisconnectReason },
    /// `peer` was admitted into the currently joined realm's member set.
    RealmMemberJoined { peer: NodeId },
    /// `peer` was evicted from the currently joined realm's member set.
    RealmMemberLeft { peer: NodeId },
    /// A new listen address became active.
    NewListenAddr(Multiaddr),
    /// AutoNAT's view of our reachability changed.
    NatStatusChanged(dep2p_protocol::Reachability),
}

impl std::fmt::Debug for NetworkEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkEvent::RequestReceived { req, .. } => write!(f, "RequestReceived({req:?})"),
            NetworkEvent::ResponseReceived { res } => write!(f, "ResponseReceived({res:?})"),
            NetworkEvent::PeerConnected { peer, addr, num_conns } => {
                write!(f, "PeerConnected({peer}, {addr}, conns={num_conns})")
            }
            NetworkEvent::PeerDisconnected { peer, num_conns, reason } => {
                write!(f, "PeerDisconnected({peer}, conns={num_conns}, reason={reason:?})")
            }
            NetworkEvent::RealmMemberJoined { peer } => write!(f, "RealmMemberJoined({peer})"),
            NetworkEvent::RealmMemberLeft { peer } => write!(f, "RealmMemberLeft({peer})"),
            NetworkEvent::NewListenAddr(addr) => write!(f, "NewListenAddr({addr})"),
            NetworkEvent::NatStatusChanged(reachability) => write!(f, "NatStatusChanged({reachability:?})"),
        }
    }
}
