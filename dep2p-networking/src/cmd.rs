// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

//! Commands sent from a [`crate::Node`] handle into the [`crate::SwarmDriver`]
//! event loop.

use dep2p_identity::NodeId;
use dep2p_realm::RealmKey;
use dep2p_protocol::{PeerRecord, RealmId};
use libp2p::request_response::ResponseChannel;
use libp2p::swarm::dial_opts::DialOpts;
use libp2p::Multiaddr;
use tokio::sync::oneshot;

use crate::error::Result;
use crate::messaging::{Request, Response};

#[allow(clippy::large_enum_variant)]
pub enum SwarmCmd {
    /// Starts listening on `addr`.
    StartListening {
        addr: Multiaddr,
        sender: oneshot::Sender<Result<()>>,
    },
    /// Connects to `target`, racing `addrs` plus whatever the Address Book
    /// already knows (spec §4.4). Resolves once any connection succeeds, or
    /// once every candidate has failed (`AllCandidatesFailed`).
    Connect {
        target: NodeId,
        addrs: Vec<Multiaddr>,
        sender: oneshot::Sender<Result<()>>,
    },
    DialWithOpts {
        opts: DialOpts,
        sender: oneshot::Sender<Result<()>>,
    },
    /// One-shot send (§4.12): fire the bytes at `target` over the realm's
    /// messaging protocol, no response expected.
    Send {
        target: NodeId,
        protocol: String,
        payload: Vec<u8>,
        sender: oneshot::Sender<Result<()>>,
    },
    /// Request/response (§4.12): send bytes, await the reply.
    Request {
        target: NodeId,
        protocol: String,
        payload: Vec<u8>,
        sender: oneshot::Sender<Result<Response>>,
    },
    /// Joins `realm_key`'s realm. Fails with `Error::Realm(AlreadyInRealm)`
    /// if already joined.
    JoinRealm {
        realm_key: RealmKey,
        sender: oneshot::Sender<Result<RealmId>>,
    },
    /// Leaves the current realm, broadcasting a graceful `MemberLeave`
    /// first (§4.11 Layer 2).
    LeaveRealm {
        sender: oneshot::Sender<Result<()>>,
    },
    /// Publishes this node's signed `PeerRecord` to the DHT under the
    /// currently-joined realm (or the global key if `None`).
    PublishPeerRecord {
        sender: oneshot::Sender<Result<()>>,
    },
    /// Returns this node's currently active listen addresses.
    GetListenAddrs {
        sender: oneshot::Sender<Vec<Multiaddr>>,
    },
    /// Answers an inbound request admitted via `NetworkEvent::RequestReceived`
    /// (§4.12): the reply is written back over `channel`, the only handle
    /// capable of completing a `request_response::ResponseChannel`.
    Respond {
        channel: ResponseChannel<Response>,
        response: Response,
    },
    /// DHT lookup (§4.9 Get): fetches the signed `PeerRecord` published for
    /// `target` under the currently joined realm (or the global key if no
    /// realm is joined).
    FindPeerRecord {
        target: NodeId,
        sender: oneshot::Sender<Result<PeerRecord>>,
    },
    /// Cleanly shuts the driver loop down: propagates cancellation and
    /// returns once every long-running task it owns has stopped.
    Shutdown,
}
