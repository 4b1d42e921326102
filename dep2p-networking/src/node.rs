// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

//! [`Node`]: the cloneable handle applications hold. Every call is a
//! message sent across the `SwarmCmd` channel into the `SwarmDriver` event
//! loop that actually owns the `libp2p::Swarm`; `Node` itself owns no
//! socket and can be cloned freely.

use std::sync::Arc;

use dep2p_identity::{KeyPair, NodeId};
use dep2p_protocol::{PeerRecord, RealmId};
use dep2p_realm::{RealmKey, RealmSlot};
use libp2p::{Multiaddr, StreamProtocol};
use tokio::sync::{mpsc, oneshot};

use crate::cmd::SwarmCmd;
use crate::error::{Error, Result};
use crate::events::MsgResponder;
use crate::messaging::{Request, Response};
use crate::protocol_router::ProtocolRouter;

/// The request/response protocol every `Send`/`Request` call rides,
/// carrying its real protocol ID and realm scope inside the `Request`
/// payload rather than as the wire-level multistream-select string (§4.12
/// keeps the messaging shim thin — one wire protocol, many logical ones).
const MSG_PROTOCOL_SUFFIX: &str = "msg/1.0.0";

/// The application-facing handle to a running dep2p node. Cheaply
/// cloneable: every clone shares the same underlying `SwarmDriver` via the
/// command channel.
#[derive(Clone)]
pub struct Node {
    self_node_id: NodeId,
    keypair: KeyPair,
    cmd_sender: mpsc::Sender<SwarmCmd>,
    stream_control: libp2p_stream::Control,
    realm: Arc<RealmSlot>,
}

impl Node {
    pub(crate) fn new(
        self_node_id: NodeId,
        keypair: KeyPair,
        cmd_sender: mpsc::Sender<SwarmCmd>,
        stream_control: libp2p_stream::Control,
        realm: Arc<RealmSlot>,
    ) -> Self {
        Self {
            self_node_id,
            keypair,
            cmd_sender,
            stream_control,
            realm,
        }
    }

    /// This node's self-certifying identifier.
    pub fn node_id(&self) -> NodeId {
        self.self_node_id
    }

    async fn call<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> SwarmCmd) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.cmd_sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "swarm driver gone")))?;
        rx.await.map_err(|_| Error::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "swarm driver dropped response")))
    }

    /// Starts listening on `addr` (§4.2).
    pub async fn start_listening(&self, addr: Multiaddr) -> Result<()> {
        self.call(|sender| SwarmCmd::StartListening { addr, sender }).await?
    }

    /// Connects to `target`, racing every address the Address Book and
    /// `extra_addrs` together supply (§4.4). Resolves once any candidate
    /// succeeds, or `Error::AllCandidatesFailed` once every candidate has
    /// been exhausted.
    pub async fn connect(&self, target: NodeId, extra_addrs: Vec<Multiaddr>) -> Result<()> {
        self.call(|sender| SwarmCmd::Connect { target, addrs: extra_addrs, sender }).await?
    }

    /// Returns this node's currently active listen addresses.
    pub async fn listen_addrs(&self) -> Result<Vec<Multiaddr>> {
        let (tx, rx) = oneshot::channel();
        self.cmd_sender
            .send(SwarmCmd::GetListenAddrs { sender: tx })
            .await
            .map_err(|_| Error::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "swarm driver gone")))?;
        rx.await.map_err(|_| Error::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "swarm driver dropped response")))
    }

    /// Joins `realm_key`'s realm. Fails with `AlreadyInRealm` if this node
    /// already holds one (§4.10) — a node is in at most one realm at a
    /// time, so leave first.
    pub async fn join_realm(&self, realm_key: RealmKey) -> Result<RealmId> {
        self.call(|sender| SwarmCmd::JoinRealm { realm_key, sender }).await?
    }

    /// Leaves the currently-joined realm, broadcasting a graceful
    /// `MemberLeave` first (§4.11 Layer 2, §5 shutdown ordering).
    pub async fn leave_realm(&self) -> Result<()> {
        self.call(|sender| SwarmCmd::LeaveRealm { sender }).await?
    }

    /// The realm this node currently holds, if any.
    pub fn current_realm_id(&self) -> Option<RealmId> {
        self.realm.current_realm_id()
    }

    /// Whether `target` is a verified member of the currently joined
    /// realm. `Err(NotInRealm)` if no realm is joined.
    pub async fn is_realm_member(&self, target: &NodeId) -> Result<bool> {
        Ok(self.realm.is_member(target).await?)
    }

    /// Re-publishes this node's signed `PeerRecord` to the DHT immediately,
    /// instead of waiting for the maintenance tick (§4.9).
    pub async fn publish_peer_record(&self) -> Result<()> {
        self.call(|sender| SwarmCmd::PublishPeerRecord { sender }).await?
    }

    /// Registers `user_protocol` under the currently joined realm's
    /// `/dep2p/app/<realm>/` namespace, returning the fully-qualified wire
    /// protocol ID the caller should advertise (§4.10).
    pub fn register_app_protocol(&self, user_protocol: &str) -> Result<String> {
        ProtocolRouter::new(&self.realm).register_app_protocol(user_protocol)
    }

    /// Checks the §4.12 gate common to `send`/`request`/`open_stream`:
    /// this node must be in a realm, and `target` must already be a
    /// verified member of it.
    async fn check_membership_gate(&self, target: &NodeId) -> Result<RealmId> {
        let realm_id = self.realm.current_realm_id().ok_or(dep2p_realm::Error::NotInRealm)?;
        if !self.realm.is_member(target).await? {
            return Err(Error::NotMember);
        }
        Ok(realm_id)
    }

    /// One-shot send (§4.12): fire `payload` at `target` over
    /// `user_protocol`, no response expected. Gated on realm membership.
    pub async fn send(&self, target: NodeId, user_protocol: &str, payload: Vec<u8>) -> Result<()> {
        self.check_membership_gate(&target).await?;
        let protocol = self.register_app_protocol(user_protocol)?;
        self.call(|sender| SwarmCmd::Send { target, protocol, payload, sender }).await?
    }

    /// Request/response (§4.12): send `payload` to `target` over
    /// `user_protocol`, await the reply. Gated on realm membership.
    pub async fn request(&self, target: NodeId, user_protocol: &str, payload: Vec<u8>) -> Result<Response> {
        self.check_membership_gate(&target).await?;
        let protocol = self.register_app_protocol(user_protocol)?;
        self.call(|sender| SwarmCmd::Request { target, protocol, payload, sender }).await?
    }

    /// Answers an inbound request received via `NetworkEvent::RequestReceived`
    /// (§4.12). `channel` must be the value handed out with that event.
    pub async fn respond(&self, channel: MsgResponder, response: Response) -> Result<()> {
        match channel {
            MsgResponder::FromSelf(sender) => {
                if let Some(sender) = sender {
                    let _ = sender.send(Ok(response));
                }
                Ok(())
            }
            MsgResponder::FromPeer(channel) => self
                .cmd_sender
                .send(SwarmCmd::Respond { channel, response })
                .await
                .map_err(|_| Error::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "swarm driver gone"))),
        }
    }

    /// DHT lookup (§4.9 Get): fetches the signed `PeerRecord` published for
    /// `target` under the currently joined realm (or the global key if none
    /// is joined).
    pub async fn find_peer_record(&self, target: NodeId) -> Result<PeerRecord> {
        self.call(|sender| SwarmCmd::FindPeerRecord { target, sender }).await?
    }

    /// Opens a caller-retained duplex stream to `target` over
    /// `user_protocol` (§4.12's `OpenStream`), gated on realm membership
    /// the same as `send`/`request`.
    pub async fn open_stream(
        &mut self,
        target: NodeId,
        user_protocol: &str,
    ) -> Result<libp2p_stream::Stream> {
        self.check_membership_gate(&target).await?;
        let protocol = self.register_app_protocol(user_protocol)?;
        let stream_protocol = StreamProtocol::try_from_owned(protocol)
            .map_err(|_| Error::ReservedProtocol(user_protocol.to_string()))?;
        self.stream_control
            .open_stream(target.into(), stream_protocol)
            .await
            .map_err(|_| Error::NotReachable(target))
    }

    /// Cooperative shutdown (§5): leave the realm (broadcasting
    /// `MemberLeave` and waiting the 50ms settle window), then signal the
    /// driver to close every connection and stop.
    pub async fn stop(&self) -> Result<()> {
        if self.realm.current_realm_id().is_some() {
            let _ = self.leave_realm().await;
        }
        self.cmd_sender
            .send(SwarmCmd::Shutdown)
            .await
            .map_err(|_| Error::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "swarm driver already gone")))
    }

    /// Exposes the identity keypair for callers that need to sign
    /// application-level payloads with the same key the network layer
    /// uses (e.g. a realm auth handshake built on top of this crate).
    pub fn keypair(&self) -> &KeyPair {
        &self.keypair
    }
}
