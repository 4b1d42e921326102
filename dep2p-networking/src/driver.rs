// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

//! `SwarmDriver` and `NetworkBuilder`: the event loop that owns
//! `libp2p::Swarm<NodeBehaviour>` and every component that must observe its
//! events (Address Book, Connection Manager, Disconnect Tracker, Relay
//! Manager, Peer Record Store), driven by a `tokio::select!` over swarm
//! events, inbound `SwarmCmd`s, and a handful of periodic ticks.

use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use futures::StreamExt;
use libp2p::core::transport::ListenerId;
use libp2p::kad::{self, QueryResult};
use libp2p::multiaddr::Protocol;
use libp2p::swarm::dial_opts::DialOpts;
use libp2p::swarm::SwarmEvent;
use libp2p::{dcutr, gossipsub, identify, ping, relay, request_response};
use libp2p::{Multiaddr, PeerId, StreamProtocol, Swarm};
use rand::RngCore;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use dep2p_bootstrap_cache::{BootstrapCacheStore, CacheConfig};
use dep2p_identity::{KeyPair, NodeId};
use dep2p_protocol::{
    member_sync_topic, peer_record_key, DetectionMethod, LeaveReason, MemberLeave, NatClass,
    PeerRecord, Reachability, RealmId, WitnessConfirmation, WitnessReport,
};
use dep2p_realm::{RealmEvent, RealmKey, RealmSlot};

use crate::address_book::AddressBook;
use crate::behaviour::{build_request_response, NodeBehaviour, NodeBehaviourEvent};
use crate::cmd::SwarmCmd;
use crate::config::NetworkConfig;
use crate::connection_manager::ConnectionManager;
use crate::dht::PeerRecordStore;
use crate::disconnect::DisconnectTracker;
use crate::error::{Error, Result};
use crate::events::{DisconnectReason, MsgResponder, NetworkEvent};
use crate::messaging::{Request, Response};
use crate::node::Node;
use crate::protocol_router::ProtocolRouter;
use crate::relay::{RelayAnomalyTracker, RelayManager};
use crate::transport;

/// Bound on the command/event channels — generous enough that a momentary
/// backlog from a slow consumer doesn't stall the swarm loop.
const NETWORKING_CHANNEL_SIZE: usize = 10_000;

/// How often the driver checks whether any held `PeerRecord` needs
/// republishing, and re-syncs the bootstrap cache to disk.
const MAINTENANCE_TICK: Duration = Duration::from_secs(5 * 60);
/// How often relay candidate reservations are attempted and grace/flap
/// state is swept for peers with a disconnect already pending.
const FAST_TICK: Duration = Duration::from_secs(5);

/// Three consecutive ping failures close the connection (§4.11 Layer 4).
const LIVENESS_FAILURE_THRESHOLD: u32 = 3;

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Strips a trailing `/p2p/<peer>` suffix: `Swarm::dial` wants the peer id
/// supplied separately via `DialOpts`, not embedded in the address.
fn multiaddr_pop_p2p(mut addr: Multiaddr) -> (Multiaddr, Option<PeerId>) {
    if let Some(Protocol::P2p(peer_id)) = addr.iter().last() {
        addr.pop();
        (addr, Some(peer_id))
    } else {
        (addr, None)
    }
}

/// One outbound dial race in flight for `connect()` (§4.4): every losing
/// candidate is allowed to keep dialing in the background (libp2p cancels
/// nothing for us), but only the first success — or total exhaustion —
/// resolves the caller's oneshot.
struct PendingConnect {
    attempts_remaining: usize,
    sender: Option<oneshot::Sender<Result<()>>>,
}

/// Builds a [`SwarmDriver`] and its paired [`Node`] handle.
pub struct NetworkBuilder {
    keypair: KeyPair,
    config: NetworkConfig,
}

impl NetworkBuilder {
    pub fn new(keypair: KeyPair, config: NetworkConfig) -> Self {
        Self { keypair, config }
    }

    /// Assembles the transport, the combined behaviour, the swarm, and
    /// every auxiliary component the driver owns, then returns the `Node`
    /// handle callers drive the network with, the `NetworkEvent` stream,
    /// and the `SwarmDriver` itself (the caller is expected to
    /// `tokio::spawn(driver.run())`).
    pub async fn build(self) -> Result<(Node, mpsc::Receiver<NetworkEvent>, SwarmDriver)> {
        let libp2p_keypair = self.keypair.as_libp2p_keypair().clone();
        let local_peer_id = libp2p_keypair.public().to_peer_id();
        let self_node_id = NodeId::from_peer_id(local_peer_id);

        let transport = transport::build_transport(&libp2p_keypair, self.config.quic_regime);

        let (relay_transport, relay_client_behaviour) = relay::client::new(local_peer_id);
        let transport = {
            use libp2p::core::muxing::StreamMuxerBox;
            use libp2p::core::transport::Boxed;
            use libp2p::Transport as _;
            let relay_transport = relay_transport
                .map(|(peer_id, conn), _| (peer_id, StreamMuxerBox::new(conn)));
            let combined: Boxed<(PeerId, StreamMuxerBox)> =
                transport.or_transport(relay_transport).map(|either, _| either.into_inner()).boxed();
            combined
        };

        let store = kad::store::MemoryStore::new(local_peer_id);
        let mut kad_config = kad::Config::default();
        kad_config.set_query_timeout(Duration::from_secs(25));
        let kademlia = kad::Behaviour::with_config(local_peer_id, store, kad_config);

        let identify = identify::Behaviour::new(
            identify::Config::new("/dep2p/sys/identify/1.0.0".to_string(), libp2p_keypair.public())
                .with_push_listen_addr_updates(true),
        );
        let ping = ping::Behaviour::new(ping::Config::new().with_interval(Duration::from_secs(30)).with_timeout(Duration::from_secs(5)));

        let relay_server = if self.config.enable_relay_server {
            Some(relay::Behaviour::new(local_peer_id, relay::Config::default()))
        } else {
            None
        };
        let dcutr = Some(dcutr::Behaviour::new(local_peer_id));

        // STUN-equivalent candidate discovery (§4.7): dialed peers double as
        // probe servers, with a `use_connected: true` client posture. A relay
        // server (`enable_relay_server`) runs in server mode instead — it
        // never probes, only answers.
        let autonat_config = if self.config.enable_relay_server {
            libp2p::autonat::Config {
                use_connected: false,
                boot_delay: Duration::MAX / 10,
                ..Default::default()
            }
        } else {
            libp2p::autonat::Config {
                use_connected: true,
                boot_delay: Duration::from_secs(3),
                retry_interval: Duration::from_secs(10),
                ..Default::default()
            }
        };
        let autonat = libp2p::autonat::Behaviour::new(local_peer_id, autonat_config);
        let upnp = self
            .config
            .enable_upnp
            .then(libp2p::upnp::tokio::Behaviour::default)
            .into();

        let request_response = build_request_response(request_response::ProtocolSupport::Full);

        let gossipsub_behaviour = gossipsub::Behaviour::new(
            gossipsub::MessageAuthenticity::Signed(libp2p_keypair.clone()),
            gossipsub::ConfigBuilder::default()
                .heartbeat_interval(Duration::from_secs(1))
                .build()
                .map_err(|_| Error::SecurityNegotiation)?,
        )
        .map_err(|_| Error::SecurityNegotiation)?;

        let stream_behaviour = libp2p_stream::Behaviour::new();
        let stream_control = stream_behaviour.new_control();

        let behaviour = NodeBehaviour {
            kademlia,
            identify,
            ping,
            autonat,
            upnp,
            relay_client: Some(relay_client_behaviour).into(),
            relay_server: relay_server.into(),
            dcutr: dcutr.into(),
            request_response,
            gossipsub: Some(gossipsub_behaviour).into(),
            stream: stream_behaviour,
        };

        let swarm_config = libp2p::swarm::Config::with_tokio_executor()
            .with_idle_connection_timeout(self.config.quic_regime.idle_timeout());
        let mut swarm = Swarm::new(transport, behaviour, local_peer_id, swarm_config);

        for addr in &self.config.listen_addrs {
            swarm.listen_on(addr.clone()).map_err(Error::from)?;
        }
        for addr in &self.config.bootstrap_peers {
            let (addr, peer_id) = multiaddr_pop_p2p(addr.clone());
            let opts = match peer_id {
                Some(peer_id) => DialOpts::peer_id(peer_id).addresses(vec![addr]).build(),
                None => DialOpts::unknown_peer_id().address(addr).build(),
            };
            let _ = swarm.dial(opts);
        }

        let realm_label = self
            .config
            .realm_key_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "global".to_string());
        let cache_config = CacheConfig::default_config(&realm_label)
            .unwrap_or_else(|_| CacheConfig::empty().with_cache_path(self.config.data_dir.join("bootstrap_cache.json")))
            .with_max_addrs(1500);
        let bootstrap_cache = BootstrapCacheStore::new(cache_config).await?;
        for cached in bootstrap_cache.get_reliable_addrs() {
            if let Ok(peer_id) = cached.node_id_str().parse::<PeerId>() {
                swarm.behaviour_mut().kademlia.add_address(&peer_id, cached.addr().clone());
            }
        }

        let realm = std::sync::Arc::new(RealmSlot::new(self_node_id));
        let realm_events = realm.subscribe();

        let (cmd_sender, cmd_receiver) = mpsc::channel(NETWORKING_CHANNEL_SIZE);
        let (event_sender, event_receiver) = mpsc::channel(NETWORKING_CHANNEL_SIZE);
        let driver_cmd_sender = cmd_sender.clone();

        let node = Node::new(
            self_node_id,
            self.keypair.clone(),
            cmd_sender,
            stream_control,
            realm.clone(),
        );

        let driver = SwarmDriver {
            swarm,
            self_node_id,
            keypair: self.keypair,
            config: self.config,
            realm,
            realm_events,
            address_book: AddressBook::new(),
            connection_manager: ConnectionManager::new(self.config_low_water(), self.config_high_water(), self.config_grace_period()),
            disconnect_tracker: DisconnectTracker::new(),
            peer_record_store: PeerRecordStore::new(),
            relay_manager: RelayManager::new(local_peer_id),
            relay_anomaly: RelayAnomalyTracker::new(),
            bootstrap_cache,
            cmd_sender: driver_cmd_sender,
            cmd_receiver,
            event_sender,
            connected_peers: Default::default(),
            ping_failures: HashMap::new(),
            pending_connects: HashMap::new(),
            pending_requests: HashMap::new(),
            pending_get_records: HashMap::new(),
            peer_record_seq: 0,
            cancellation: CancellationToken::new(),
        };

        Ok((node, event_receiver, driver))
    }

    fn config_low_water(&self) -> usize {
        self.config.low_water
    }

    fn config_high_water(&self) -> usize {
        self.config.high_water
    }

    fn config_grace_period(&self) -> Duration {
        self.config.connection_grace_period
    }
}

/// The event loop: owns the swarm and every component that reacts to it,
/// consumes `SwarmCmd`s from the paired `Node` handle, and republishes
/// `NetworkEvent`s upstream.
pub struct SwarmDriver {
    swarm: Swarm<NodeBehaviour>,
    self_node_id: NodeId,
    keypair: KeyPair,
    config: NetworkConfig,
    realm: std::sync::Arc<RealmSlot>,
    realm_events: tokio::sync::broadcast::Receiver<RealmEvent>,
    address_book: AddressBook,
    connection_manager: ConnectionManager,
    disconnect_tracker: DisconnectTracker,
    peer_record_store: PeerRecordStore,
    relay_manager: RelayManager,
    relay_anomaly: RelayAnomalyTracker,
    bootstrap_cache: BootstrapCacheStore,
    cmd_sender: mpsc::Sender<SwarmCmd>,
    cmd_receiver: mpsc::Receiver<SwarmCmd>,
    event_sender: mpsc::Sender<NetworkEvent>,
    connected_peers: std::collections::HashSet<PeerId>,
    ping_failures: HashMap<PeerId, u32>,
    pending_connects: HashMap<PeerId, Vec<PendingConnect>>,
    pending_requests: HashMap<request_response::OutboundRequestId, oneshot::Sender<Result<Response>>>,
    pending_get_records: HashMap<kad::QueryId, (NodeId, oneshot::Sender<Result<PeerRecord>>)>,
    peer_record_seq: u64,
    cancellation: CancellationToken,
}

impl SwarmDriver {
    /// Drives the swarm until cancelled or every caller has dropped its
    /// `Node`/event-receiver handles: swarm events first, then commands,
    /// then the periodic maintenance ticks.
    pub async fn run(mut self) {
        let mut maintenance_interval = tokio::time::interval(MAINTENANCE_TICK);
        let mut fast_interval = tokio::time::interval(FAST_TICK);

        loop {
            tokio::select! {
                biased;

                () = self.cancellation.cancelled() => {
                    info!("swarm driver cancelled, shutting down");
                    break;
                }
                swarm_event = self.swarm.select_next_some() => {
                    self.handle_swarm_event(swarm_event);
                }
                cmd = self.cmd_receiver.recv() => {
                    match cmd {
                        Some(SwarmCmd::Shutdown) | None => {
                            info!("swarm driver received shutdown, stopping");
                            break;
                        }
                        Some(cmd) => self.handle_cmd(cmd).await,
                    }
                }
                realm_event = self.realm_events.recv() => {
                    if let Ok(event) = realm_event {
                        self.handle_realm_event(event);
                    }
                }
                _ = fast_interval.tick() => {
                    self.relay_manager.try_connecting_to_relay(&mut self.swarm);
                    self.sweep_disconnect_grace();
                }
                _ = maintenance_interval.tick() => {
                    self.maybe_republish_peer_record().await;
                    self.address_book.cleanup_expired_all().await;
                    let _ = self.bootstrap_cache.sync_and_save_to_disk(true).await;
                }
            }
        }
    }

    fn send_event(&self, event: NetworkEvent) {
        let sender = self.event_sender.clone();
        tokio::spawn(async move {
            if sender.capacity() == 0 {
                warn!("network event channel is at capacity, upstream consumer may be stalled");
            }
            let _ = sender.send(event).await;
        });
    }

    // ---- dialing -----------------------------------------------------

    fn dial(&mut self, addr: Multiaddr) -> Result<()> {
        let (addr, peer_id) = multiaddr_pop_p2p(addr);
        let opts = match peer_id {
            Some(peer_id) => DialOpts::peer_id(peer_id).addresses(vec![addr]).build(),
            None => DialOpts::unknown_peer_id().address(addr).build(),
        };
        self.dial_with_opts(opts)
    }

    fn dial_with_opts(&mut self, opts: DialOpts) -> Result<()> {
        self.swarm.dial(opts).map_err(Error::from)
    }

    /// Races every known address for `target` (§4.4): addresses already
    /// in the Address Book plus whatever the caller supplied. If a live
    /// connection already exists, resolves immediately; otherwise dials
    /// every candidate and resolves the caller's oneshot on the first
    /// success, or `AllCandidatesFailed` once every attempt has failed.
    async fn connect(&mut self, target: NodeId, extra_addrs: Vec<Multiaddr>, sender: oneshot::Sender<Result<()>>) {
        let peer_id: PeerId = target.into();
        if self.connected_peers.contains(&peer_id) {
            let _ = sender.send(Ok(()));
            return;
        }

        let mut candidates: Vec<Multiaddr> =
            self.address_book.addrs_for(target).await.into_iter().map(|r| r.addr().clone()).collect();
        candidates.extend(extra_addrs);
        candidates.dedup();

        if candidates.is_empty() {
            candidates = self.resolve_via_dht(target).await;
        }

        if candidates.is_empty() {
            let _ = sender.send(Err(Error::NotReachable(target)));
            return;
        }

        let attempts = candidates.len();
        self.pending_connects.entry(peer_id).or_default().push(PendingConnect {
            attempts_remaining: attempts,
            sender: Some(sender),
        });

        for addr in candidates {
            let opts = DialOpts::peer_id(peer_id).addresses(vec![addr]).build();
            if self.dial_with_opts(opts).is_err() {
                self.note_dial_attempt_finished(peer_id, false);
            }
        }
    }

    /// Resolves one attempt against every in-flight `connect()` call for
    /// `peer_id`. On success every pending caller is released at once (no
    /// need to keep racing once we're connected); on failure a call is
    /// only resolved once its own attempt budget is exhausted.
    fn note_dial_attempt_finished(&mut self, peer_id: PeerId, succeeded: bool) {
        let Some(pendings) = self.pending_connects.get_mut(&peer_id) else {
            return;
        };
        if succeeded {
            for pending in pendings.iter_mut() {
                if let Some(sender) = pending.sender.take() {
                    let _ = sender.send(Ok(()));
                }
            }
            self.pending_connects.remove(&peer_id);
            return;
        }
        let mut finished = Vec::new();
        for pending in pendings.iter_mut() {
            pending.attempts_remaining = pending.attempts_remaining.saturating_sub(1);
            if pending.attempts_remaining == 0 {
                if let Some(sender) = pending.sender.take() {
                    let _ = sender.send(Err(Error::AllCandidatesFailed { attempts: 0 }));
                }
                finished.push(true);
            } else {
                finished.push(false);
            }
        }
        pendings.retain(|p| p.sender.is_some());
        if pendings.is_empty() {
            self.pending_connects.remove(&peer_id);
        }
    }

    // ---- swarm events --------------------------------------------------

    fn handle_swarm_event(&mut self, event: SwarmEvent<NodeBehaviourEvent>) {
        match event {
            SwarmEvent::Behaviour(event) => self.handle_behaviour_event(event),
            SwarmEvent::ConnectionEstablished { peer_id, num_established, endpoint, .. } => {
                self.connected_peers.insert(peer_id);
                self.connection_manager.on_connected(peer_id.into());
                self.relay_manager.try_connecting_to_relay(&mut self.swarm);
                self.note_dial_attempt_finished(peer_id, true);
                self.send_event(NetworkEvent::PeerConnected {
                    peer: peer_id.into(),
                    addr: endpoint.get_remote_address().clone(),
                    num_conns: num_established.get(),
                });
                self.trim_connections();
            }
            SwarmEvent::ConnectionClosed { peer_id, num_established, cause, .. } => {
                self.connected_peers.remove(&peer_id);
                self.connection_manager.on_disconnected(&peer_id.into());
                self.ping_failures.remove(&peer_id);
                let reason = classify_close_reason(&cause);
                if self.relay_anomaly.record_disconnect(peer_id.into(), Instant::now()) {
                    debug!(%peer_id, "relay anomaly threshold tripped, suppressing further forwarding");
                }
                self.send_event(NetworkEvent::PeerDisconnected {
                    peer: peer_id.into(),
                    num_conns: num_established,
                    reason,
                });
            }
            SwarmEvent::OutgoingConnectionError { peer_id: Some(peer_id), .. } => {
                self.note_dial_attempt_finished(peer_id, false);
            }
            SwarmEvent::NewListenAddr { address, .. } => {
                self.send_event(NetworkEvent::NewListenAddr(address));
            }
            SwarmEvent::ListenerClosed { listener_id, .. } => {
                self.relay_manager.update_on_listener_closed(&listener_id, &mut self.swarm);
            }
            other => trace!(?other, "unhandled swarm event"),
        }
    }

    fn handle_behaviour_event(&mut self, event: NodeBehaviourEvent) {
        match event {
            NodeBehaviourEvent::Kademlia(event) => self.handle_kad_event(event),
            NodeBehaviourEvent::Identify(event) => self.handle_identify_event(event),
            NodeBehaviourEvent::Ping(event) => self.handle_ping_event(event),
            NodeBehaviourEvent::Autonat(event) => self.handle_autonat_event(event),
            NodeBehaviourEvent::Upnp(event) => self.handle_upnp_event(event),
            NodeBehaviourEvent::RelayClient(event) => self.handle_relay_client_event(event),
            NodeBehaviourEvent::RelayServer(event) => self.handle_relay_server_event(event),
            NodeBehaviourEvent::Dcutr(event) => trace!(?event, "dcutr event"),
            NodeBehaviourEvent::RequestResponse(event) => self.handle_request_response_event(event),
            NodeBehaviourEvent::Gossipsub(event) => self.handle_gossipsub_event(event),
            NodeBehaviourEvent::Stream(never) => void::unreachable(never),
        }
    }

    fn handle_kad_event(&mut self, event: kad::Event) {
        match event {
            kad::Event::OutboundQueryProgressed { id, result: QueryResult::GetRecord(result), .. } => {
                self.handle_get_record_progress(id, result);
            }
            kad::Event::OutboundQueryProgressed { result: QueryResult::PutRecord(Err(err)), .. } => {
                warn!(?err, "kademlia put_record failed");
            }
            kad::Event::RoutingUpdated { peer, addresses, .. } => {
                trace!(%peer, ?addresses, "kademlia routing table updated");
            }
            other => trace!(?other, "kademlia event"),
        }
    }

    /// Resolves whichever `FindPeerRecord` caller is waiting on `id`
    /// (§4.9's Get operation): a `FoundRecord` both feeds the peer record
    /// store (same as the old passive handler) and answers the caller;
    /// `FinishedWithNoAdditionalRecord`/an error answers with
    /// `Error::RecordNotFound`.
    fn handle_get_record_progress(&mut self, id: kad::QueryId, result: Result<kad::GetRecordOk, kad::GetRecordError>) {
        match result {
            Ok(kad::GetRecordOk::FoundRecord(peer_record)) => {
                let Ok(record) = PeerRecord::from_msgpack(&peer_record.record.value) else {
                    return;
                };
                let store = &self.peer_record_store;
                let record_clone = record.clone();
                tokio::task::block_in_place(|| {
                    tokio::runtime::Handle::current().block_on(async {
                        let _ = store.put(record_clone).await;
                    });
                });
                if let Some((_, sender)) = self.pending_get_records.remove(&id) {
                    let _ = sender.send(Ok(record));
                }
            }
            Ok(kad::GetRecordOk::FinishedWithNoAdditionalRecord { .. }) => {
                if let Some((target, sender)) = self.pending_get_records.remove(&id) {
                    let _ = sender.send(Err(Error::RecordNotFound(target)));
                }
            }
            Err(err) => {
                if let Some((target, sender)) = self.pending_get_records.remove(&id) {
                    let _ = sender.send(Err(Error::RecordNotFound(target)));
                }
                debug!(?err, "kademlia get_record failed");
            }
        }
    }

    /// Issues the DHT lookup backing both `Node::find_peer_record` and
    /// `connect()`'s dial-resolution fallback (§4.4/§4.9).
    fn find_peer_record(&mut self, target: NodeId, sender: oneshot::Sender<Result<PeerRecord>>) {
        let key = match self.realm.current_realm_id() {
            Some(realm_id) => peer_record_key(realm_id, target),
            None => dep2p_protocol::global_node_key(target),
        };
        let query_id = self.swarm.behaviour_mut().kademlia.get_record(kad::RecordKey::from(key));
        self.pending_get_records.insert(query_id, (target, sender));
    }

    /// Consults the DHT for `target`'s `PeerRecord` when the Address Book
    /// has no candidates of its own (§4.4), returning every direct/relay
    /// address it carries.
    async fn resolve_via_dht(&mut self, target: NodeId) -> Vec<Multiaddr> {
        let (tx, rx) = oneshot::channel();
        self.find_peer_record(target, tx);
        match rx.await {
            Ok(Ok(record)) => record.direct_addrs().iter().chain(record.relay_addrs()).cloned().collect(),
            _ => Vec::new(),
        }
    }

    fn handle_identify_event(&mut self, event: identify::Event) {
        if let identify::Event::Received { peer_id, info, .. } = event {
            let node_id = NodeId::from_peer_id(peer_id);
            let addrs: std::collections::HashSet<Multiaddr> = info.listen_addrs.into_iter().collect();
            for addr in &addrs {
                self.swarm.behaviour_mut().kademlia.add_address(&peer_id, addr.clone());
                let record = dep2p_protocol::AddressRecord::new(node_id, addr.clone(), dep2p_protocol::AddressSource::Dht);
                let book = &self.address_book;
                let record_clone = record.clone();
                tokio::task::block_in_place(|| {
                    tokio::runtime::Handle::current().block_on(book.add_addr(record_clone));
                });
            }
            self.relay_manager.add_potential_candidate(peer_id, &addrs, &info.protocols);
        }
    }

    /// Layer 4 of disconnect detection: three consecutive ping failures
    /// close the connection outright (§4.11).
    fn handle_ping_event(&mut self, event: ping::Event) {
        match event.result {
            Ok(_) => {
                self.ping_failures.remove(&event.peer);
            }
            Err(failure) => {
                let count = self.ping_failures.entry(event.peer).or_insert(0);
                *count += 1;
                debug!(peer = %event.peer, %failure, count = *count, "ping failure");
                if *count >= LIVENESS_FAILURE_THRESHOLD {
                    warn!(peer = %event.peer, "liveness threshold exceeded, closing connection");
                    let _ = self.swarm.disconnect_peer_id(event.peer);
                    self.ping_failures.remove(&event.peer);
                }
            }
        }
    }

    /// STUN-equivalent verification (§4.7): a `Confirmed` status means at
    /// least one dialed peer echoed back an external address we can dial
    /// from, which is marked verified immediately rather than waiting on a
    /// separate dialback round. A `Private` conclusion means this node
    /// sits behind a NAT no direct dial can traverse, so the relay client
    /// is switched on to fall back to circuits (§4.8).
    fn handle_autonat_event(&mut self, event: libp2p::autonat::Event) {
        if let libp2p::autonat::Event::StatusChanged { new, .. } = event {
            let reachability = match new {
                libp2p::autonat::NatStatus::Public(addr) => {
                    let record = crate::nat::record_from_stun_observation(self.self_node_id, addr);
                    let book = &self.address_book;
                    let record_clone = record.clone();
                    tokio::task::block_in_place(|| {
                        tokio::runtime::Handle::current().block_on(book.add_addr(record_clone));
                    });
                    self.relay_manager.enable(false);
                    dep2p_protocol::Reachability::DirectlyReachable
                }
                libp2p::autonat::NatStatus::Private => {
                    self.relay_manager.enable(true);
                    dep2p_protocol::Reachability::RequiresTraversal
                }
                libp2p::autonat::NatStatus::Unknown => dep2p_protocol::Reachability::Unknown,
            };
            self.send_event(NetworkEvent::NatStatusChanged(reachability));
        }
    }

    /// UPnP/NAT-PMP port mapping (§4.7): a successful mapping is as strong
    /// a verification signal as a dialback, so it goes straight into the
    /// Address Book at `verified-direct` priority.
    fn handle_upnp_event(&mut self, event: libp2p::upnp::Event) {
        match event {
            libp2p::upnp::Event::NewExternalAddr(addr) => {
                let record = crate::nat::record_from_upnp_mapping(self.self_node_id, addr);
                let book = &self.address_book;
                let record_clone = record.clone();
                tokio::task::block_in_place(|| {
                    tokio::runtime::Handle::current().block_on(book.add_addr(record_clone));
                });
            }
            libp2p::upnp::Event::GatewayNotFound | libp2p::upnp::Event::NonRoutableGateway => {
                debug!("UPnP port mapping unavailable, relying on STUN/relay fallback");
            }
            libp2p::upnp::Event::ExpiredExternalAddr(_) => {}
        }
    }

    fn handle_relay_client_event(&mut self, event: relay::client::Event) {
        match event {
            relay::client::Event::ReservationReqAccepted { relay_peer_id, .. } => {
                self.relay_manager.update_on_successful_reservation(&relay_peer_id, &mut self.swarm);
            }
            other => trace!(?other, "relay client event"),
        }
    }

    /// Server-side relay events (§4.8/§1): when a relayed client's circuit
    /// goes away, the relay is the only party that directly observed it, so
    /// it witnesses the disconnect on the client's behalf — naming the
    /// disconnected peer unreachable via a `DetectionMethod::RelayCircuit`
    /// report, the same way a direct QUIC close/timeout would.
    fn handle_relay_server_event(&mut self, event: relay::Event) {
        match event {
            relay::Event::ReservationTimedOut { src_peer_id } => {
                self.witness_relay_disconnect(src_peer_id);
            }
            relay::Event::CircuitClosed { src_peer_id, .. } => {
                self.witness_relay_disconnect(src_peer_id);
            }
            other => trace!(?other, "relay server event"),
        }
    }

    fn witness_relay_disconnect(&mut self, src_peer_id: PeerId) {
        let target = NodeId::from_peer_id(src_peer_id);
        if self.relay_anomaly.record_disconnect(target, Instant::now()) {
            debug!(%src_peer_id, "relay anomaly threshold tripped, suppressing further forwarding");
        }
        let Some(realm_id) = self.realm.current_realm_id() else {
            return;
        };

        let mut report_id = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut report_id);
        let now = now_ms();
        let report = match WitnessReport::sign_new(
            &self.keypair,
            report_id,
            target,
            realm_id,
            DetectionMethod::RelayCircuit,
            now,
            now,
        ) {
            Ok(report) => report,
            Err(err) => {
                warn!(?err, "failed to sign relay proxy witness report");
                return;
            }
        };

        self.process_witness_report(&report);
        self.publish_realm_sync(realm_id, &RealmSyncEnvelope::WitnessReport { report });
    }

    /// Shared by both a peer-received `WitnessReport` (gossipsub) and one
    /// the local relay server constructs on a client's behalf: rate-limit,
    /// apply the fast-path rule, and either evict immediately or let the
    /// slow-path vote tally run (§4.11).
    fn process_witness_report(&mut self, report: &WitnessReport) {
        let Ok(member_count) = self.realm_member_count_sync() else {
            return;
        };
        match self.disconnect_tracker.submit_report(report, member_count, Instant::now()) {
            crate::disconnect::ReportDecision::ImmediateEvict => {
                let target = report.target();
                let realm = self.realm.clone();
                tokio::spawn(async move {
                    let _ = realm.evict(target).await;
                });
                self.send_event(NetworkEvent::RealmMemberLeft { peer: target });
            }
            crate::disconnect::ReportDecision::AwaitConfirmation => {
                trace!(target = %report.target(), "witness report entered slow path");
            }
            crate::disconnect::ReportDecision::RateLimited => {}
        }
    }

    fn handle_request_response_event(
        &mut self,
        event: request_response::Event<Request, Response>,
    ) {
        match event {
            request_response::Event::Message { peer, message, .. } => match message {
                request_response::Message::Request { request, channel, .. } => {
                    self.dispatch_inbound_request(peer, request, channel);
                }
                request_response::Message::Response { request_id, response } => {
                    if let Some(sender) = self.pending_requests.remove(&request_id) {
                        let _ = sender.send(Ok(response));
                    }
                }
            },
            request_response::Event::OutboundFailure { request_id, error, .. } => {
                if let Some(sender) = self.pending_requests.remove(&request_id) {
                    let _ = sender.send(Err(Error::Dial(libp2p::swarm::DialError::NoAddresses)));
                }
                debug!(?error, "outbound request failed");
            }
            other => trace!(?other, "request_response event"),
        }
    }

    fn dispatch_inbound_request(
        &mut self,
        peer: PeerId,
        request: Request,
        channel: request_response::ResponseChannel<Response>,
    ) {
        let remote = NodeId::from_peer_id(peer);
        let router = ProtocolRouter::new(&self.realm);
        let event_sender = self.event_sender.clone();
        let cmd_sender = self.cmd_sender.clone();

        // Admission happens synchronously against the realm's member set
        // (an async lock), so this is dispatched onto a task rather than
        // blocking the swarm loop; the reply still flows back over the
        // same `ResponseChannel`, which is `Send` and outlives this call.
        // Only the driver holds the swarm, so even a rejection has to be
        // routed back through `SwarmCmd::Respond` instead of answered here.
        let request_clone = request.clone();
        tokio::spawn(async move {
            match crate::messaging::admit_or_reject(&router, &request_clone, &remote).await {
                Ok(()) => {
                    let _ = event_sender
                        .send(NetworkEvent::RequestReceived {
                            req: request_clone,
                            channel: MsgResponder::FromPeer(channel),
                        })
                        .await;
                }
                Err(rejection) => {
                    debug!(?rejection, "inbound request rejected by protocol router");
                    let _ = cmd_sender.send(SwarmCmd::Respond { channel, response: rejection }).await;
                }
            }
        });
    }

    fn handle_gossipsub_event(&mut self, event: gossipsub::Event) {
        if let gossipsub::Event::Message { message, .. } = event {
            if let Ok(envelope) = rmp_serde::from_slice::<RealmSyncEnvelope>(&message.data) {
                self.handle_realm_sync_envelope(envelope);
            }
        }
    }

    fn handle_realm_sync_envelope(&mut self, envelope: RealmSyncEnvelope) {
        match envelope {
            RealmSyncEnvelope::MemberLeave { message, public_key } => {
                if message.verify(&public_key, now_ms()).is_err() {
                    return;
                }
                if self.realm.current_realm_id() != Some(message.realm()) {
                    return;
                }
                let leaving = message.leaving();
                let realm = self.realm.clone();
                tokio::spawn(async move {
                    let _ = realm.evict(leaving).await;
                });
                self.send_event(NetworkEvent::RealmMemberLeft { peer: leaving });
            }
            RealmSyncEnvelope::WitnessReport { report } => {
                self.process_witness_report(&report);
            }
            RealmSyncEnvelope::WitnessConfirmation { confirmation } => {
                let outcome = self
                    .disconnect_tracker
                    .record_confirmation(confirmation.report_id(), confirmation.vote());
                if outcome == crate::disconnect::TallyOutcome::Evict {
                    let target = confirmation.target();
                    let realm = self.realm.clone();
                    tokio::spawn(async move {
                        let _ = realm.evict(target).await;
                    });
                    self.send_event(NetworkEvent::RealmMemberLeft { peer: target });
                }
            }
        }
    }

    /// Synchronous best-effort read of the realm member count, used only
    /// to decide fast-path eligibility; a stale-by-one count is harmless
    /// here since the fast-path threshold has generous headroom (<10).
    fn realm_member_count_sync(&self) -> Result<usize> {
        let realm = self.realm.clone();
        Ok(tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move { realm.member_count().await })
        })?)
    }

    fn handle_realm_event(&mut self, event: RealmEvent) {
        match event {
            RealmEvent::Joined(joined) => {
                self.send_event(NetworkEvent::RealmMemberJoined { peer: joined.node_id });
            }
            RealmEvent::Left(left) => {
                self.send_event(NetworkEvent::RealmMemberLeft { peer: left.node_id });
            }
        }
    }

    fn sweep_disconnect_grace(&mut self) {
        let now = Instant::now();
        let suspects: Vec<NodeId> = self.ping_failures.keys().map(|p| NodeId::from_peer_id(*p)).collect();
        for target in suspects {
            if self.disconnect_tracker.evaluate_grace(target, now) == crate::disconnect::GraceDecision::Evict {
                let realm = self.realm.clone();
                tokio::spawn(async move {
                    let _ = realm.evict(target).await;
                });
                self.send_event(NetworkEvent::RealmMemberLeft { peer: target });
            }
        }
    }

    fn trim_connections(&mut self) {
        let live = self.connected_peers.len();
        for peer in self.connection_manager.trim(live) {
            if self.relay_manager.keep_alive_peer(&peer.into()) {
                continue;
            }
            let _ = self.swarm.disconnect_peer_id(peer.into());
        }
    }

    async fn maybe_republish_peer_record(&mut self) {
        if self.connected_peers.is_empty() {
            return;
        }
        self.publish_peer_record().await;
    }

    async fn publish_peer_record(&mut self) {
        let realm_id = self.realm.current_realm_id();
        let relay_addrs: Vec<Multiaddr> = self.swarm.external_addresses().cloned().collect();
        let direct_addrs: Vec<Multiaddr> = self
            .swarm
            .listeners()
            .cloned()
            .collect();

        self.peer_record_seq += 1;
        let record = match PeerRecord::sign_new(
            &self.keypair,
            realm_id,
            relay_addrs,
            direct_addrs,
            NatClass::Restricted,
            Reachability::Unknown,
            self.peer_record_seq,
            now_ms(),
        ) {
            Ok(record) => record,
            Err(err) => {
                warn!(?err, "failed to sign peer record");
                return;
            }
        };

        let Ok(value) = record.to_msgpack() else {
            return;
        };
        let key = match realm_id {
            Some(realm_id) => peer_record_key(realm_id, self.self_node_id),
            None => dep2p_protocol::global_node_key(self.self_node_id),
        };
        let kad_record = kad::Record::new(kad::RecordKey::from(key), value);
        if let Err(err) = self.swarm.behaviour_mut().kademlia.put_record(kad_record, kad::Quorum::One) {
            warn!(?err, "failed to submit peer record to kademlia");
        }
    }

    async fn broadcast_member_leave(&mut self, reason: LeaveReason) -> Result<()> {
        let Some(realm_id) = self.realm.current_realm_id() else {
            return Ok(());
        };
        let message = MemberLeave::sign_new(&self.keypair, self.self_node_id, realm_id, reason, now_ms())?;
        let public_key = self.keypair.as_libp2p_keypair().public().encode_protobuf();
        let envelope = RealmSyncEnvelope::MemberLeave { message, public_key };
        self.publish_realm_sync(realm_id, &envelope);
        Ok(())
    }

    fn publish_realm_sync(&mut self, realm_id: RealmId, envelope: &RealmSyncEnvelope) {
        let Ok(bytes) = rmp_serde::to_vec(envelope) else {
            return;
        };
        let topic = gossipsub::IdentTopic::new(member_sync_topic(realm_id));
        if let Some(gossipsub) = self.swarm.behaviour_mut().gossipsub.as_mut() {
            let _ = gossipsub.publish(topic, bytes);
        }
    }

    // ---- commands ------------------------------------------------------

    async fn handle_cmd(&mut self, cmd: SwarmCmd) {
        match cmd {
            SwarmCmd::StartListening { addr, sender } => {
                let result = self.swarm.listen_on(addr).map(|_| ()).map_err(Error::from);
                let _ = sender.send(result);
            }
            SwarmCmd::Connect { target, addrs, sender } => {
                self.connect(target, addrs, sender).await;
            }
            SwarmCmd::DialWithOpts { opts, sender } => {
                let _ = sender.send(self.dial_with_opts(opts));
            }
            SwarmCmd::Send { target, protocol, payload, sender } => {
                let realm = self.realm.current_realm_id();
                let request = Request { protocol, realm, payload };
                let peer_id: PeerId = target.into();
                self.swarm.behaviour_mut().request_response.send_request(&peer_id, request);
                let _ = sender.send(Ok(()));
            }
            SwarmCmd::Request { target, protocol, payload, sender } => {
                let realm = self.realm.current_realm_id();
                let request = Request { protocol, realm, payload };
                let peer_id: PeerId = target.into();
                let request_id = self.swarm.behaviour_mut().request_response.send_request(&peer_id, request);
                self.pending_requests.insert(request_id, sender);
            }
            SwarmCmd::JoinRealm { realm_key, sender } => {
                let result = self.realm.join(realm_key).map_err(Error::from);
                if let Ok(realm_id) = result {
                    let topic = gossipsub::IdentTopic::new(member_sync_topic(realm_id));
                    if let Some(gossipsub) = self.swarm.behaviour_mut().gossipsub.as_mut() {
                        let _ = gossipsub.subscribe(&topic);
                    }
                    self.publish_peer_record().await;
                }
                let _ = sender.send(result);
            }
            SwarmCmd::LeaveRealm { sender } => {
                let _ = self.broadcast_member_leave(LeaveReason::Graceful).await;
                tokio::time::sleep(Duration::from_millis(50)).await;
                if let Some(realm_id) = self.realm.current_realm_id() {
                    let topic = gossipsub::IdentTopic::new(member_sync_topic(realm_id));
                    if let Some(gossipsub) = self.swarm.behaviour_mut().gossipsub.as_mut() {
                        let _ = gossipsub.unsubscribe(&topic);
                    }
                }
                let result = self.realm.leave().map(|_| ()).map_err(Error::from);
                let _ = sender.send(result);
            }
            SwarmCmd::PublishPeerRecord { sender } => {
                self.publish_peer_record().await;
                let _ = sender.send(Ok(()));
            }
            SwarmCmd::GetListenAddrs { sender } => {
                let addrs: Vec<Multiaddr> = self.swarm.listeners().cloned().collect();
                let _ = sender.send(addrs);
            }
            SwarmCmd::Respond { channel, response } => {
                let _ = self.swarm.behaviour_mut().request_response.send_response(channel, response);
            }
            SwarmCmd::FindPeerRecord { target, sender } => {
                self.find_peer_record(target, sender);
            }
            SwarmCmd::Shutdown => unreachable!("handled directly in run()'s select loop"),
        }
    }

    /// Cooperative shutdown handle, threaded through `Node::stop` per §5:
    /// `Node.stop -> Realm.leave (broadcasts MemberLeave, 50ms wait) ->
    /// Swarm.close_all_connections -> Transport.close_socket`. Cancelling
    /// here only covers the last step; the realm-leave broadcast happens
    /// via the `LeaveRealm` command above, which callers are expected to
    /// issue before cancelling.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }
}

/// Best-effort classification of why a connection closed (§4.4), derived
/// from the `ConnectionError` libp2p hands back. `None` means we closed it
/// ourselves (e.g. `disconnect_peer_id`); anything else is a best guess —
/// libp2p does not reliably distinguish a clean peer-initiated close from
/// an abrupt one at this layer, so `Graceful` vs `Error` is approximate.
fn classify_close_reason(cause: &Option<libp2p::swarm::ConnectionError>) -> DisconnectReason {
    match cause {
        None => DisconnectReason::Local,
        Some(libp2p::swarm::ConnectionError::KeepAliveTimeout) => DisconnectReason::Timeout,
        Some(_) => DisconnectReason::Error,
    }
}

/// The handful of message shapes carried over the realm member-sync
/// gossipsub topic: `MemberLeave` for Layer 2 of disconnect detection, and
/// `WitnessReport`/`WitnessConfirmation` for Layer 3. `MemberLeave`'s
/// signature is verified against the signer's embedded public key, which
/// must therefore travel alongside it (the same self-certification
/// pattern `PeerRecord` uses).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
enum RealmSyncEnvelope {
    MemberLeave { message: MemberLeave, public_key: Vec<u8> },
    WitnessReport { report: WitnessReport },
    WitnessConfirmation { confirmation: WitnessConfirmation },
}
