// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

//! Address Book (§4.6): the in-memory, per-peer view of how to reach a
//! node. DHT `PeerRecord`s (§4.9) are authoritative; this is the live,
//! merged picture consulted by `Swarm::connect`.

use std::collections::HashMap;
use std::sync::Arc;

use dep2p_identity::NodeId;
use dep2p_protocol::AddressRecord;
use libp2p::Multiaddr;
use tokio::sync::{broadcast, RwLock};

const SUBSCRIPTION_CHANNEL_CAPACITY: usize = 64;

/// Fine-grained per-peer locking: a lookup or update for one `NodeId` never
/// blocks on another's, per spec §5's shared-resource policy.
#[derive(Default)]
pub struct AddressBook {
    peers: RwLock<HashMap<NodeId, Arc<RwLock<Vec<AddressRecord>>>>>,
    subscriptions: RwLock<HashMap<NodeId, broadcast::Sender<AddressBookEvent>>>,
}

#[derive(Debug, Clone)]
pub enum AddressBookEvent {
    Added(Multiaddr),
    Removed(Multiaddr),
}

impl AddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, node_id: NodeId) -> Arc<RwLock<Vec<AddressRecord>>> {
        if let Some(slot) = self.peers.read().await.get(&node_id) {
            return slot.clone();
        }
        let mut peers = self.peers.write().await;
        peers
            .entry(node_id)
            .or_insert_with(|| Arc::new(RwLock::new(Vec::new())))
            .clone()
    }

    /// Adds or updates an address for `record.node_id()`. On a collision
    /// for the same `(NodeID, Multiaddr)` pair, the highest-priority record
    /// wins per spec §4.6.
    pub async fn add_addr(&self, record: AddressRecord) {
        let node_id = record.node_id();
        let slot = self.slot(node_id).await;
        let mut addrs = slot.write().await;

        if let Some(existing) = addrs.iter_mut().find(|r| r.addr() == record.addr()) {
            if record.priority() > existing.priority() {
                *existing = record.clone();
            }
        } else {
            addrs.push(record.clone());
        }
        drop(addrs);

        self.notify(node_id, AddressBookEvent::Added(record.addr().clone())).await;
    }

    /// Returns this peer's known addresses ordered by descending priority.
    pub async fn addrs_for(&self, node_id: NodeId) -> Vec<AddressRecord> {
        let slot = self.slot(node_id).await;
        let mut addrs = slot.read().await.clone();
        addrs.sort_by(|a, b| b.priority().cmp(&a.priority()));
        addrs
    }

    /// Drops expired unverified addresses outright; verified ones (priority
    /// ≥ publishable threshold) are demoted to unverified rather than
    /// removed immediately, so a stale-but-recently-good address survives
    /// one more expiry cycle before eviction.
    pub async fn cleanup_expired(&self, node_id: NodeId) {
        let slot = self.slot(node_id).await;
        let mut addrs = slot.write().await;
        let mut removed = Vec::new();
        addrs.retain_mut(|record| {
            if !record.is_expired() {
                return true;
            }
            if record.is_publishable() {
                *record = record.clone().with_priority(dep2p_protocol::PRIORITY_UNVERIFIED);
                record.refresh();
                true
            } else {
                removed.push(record.addr().clone());
                false
            }
        });
        drop(addrs);
        for addr in removed {
            self.notify(node_id, AddressBookEvent::Removed(addr)).await;
        }
    }

    /// Runs `cleanup_expired` for every peer currently tracked (§4.6). Driven
    /// by the maintenance tick rather than per-lookup, since TTL expiry
    /// doesn't depend on anyone actively querying that peer right now.
    pub async fn cleanup_expired_all(&self) {
        let node_ids: Vec<NodeId> = self.peers.read().await.keys().copied().collect();
        for node_id in node_ids {
            self.cleanup_expired(node_id).await;
        }
    }

    pub async fn subscribe(&self, node_id: NodeId) -> broadcast::Receiver<AddressBookEvent> {
        let mut subs = self.subscriptions.write().await;
        subs.entry(node_id)
            .or_insert_with(|| broadcast::channel(SUBSCRIPTION_CHANNEL_CAPACITY).0)
            .subscribe()
    }

    async fn notify(&self, node_id: NodeId, event: AddressBookEvent) {
        if let Some(sender) = self.subscriptions.read().await.get(&node_id) {
            let _ = sender.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dep2p_protocol::AddressSource;

    fn node_id() -> NodeId {
        dep2p_identity::KeyPair::generate().node_id()
    }

    #[tokio::test]
    async fn higher_priority_record_wins_on_same_addr() {
        let book = AddressBook::new();
        let node = node_id();
        let addr: Multiaddr = "/ip4/127.0.0.1/udp/1/quic-v1".parse().unwrap();

        book.add_addr(AddressRecord::new(node, addr.clone(), AddressSource::Dht)).await;
        book.add_addr(AddressRecord::new(node, addr, AddressSource::Direct)).await;

        let addrs = book.addrs_for(node).await;
        assert_eq!(addrs.len(), 1);
        assert_eq!(addrs[0].source(), AddressSource::Direct);
    }

    #[tokio::test]
    async fn addrs_for_orders_by_descending_priority() {
        let book = AddressBook::new();
        let node = node_id();
        let a: Multiaddr = "/ip4/127.0.0.1/udp/1/quic-v1".parse().unwrap();
        let b: Multiaddr = "/ip4/127.0.0.1/udp/2/quic-v1".parse().unwrap();

        book.add_addr(AddressRecord::new(node, a, AddressSource::Mdns)).await;
        book.add_addr(AddressRecord::new(node, b, AddressSource::UserConfigured)).await;

        let addrs = book.addrs_for(node).await;
        assert_eq!(addrs[0].source(), AddressSource::UserConfigured);
    }

    #[tokio::test]
    async fn subscribers_see_add_events() {
        let book = AddressBook::new();
        let node = node_id();
        let mut rx = book.subscribe(node).await;
        let addr: Multiaddr = "/ip4/127.0.0.1/udp/1/quic-v1".parse().unwrap();

        book.add_addr(AddressRecord::new(node, addr, AddressSource::Direct)).await;
        assert!(matches!(rx.try_recv().unwrap(), AddressBookEvent::Added(_)));
    }
}
