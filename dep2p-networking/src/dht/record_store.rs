// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

use std::collections::HashMap;

use dep2p_identity::NodeId;
use dep2p_protocol::{peer_record_key, PeerRecord, RealmId};
use tokio::sync::RwLock;

/// Key identifying one `(NodeId, RealmId)` slot in the store. `realm_id`
/// is `None` for the global, no-realm record at `/dep2p/v2/node/<NodeId>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Slot {
    node_id: NodeId,
    realm_id: Option<RealmId>,
}

/// Validating, `seq`-ordered store of signed `PeerRecord`s. Accepts a put
/// only if the record's signature verifies and its `seq` strictly exceeds
/// whatever is already cached for the same `(NodeId, RealmId)` pair (spec
/// §4.9/§8's quantified invariant); stale records are simply never
/// accepted rather than actively pruned — they expire on their own `ttl`.
#[derive(Default)]
pub struct PeerRecordStore {
    records: RwLock<HashMap<Slot, PeerRecord>>,
}

#[derive(Debug, thiserror::Error)]
pub enum PutError {
    #[error("record signature does not verify")]
    InvalidSignature,
    #[error("record seq {attempted} does not exceed cached seq {cached}")]
    StaleSeq { attempted: u64, cached: u64 },
}

impl PeerRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and stores `record`, rejecting it if the signature is bad
    /// or `seq` does not strictly increase.
    pub async fn put(&self, record: PeerRecord) -> Result<(), PutError> {
        record.verify().map_err(|_| PutError::InvalidSignature)?;

        let slot = Slot {
            node_id: record.node_id(),
            realm_id: record.realm_id(),
        };
        let mut records = self.records.write().await;
        if let Some(existing) = records.get(&slot) {
            if !record.supersedes(existing.seq()) {
                return Err(PutError::StaleSeq {
                    attempted: record.seq(),
                    cached: existing.seq(),
                });
            }
        }
        records.insert(slot, record);
        Ok(())
    }

    /// Returns the highest-`seq` record cached for `(node_id, realm_id)`,
    /// dropping it first if it has since expired (stale records expire
    /// silently per §4.9 rather than returning an error).
    pub async fn get(&self, node_id: NodeId, realm_id: Option<RealmId>, now_ms: u64) -> Option<PeerRecord> {
        let slot = Slot { node_id, realm_id };
        let mut records = self.records.write().await;
        match records.get(&slot) {
            Some(record) if record.is_expired(now_ms) => {
                records.remove(&slot);
                None
            }
            Some(record) => Some(record.clone()),
            None => None,
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// The DHT key a record for `(node_id, realm_id)` is published under.
    /// Always the realm-hashed form (`/dep2p/v2/realm/<H(RealmID)>/peer/
    /// <NodeID>`); the global no-realm key lives in `dht_keys::global_node_key`
    /// and is used by callers directly when `realm_id` is `None`.
    pub fn publish_key(realm_id: RealmId, node_id: NodeId) -> String {
        peer_record_key(realm_id, node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dep2p_identity::KeyPair;
    use dep2p_protocol::{NatClass, Reachability};

    fn record(keypair: &KeyPair, seq: u64) -> PeerRecord {
        PeerRecord::sign_new(keypair, None, vec![], vec![], NatClass::Public, Reachability::Unknown, seq, 1_000)
            .unwrap()
    }

    #[tokio::test]
    async fn higher_seq_supersedes_lower() {
        let store = PeerRecordStore::new();
        let keypair = KeyPair::generate();
        store.put(record(&keypair, 1)).await.unwrap();
        store.put(record(&keypair, 2)).await.unwrap();

        let fetched = store.get(keypair.node_id(), None, 1_000).await.unwrap();
        assert_eq!(fetched.seq(), 2);
    }

    #[tokio::test]
    async fn stale_seq_is_rejected() {
        let store = PeerRecordStore::new();
        let keypair = KeyPair::generate();
        store.put(record(&keypair, 5)).await.unwrap();

        let err = store.put(record(&keypair, 3)).await.unwrap_err();
        assert!(matches!(err, PutError::StaleSeq { attempted: 3, cached: 5 }));
    }

    #[tokio::test]
    async fn expired_record_returns_none_and_is_evicted() {
        let store = PeerRecordStore::new();
        let keypair = KeyPair::generate();
        store.put(record(&keypair, 1)).await.unwrap();

        let far_future = 1_000 + NatClass::Public.ttl().as_millis() as u64 + 1;
        assert!(store.get(keypair.node_id(), None, far_future).await.is_none());
        assert_eq!(store.len().await, 0);
    }
}
