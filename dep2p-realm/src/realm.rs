// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

use std::sync::RwLock as StdRwLock;

use dep2p_identity::NodeId;
use dep2p_protocol::RealmId;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::member_set::MemberSet;
use crate::membership_proof::MembershipProof;
use crate::realm_key::RealmKey;

/// Emitted on the realm's event bus whenever a node's membership is
/// confirmed by a verified [`MembershipProof`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberJoined {
    pub realm_id: RealmId,
    pub node_id: NodeId,
}

/// Emitted when a member is removed from the set, whether by explicit leave
/// or by the disconnect-detection layer above this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberLeft {
    pub realm_id: RealmId,
    pub node_id: NodeId,
}

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A node is in at most one realm at a time. `RealmSlot` enforces this:
/// `join` fails with [`Error::AlreadyInRealm`] while a realm is held, and
/// every membership operation fails with [`Error::NotInRealm`] until one is
/// joined.
pub struct RealmSlot {
    own_node_id: NodeId,
    current: StdRwLock<Option<JoinedRealm>>,
    events: broadcast::Sender<RealmEvent>,
}

#[derive(Debug, Clone)]
pub enum RealmEvent {
    Joined(MemberJoined),
    Left(MemberLeft),
}

struct JoinedRealm {
    realm_id: RealmId,
    realm_key: RealmKey,
    members: MemberSet,
}

impl RealmSlot {
    pub fn new(own_node_id: NodeId) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            own_node_id,
            current: StdRwLock::new(None),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealmEvent> {
        self.events.subscribe()
    }

    /// Joins `realm_key`'s realm, admitting `own_node_id` itself as the
    /// first member. Fails if a realm is already joined.
    pub fn join(&self, realm_key: RealmKey) -> Result<RealmId> {
        let mut slot = self.current.write().expect("realm slot lock poisoned");
        if slot.is_some() {
            return Err(Error::AlreadyInRealm);
        }
        let realm_id = realm_key.realm_id();
        *slot = Some(JoinedRealm {
            realm_id,
            realm_key,
            members: MemberSet::new(),
        });
        debug!(%realm_id, "joined realm");
        Ok(realm_id)
    }

    /// Leaves the currently-joined realm. Fails if not currently joined.
    pub fn leave(&self) -> Result<RealmId> {
        let mut slot = self.current.write().expect("realm slot lock poisoned");
        match slot.take() {
            Some(joined) => {
                debug!(realm_id = %joined.realm_id, "left realm");
                Ok(joined.realm_id)
            }
            None => Err(Error::NotInRealm),
        }
    }

    pub fn current_realm_id(&self) -> Option<RealmId> {
        self.current.read().expect("realm slot lock poisoned").as_ref().map(|j| j.realm_id)
    }

    /// Generates a membership proof for `verifier` scoped to the currently
    /// joined realm.
    pub fn generate_proof(&self, verifier: NodeId, now_ms: u64) -> Result<MembershipProof> {
        let slot = self.current.read().expect("realm slot lock poisoned");
        let joined = slot.as_ref().ok_or(Error::NotInRealm)?;
        MembershipProof::generate(&joined.realm_key, self.own_node_id, joined.realm_id, verifier, now_ms)
    }

    /// Verifies `proof` against the currently joined realm. On success, adds
    /// the prover to the member set (identified by its digest — the proof
    /// itself never carries the living [`NodeId`], only its fixed digest, so
    /// callers must supply the candidate's actual `NodeId` alongside the
    /// proof for the digest to be checked against) and emits
    /// [`RealmEvent::Joined`].
    pub async fn admit(&self, proof: &MembershipProof, candidate: NodeId, now_ms: u64) -> Result<()> {
        let (realm_id, realm_key) = {
            let slot = self.current.read().expect("realm slot lock poisoned");
            let joined = slot.as_ref().ok_or(Error::NotInRealm)?;
            (joined.realm_id, joined.realm_key.clone())
        };

        if proof.prover_digest() != candidate.digest32() {
            return Err(Error::ProofPeerMismatch);
        }
        proof.verify(&realm_key, self.own_node_id, realm_id, now_ms)?;

        {
            let slot = self.current.read().expect("realm slot lock poisoned");
            let joined = slot.as_ref().ok_or(Error::NotInRealm)?;
            joined.members.insert(candidate).await;
        }

        trace!(%realm_id, node_id = %candidate, "admitted realm member");
        let _ = self.events.send(RealmEvent::Joined(MemberJoined {
            realm_id,
            node_id: candidate,
        }));
        Ok(())
    }

    /// Removes `node_id` from the member set and emits
    /// [`RealmEvent::Left`]. Called by the disconnect-detection layer once a
    /// peer is confirmed gone, as well as on an explicit `MemberLeave`.
    pub async fn evict(&self, node_id: NodeId) -> Result<()> {
        let realm_id = {
            let slot = self.current.read().expect("realm slot lock poisoned");
            let joined = slot.as_ref().ok_or(Error::NotInRealm)?;
            joined.members.remove(&node_id).await;
            joined.realm_id
        };
        let _ = self.events.send(RealmEvent::Left(MemberLeft { realm_id, node_id }));
        Ok(())
    }

    pub async fn is_member(&self, node_id: &NodeId) -> Result<bool> {
        let slot = self.current.read().expect("realm slot lock poisoned");
        let joined = slot.as_ref().ok_or(Error::NotInRealm)?;
        Ok(joined.members.contains(node_id).await)
    }

    pub async fn member_count(&self) -> Result<usize> {
        let slot = self.current.read().expect("realm slot lock poisoned");
        let joined = slot.as_ref().ok_or(Error::NotInRealm)?;
        Ok(joined.members.len().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> NodeId {
        dep2p_identity::KeyPair::generate().node_id()
    }

    #[test]
    fn join_then_join_again_is_already_in_realm() {
        let slot = RealmSlot::new(node());
        slot.join(RealmKey::generate()).unwrap();
        let err = slot.join(RealmKey::generate()).unwrap_err();
        assert!(matches!(err, Error::AlreadyInRealm));
    }

    #[test]
    fn leave_without_join_is_not_in_realm() {
        let slot = RealmSlot::new(node());
        let err = slot.leave().unwrap_err();
        assert!(matches!(err, Error::NotInRealm));
    }

    #[test]
    fn join_then_leave_then_join_succeeds() {
        let slot = RealmSlot::new(node());
        let key = RealmKey::generate();
        let id_a = slot.join(key.clone()).unwrap();
        slot.leave().unwrap();
        let id_b = slot.join(key).unwrap();
        assert_eq!(id_a, id_b);
    }

    #[tokio::test]
    async fn admit_adds_candidate_and_emits_event() {
        let own = node();
        let slot = RealmSlot::new(own);
        let key = RealmKey::generate();
        let realm_id = slot.join(key.clone()).unwrap();
        let mut events = slot.subscribe();

        // The candidate proves its own membership to `own`, using the same
        // pre-shared realm key, the way a real peer would off the wire.
        let candidate = node();
        let proof = MembershipProof::generate(&key, candidate, realm_id, own, 1_000_000).unwrap();
        slot.admit(&proof, candidate, 1_000_100).await.unwrap();

        assert!(slot.is_member(&candidate).await.unwrap());
        let event = events.try_recv().unwrap();
        match event {
            RealmEvent::Joined(joined) => assert_eq!(joined.node_id, candidate),
            other => panic!("expected Joined, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn evict_without_join_is_not_in_realm() {
        let slot = RealmSlot::new(node());
        let err = slot.evict(node()).await.unwrap_err();
        assert!(matches!(err, Error::NotInRealm));
    }
}
