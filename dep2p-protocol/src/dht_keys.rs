// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

use crate::{NodeId, RealmId};

/// `/dep2p/v2/realm/<hex(H(RealmID))>/peer/<NodeID>` — Kademlia key for a
/// realm-scoped [`crate::PeerRecord`]. Uses [`RealmId::dht_namespace_hash`],
/// not the raw id, per the anti-conflation rule in spec §4.9.
pub fn peer_record_key(realm: RealmId, node: NodeId) -> Vec<u8> {
    format!(
        "/dep2p/v2/realm/{}/peer/{node}",
        hex::encode(realm.dht_namespace_hash())
    )
    .into_bytes()
}

/// `/dep2p/v2/realm/<hex(H(RealmID))>/members` — Kademlia provider key under
/// which realm members advertise themselves for membership discovery.
pub fn members_provider_key(realm: RealmId) -> Vec<u8> {
    format!(
        "/dep2p/v2/realm/{}/members",
        hex::encode(realm.dht_namespace_hash())
    )
    .into_bytes()
}

/// `/dep2p/v2/node/<NodeID>` — Kademlia key for the global, no-realm
/// [`crate::PeerRecord`] (`realm_id: None`).
pub fn global_node_key(node: NodeId) -> Vec<u8> {
    format!("/dep2p/v2/node/{node}").into_bytes()
}

/// `/dep2p/realm/<RealmID>/members` — gossipsub topic for the member-sync
/// broadcast (joins/leaves). Uses the raw [`RealmId`] (its hex `Display`),
/// never [`RealmId::dht_namespace_hash`]: this is a PubSub topic string, not
/// a DHT key, and the two namespaces must stay distinct.
pub fn member_sync_topic(realm: RealmId) -> String {
    format!("/dep2p/realm/{realm}/members")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn realm() -> RealmId {
        RealmId::derive_from_hashed_key(&[4u8; 32])
    }

    fn node() -> NodeId {
        dep2p_identity::KeyPair::generate().node_id()
    }

    #[test]
    fn peer_record_key_uses_hashed_namespace_not_raw_id() {
        let realm = realm();
        let key = peer_record_key(realm, node());
        let key = String::from_utf8(key).unwrap();
        assert!(key.contains(&hex::encode(realm.dht_namespace_hash())));
        assert!(!key.contains(&realm.to_hex()));
    }

    #[test]
    fn member_sync_topic_uses_raw_id_not_hashed() {
        let realm = realm();
        let topic = member_sync_topic(realm);
        assert!(topic.contains(&realm.to_hex()));
        assert!(!topic.contains(&hex::encode(realm.dht_namespace_hash())));
    }

    #[test]
    fn global_node_key_has_no_realm_segment() {
        let node = node();
        let key = String::from_utf8(global_node_key(node)).unwrap();
        assert_eq!(key, format!("/dep2p/v2/node/{node}"));
    }

    #[test]
    fn members_provider_key_is_stable_for_same_realm() {
        let realm = realm();
        assert_eq!(members_provider_key(realm), members_provider_key(realm));
    }
}
