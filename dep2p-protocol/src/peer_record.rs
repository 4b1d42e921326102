// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

use std::time::Duration;

use libp2p::Multiaddr;
use libp2p_identity::PublicKey;
use serde::{Deserialize, Serialize};

use dep2p_identity::KeyPair;

use crate::{Error, NodeId, RealmId, Result};

/// Observed NAT classification, driving the record's DHT republish cadence
/// (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NatClass {
    Public,
    FullCone,
    Restricted,
    Symmetric,
}

impl NatClass {
    /// `(ttl, refresh_interval)` for this class.
    pub fn ttl_and_refresh(self) -> (Duration, Duration) {
        match self {
            NatClass::Public => (Duration::from_secs(4 * 3600), Duration::from_secs(2 * 3600)),
            NatClass::FullCone => (Duration::from_secs(2 * 3600), Duration::from_secs(3600)),
            NatClass::Restricted => (Duration::from_secs(3600), Duration::from_secs(30 * 60)),
            NatClass::Symmetric => (Duration::from_secs(30 * 60), Duration::from_secs(15 * 60)),
        }
    }

    pub fn ttl(self) -> Duration {
        self.ttl_and_refresh().0
    }

    pub fn refresh_interval(self) -> Duration {
        self.ttl_and_refresh().1
    }
}

/// Coarse reachability classification carried alongside `nat_type`. The
/// field's value set is resolved here (see DESIGN.md) as the minimal set
/// the disconnect/NAT layers need to decide whether to attempt a direct
/// dial at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reachability {
    /// Confirmed reachable via a direct dial from at least one peer.
    DirectlyReachable,
    /// Behind NAT; direct dials are unreliable, hole-punch or relay first.
    RequiresTraversal,
    /// Not yet determined.
    Unknown,
}

/// Signed, versioned, TTL'd record describing how to reach a node, keyed by
/// `(NodeId, RealmId)`. `realm_id: None` represents the global
/// (no-realm) record addressed at `/dep2p/v2/node/<NodeId>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerRecord {
    node_id: NodeId,
    /// Protobuf-encoded Ed25519 public key. Self-certification requires the
    /// verifier be able to recompute `NodeId == H(public_key)` without
    /// trusting a third party to hand over the right key.
    public_key: Vec<u8>,
    realm_id: Option<RealmId>,
    relay_addrs: Vec<Multiaddr>,
    direct_addrs: Vec<Multiaddr>,
    nat_type: NatClass,
    reachability: Reachability,
    seq: u64,
    timestamp_ms: u64,
    ttl: Duration,
    signature: Vec<u8>,
}

impl PeerRecord {
    /// Builds and signs a new record. `direct_addrs` MUST already have been
    /// filtered to dialback/STUN-verified addresses by the caller (the
    /// Address Book) — this constructor does not re-check priorities.
    #[allow(clippy::too_many_arguments)]
    pub fn sign_new(
        keypair: &KeyPair,
        realm_id: Option<RealmId>,
        relay_addrs: Vec<Multiaddr>,
        direct_addrs: Vec<Multiaddr>,
        nat_type: NatClass,
        reachability: Reachability,
        seq: u64,
        timestamp_ms: u64,
    ) -> Result<Self> {
        let node_id = keypair.node_id();
        let public_key = keypair.as_libp2p_keypair().public().encode_protobuf();
        let ttl = nat_type.ttl();

        let mut record = Self {
            node_id,
            public_key,
            realm_id,
            relay_addrs,
            direct_addrs,
            nat_type,
            reachability,
            seq,
            timestamp_ms,
            ttl,
            signature: Vec::new(),
        };
        record.signature = keypair.sign(&record.signable_bytes())?;
        Ok(record)
    }

    /// Canonical byte encoding signatures are computed over. Deliberately
    /// not the serde envelope, so the wire encoding can evolve without
    /// invalidating existing signatures.
    fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.node_id.to_bytes());
        match self.realm_id {
            Some(realm) => {
                buf.push(1);
                buf.extend_from_slice(realm.as_bytes());
            }
            None => buf.push(0),
        }
        for addr in &self.relay_addrs {
            let bytes = addr.to_vec();
            buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
            buf.extend_from_slice(&bytes);
        }
        for addr in &self.direct_addrs {
            let bytes = addr.to_vec();
            buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
            buf.extend_from_slice(&bytes);
        }
        buf.push(self.nat_type.u8_marker());
        buf.push(self.reachability.u8_marker());
        buf.extend_from_slice(&self.seq.to_be_bytes());
        buf.extend_from_slice(&self.timestamp_ms.to_be_bytes());
        buf.extend_from_slice(&self.ttl.as_millis().to_be_bytes());
        buf
    }

    /// Verifies: the embedded public key hashes to `node_id`, and the
    /// signature verifies over the canonical signable bytes.
    pub fn verify(&self) -> Result<()> {
        let public_key =
            PublicKey::try_decode_protobuf(&self.public_key).map_err(|_| Error::SignatureInvalid)?;
        let derived = NodeId::from_peer_id(public_key.to_peer_id());
        if derived != self.node_id {
            return Err(Error::SignatureInvalid);
        }
        if !public_key.verify(&self.signable_bytes(), &self.signature) {
            return Err(Error::SignatureInvalid);
        }
        Ok(())
    }

    /// Total ordering rule for the DHT record layer: a record is accepted
    /// over `previous_seq` only if strictly greater.
    pub fn supersedes(&self, previous_seq: u64) -> bool {
        self.seq > previous_seq
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.timestamp_ms) >= self.ttl.as_millis() as u64
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn realm_id(&self) -> Option<RealmId> {
        self.realm_id
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn relay_addrs(&self) -> &[Multiaddr] {
        &self.relay_addrs
    }

    pub fn direct_addrs(&self) -> &[Multiaddr] {
        &self.direct_addrs
    }

    pub fn nat_type(&self) -> NatClass {
        self.nat_type
    }

    pub fn reachability(&self) -> Reachability {
        self.reachability
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec(self)?)
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

// Small helper trait so `nat_type`/`reachability` (plain enums) can be
// pushed as a single discriminant byte into the signable buffer above
// without pulling in a derive macro for just this.
trait DiscriminantByte {
    fn u8_marker(self) -> u8;
}

impl DiscriminantByte for NatClass {
    fn u8_marker(self) -> u8 {
        match self {
            NatClass::Public => 0,
            NatClass::FullCone => 1,
            NatClass::Restricted => 2,
            NatClass::Symmetric => 3,
        }
    }
}

impl DiscriminantByte for Reachability {
    fn u8_marker(self) -> u8 {
        match self {
            Reachability::DirectlyReachable => 0,
            Reachability::RequiresTraversal => 1,
            Reachability::Unknown => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let keypair = KeyPair::generate();
        let record = PeerRecord::sign_new(
            &keypair,
            None,
            vec!["/ip4/203.0.113.1/udp/4001/quic-v1".parse().unwrap()],
            vec![],
            NatClass::Public,
            Reachability::DirectlyReachable,
            1,
            1_000,
        )
        .expect("sign");
        record.verify().expect("verify");
    }

    #[test]
    fn tampered_seq_fails_verification() {
        let keypair = KeyPair::generate();
        let mut record = PeerRecord::sign_new(
            &keypair,
            None,
            vec![],
            vec![],
            NatClass::Public,
            Reachability::Unknown,
            1,
            1_000,
        )
        .expect("sign");
        record.seq = 2;
        assert!(record.verify().is_err());
    }

    #[test]
    fn supersedes_only_on_strictly_greater_seq() {
        let keypair = KeyPair::generate();
        let record = PeerRecord::sign_new(
            &keypair,
            None,
            vec![],
            vec![],
            NatClass::Symmetric,
            Reachability::Unknown,
            5,
            1_000,
        )
        .expect("sign");
        assert!(record.supersedes(4));
        assert!(!record.supersedes(5));
        assert!(!record.supersedes(6));
    }

    #[test]
    fn nat_class_ttls_match_expected_table() {
        assert_eq!(NatClass::Public.ttl().as_secs(), 4 * 3600);
        assert_eq!(NatClass::FullCone.ttl().as_secs(), 2 * 3600);
        assert_eq!(NatClass::Restricted.ttl().as_secs(), 3600);
        assert_eq!(NatClass::Symmetric.ttl().as_secs(), 30 * 60);
    }
}
