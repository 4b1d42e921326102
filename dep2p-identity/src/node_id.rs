// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

use std::fmt;

use libp2p_identity::PeerId;
use sha2::{Digest, Sha256};

/// A self-certifying peer identifier: `NodeId == H(public_key)`.
///
/// libp2p's own [`PeerId`] already has this property (it is a multihash of
/// the public key's protobuf encoding), so `NodeId` is a thin newtype rather
/// than a parallel hashing scheme. Keeping the two in lockstep means every
/// lower layer (`Swarm`, `identify`, `kad`) can hand us a `PeerId` and we
/// never need to re-derive or re-verify it ourselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(PeerId);

impl NodeId {
    pub fn from_peer_id(peer_id: PeerId) -> Self {
        Self(peer_id)
    }

    pub fn as_peer_id(&self) -> &PeerId {
        &self.0
    }

    pub fn to_bytes(self) -> Vec<u8> {
        self.0.to_bytes()
    }

    /// A fixed 32-byte digest of this id, for wire formats that need a
    /// constant-width field (e.g. the Realm `MembershipProof`). `PeerId`'s
    /// own byte encoding is not fixed-width across key types, so this is
    /// `SHA-256(peer_id.to_bytes())` rather than the `PeerId` bytes
    /// themselves.
    pub fn digest32(self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.0.to_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        bytes
    }
}

impl From<PeerId> for NodeId {
    fn from(peer_id: PeerId) -> Self {
        Self(peer_id)
    }
}

impl From<NodeId> for PeerId {
    fn from(node_id: NodeId) -> Self {
        node_id.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KeyPair;

    #[test]
    fn node_id_is_deterministic_for_same_keypair() {
        let keypair = KeyPair::generate();
        let a = keypair.node_id();
        let b = keypair.node_id();
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_keypairs_yield_distinct_node_ids() {
        let a = KeyPair::generate().node_id();
        let b = KeyPair::generate().node_id();
        assert_ne!(a, b);
    }

    #[test]
    fn round_trip_display_is_stable() {
        let id = KeyPair::generate().node_id();
        let rendered = id.to_string();
        // NodeId/PeerId rendering is base58 and carries no hidden state; the
        // same id always renders identically.
        assert_eq!(rendered, id.to_string());
    }

    #[test]
    fn digest32_is_deterministic_and_distinguishes_ids() {
        let a = KeyPair::generate().node_id();
        let b = KeyPair::generate().node_id();
        assert_eq!(a.digest32(), a.digest32());
        assert_ne!(a.digest32(), b.digest32());
    }
}
