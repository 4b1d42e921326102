// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// `RealmId = H("dep2p-realm-id-v1" || H(RealmKey))`.
///
/// The RealmKey itself (the 32-byte pre-shared secret) lives in
/// `dep2p-realm`, which is the only crate allowed to see it; this type is
/// the public, derived, non-secret identifier everything else — protocol
/// paths, DHT keys, PubSub topics — is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RealmId([u8; 32]);

const REALM_ID_DOMAIN: &[u8] = b"dep2p-realm-id-v1";

impl RealmId {
    /// Derives a `RealmId` from `H(RealmKey)` (the caller hashes the raw key
    /// first so this type never has to depend on `dep2p-realm`'s secret
    /// type).
    pub fn derive_from_hashed_key(hashed_key: &[u8; 32]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(REALM_ID_DOMAIN);
        hasher.update(hashed_key);
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Reconstructs a `RealmId` from bytes already known to be a valid
    /// derived id (e.g. decoding one off the wire). Does not re-derive or
    /// validate — callers that have raw `RealmKey` material should go
    /// through `RealmKey::realm_id()` in `dep2p-realm` instead.
    pub fn from_raw(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    /// `H(RealmId)`, used as the DHT key namespace component — deliberately
    /// distinct from the raw `RealmId` used in PubSub topics (§4.9: the two
    /// namespaces must never be conflated).
    pub fn dht_namespace_hash(self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.0);
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        bytes
    }
}

impl fmt::Display for RealmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_hashed_key_yields_same_realm_id() {
        let hashed = [7u8; 32];
        assert_eq!(
            RealmId::derive_from_hashed_key(&hashed),
            RealmId::derive_from_hashed_key(&hashed)
        );
    }

    #[test]
    fn different_keys_yield_different_realm_ids() {
        let a = RealmId::derive_from_hashed_key(&[1u8; 32]);
        let b = RealmId::derive_from_hashed_key(&[2u8; 32]);
        assert_ne!(a, b);
    }

    #[test]
    fn dht_namespace_hash_differs_from_raw_id() {
        let id = RealmId::derive_from_hashed_key(&[9u8; 32]);
        assert_ne!(id.as_bytes(), &id.dht_namespace_hash());
    }
}
