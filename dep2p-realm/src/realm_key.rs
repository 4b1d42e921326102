// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

use dep2p_protocol::RealmId;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// 32 bytes of high-entropy secret, pre-shared symmetrically across every
/// member of a realm. Never leaves this crate: everything downstream only
/// ever sees the derived, non-secret [`RealmId`].
#[derive(Clone)]
pub struct RealmKey([u8; 32]);

impl RealmKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// `RealmID = H("dep2p-realm-id-v1" || H(RealmKey))`, split across
    /// crates so `dep2p-protocol` never has to depend on this type: we hash
    /// the key ourselves and hand `RealmId` the result.
    pub fn realm_id(&self) -> RealmId {
        let mut hasher = Sha256::new();
        hasher.update(self.0);
        let hashed_key = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hashed_key);
        RealmId::derive_from_hashed_key(&bytes)
    }
}

impl std::fmt::Debug for RealmKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealmKey").field("id", &self.realm_id()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejoin_same_key_yields_same_realm_id() {
        let key = RealmKey::from_bytes([0x11; 32]);
        let a = key.realm_id();
        let b = RealmKey::from_bytes([0x11; 32]).realm_id();
        assert_eq!(a, b);
    }

    #[test]
    fn different_keys_yield_different_realm_ids() {
        let a = RealmKey::from_bytes([0x11; 32]).realm_id();
        let b = RealmKey::from_bytes([0x22; 32]).realm_id();
        assert_ne!(a, b);
    }

    #[test]
    fn debug_never_prints_key_material() {
        let key = RealmKey::from_bytes([0x33; 32]);
        let rendered = format!("{key:?}");
        // The raw key's `Debug` array rendering ("[51, 51, ...]") cannot
        // appear in a hex-encoded RealmId (digits and lowercase a-f only).
        assert!(!rendered.contains("51, 51"));
    }
}
