// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

use dep2p_protocol::{NodeId, RealmId};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{Error, Result};
use crate::realm_key::RealmKey;

const PSK_DOMAIN: &[u8] = b"dep2p-realm-psk-v1";
const VALIDITY_WINDOW_MS: u64 = 5 * 60 * 1000;

/// Wire length: `NodeID(32) || RealmID(32) || peer_id(32) || nonce(16) ||
/// timestamp_ms(8) || mac(32)`.
const WIRE_LEN: usize = 32 + 32 + 32 + 16 + 8 + 32;

/// `(NodeID, RealmID, peer_id, nonce, timestamp_ms, mac)`. `peer_id` binds
/// the proof to the specific verifier it was generated for, so a captured
/// proof cannot be replayed against a different member.
#[derive(Debug, Clone)]
pub struct MembershipProof {
    prover_digest: [u8; 32],
    realm_id: RealmId,
    peer_digest: [u8; 32],
    nonce: [u8; 16],
    timestamp_ms: u64,
    mac: [u8; 32],
}

type HmacSha256 = Hmac<Sha256>;

fn derive_psk_mac_key(realm_key: &RealmKey) -> Result<[u8; 32]> {
    let hkdf = Hkdf::<Sha256>::new(None, realm_key.as_bytes());
    let mut mac_key = [0u8; 32];
    hkdf.expand(PSK_DOMAIN, &mut mac_key)
        .map_err(|_| Error::KeyDerivationFailed("HKDF expand failed for realm PSK".into()))?;
    Ok(mac_key)
}

fn signable_bytes(
    prover_digest: &[u8; 32],
    realm_id: RealmId,
    peer_digest: &[u8; 32],
    nonce: &[u8; 16],
    timestamp_ms: u64,
) -> [u8; WIRE_LEN - 32] {
    let mut buf = [0u8; WIRE_LEN - 32];
    buf[0..32].copy_from_slice(prover_digest);
    buf[32..64].copy_from_slice(realm_id.as_bytes());
    buf[64..96].copy_from_slice(peer_digest);
    buf[96..112].copy_from_slice(nonce);
    buf[112..120].copy_from_slice(&timestamp_ms.to_be_bytes());
    buf
}

impl MembershipProof {
    /// Generates a proof that `prover` is a member of `realm`, scoped to be
    /// verified by `verifier` only.
    pub fn generate(
        realm_key: &RealmKey,
        prover: NodeId,
        realm_id: RealmId,
        verifier: NodeId,
        now_ms: u64,
    ) -> Result<Self> {
        let mut nonce = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce);

        let prover_digest = prover.digest32();
        let peer_digest = verifier.digest32();
        let mac_key = derive_psk_mac_key(realm_key)?;

        let mut mac_fn = HmacSha256::new_from_slice(&mac_key)
            .map_err(|_| Error::KeyDerivationFailed("HMAC key of wrong length".into()))?;
        mac_fn.update(&signable_bytes(
            &prover_digest,
            realm_id,
            &peer_digest,
            &nonce,
            now_ms,
        ));
        let mac_bytes = mac_fn.finalize().into_bytes();
        let mut mac = [0u8; 32];
        mac.copy_from_slice(&mac_bytes);

        Ok(Self {
            prover_digest,
            realm_id,
            peer_digest,
            nonce,
            timestamp_ms: now_ms,
            mac,
        })
    }

    /// Verifies the proof was generated for `expected_realm`, addressed to
    /// `own_node_id`, within the 5-minute validity window of `now_ms`, and
    /// carries a MAC matching `realm_key` — all four checks spec §4.10
    /// requires, in the order it lists them. The MAC compare is
    /// constant-time.
    pub fn verify(
        &self,
        realm_key: &RealmKey,
        own_node_id: NodeId,
        expected_realm: RealmId,
        now_ms: u64,
    ) -> Result<()> {
        if self.peer_digest != own_node_id.digest32() {
            return Err(Error::ProofPeerMismatch);
        }
        if self.realm_id != expected_realm {
            return Err(Error::ProofRealmMismatch);
        }
        let age = now_ms.abs_diff(self.timestamp_ms);
        if age >= VALIDITY_WINDOW_MS {
            return Err(Error::ProofExpired);
        }

        let mac_key = derive_psk_mac_key(realm_key)?;
        let mut mac_fn = HmacSha256::new_from_slice(&mac_key)
            .map_err(|_| Error::KeyDerivationFailed("HMAC key of wrong length".into()))?;
        mac_fn.update(&signable_bytes(
            &self.prover_digest,
            self.realm_id,
            &self.peer_digest,
            &self.nonce,
            self.timestamp_ms,
        ));
        let expected_mac = mac_fn.finalize().into_bytes();

        if expected_mac.as_slice().ct_eq(&self.mac).unwrap_u8() != 1 {
            return Err(Error::ProofInvalidMac);
        }
        Ok(())
    }

    pub fn prover_digest(&self) -> [u8; 32] {
        self.prover_digest
    }

    pub fn realm_id(&self) -> RealmId {
        self.realm_id
    }

    pub fn to_bytes(&self) -> [u8; WIRE_LEN] {
        let mut buf = [0u8; WIRE_LEN];
        buf[0..32].copy_from_slice(&self.prover_digest);
        buf[32..64].copy_from_slice(self.realm_id.as_bytes());
        buf[64..96].copy_from_slice(&self.peer_digest);
        buf[96..112].copy_from_slice(&self.nonce);
        buf[112..120].copy_from_slice(&self.timestamp_ms.to_be_bytes());
        buf[120..152].copy_from_slice(&self.mac);
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != WIRE_LEN {
            return Err(Error::MalformedProof);
        }
        let mut prover_digest = [0u8; 32];
        prover_digest.copy_from_slice(&bytes[0..32]);

        let mut realm_bytes = [0u8; 32];
        realm_bytes.copy_from_slice(&bytes[32..64]);
        let realm_id = RealmId::from_raw(realm_bytes);

        let mut peer_digest = [0u8; 32];
        peer_digest.copy_from_slice(&bytes[64..96]);

        let mut nonce = [0u8; 16];
        nonce.copy_from_slice(&bytes[96..112]);

        let mut ts_bytes = [0u8; 8];
        ts_bytes.copy_from_slice(&bytes[112..120]);
        let timestamp_ms = u64::from_be_bytes(ts_bytes);

        let mut mac = [0u8; 32];
        mac.copy_from_slice(&bytes[120..152]);

        Ok(Self {
            prover_digest,
            realm_id,
            peer_digest,
            nonce,
            timestamp_ms,
            mac,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_then_verify_succeeds() {
        let key = RealmKey::from_bytes([0x11; 32]);
        let realm = key.realm_id();
        let prover = dep2p_identity::KeyPair::generate().node_id();
        let verifier = dep2p_identity::KeyPair::generate().node_id();

        let proof = MembershipProof::generate(&key, prover, realm, verifier, 1_000_000).unwrap();
        proof.verify(&key, verifier, realm, 1_000_100).unwrap();
    }

    #[test]
    fn wrong_realm_key_fails_mac() {
        let key = RealmKey::from_bytes([0x11; 32]);
        let other_key = RealmKey::from_bytes([0x22; 32]);
        let realm = key.realm_id();
        let prover = dep2p_identity::KeyPair::generate().node_id();
        let verifier = dep2p_identity::KeyPair::generate().node_id();

        let proof = MembershipProof::generate(&key, prover, realm, verifier, 1_000_000).unwrap();
        let err = proof.verify(&other_key, verifier, realm, 1_000_100).unwrap_err();
        assert!(matches!(err, Error::ProofInvalidMac));
    }

    #[test]
    fn expired_proof_is_rejected() {
        let key = RealmKey::from_bytes([0x11; 32]);
        let realm = key.realm_id();
        let prover = dep2p_identity::KeyPair::generate().node_id();
        let verifier = dep2p_identity::KeyPair::generate().node_id();

        let proof = MembershipProof::generate(&key, prover, realm, verifier, 1_000_000).unwrap();
        let err = proof
            .verify(&key, verifier, realm, 1_000_000 + VALIDITY_WINDOW_MS + 1)
            .unwrap_err();
        assert!(matches!(err, Error::ProofExpired));
    }

    #[test]
    fn wrong_verifier_cannot_consume_proof() {
        let key = RealmKey::from_bytes([0x11; 32]);
        let realm = key.realm_id();
        let prover = dep2p_identity::KeyPair::generate().node_id();
        let verifier = dep2p_identity::KeyPair::generate().node_id();
        let bystander = dep2p_identity::KeyPair::generate().node_id();

        let proof = MembershipProof::generate(&key, prover, realm, verifier, 1_000_000).unwrap();
        let err = proof.verify(&key, bystander, realm, 1_000_100).unwrap_err();
        assert!(matches!(err, Error::ProofPeerMismatch));
    }

    #[test]
    fn to_bytes_from_bytes_round_trips_mac() {
        let key = RealmKey::from_bytes([0x11; 32]);
        let realm = key.realm_id();
        let prover = dep2p_identity::KeyPair::generate().node_id();
        let verifier = dep2p_identity::KeyPair::generate().node_id();

        let proof = MembershipProof::generate(&key, prover, realm, verifier, 1_000_000).unwrap();
        let bytes = proof.to_bytes();
        let decoded = MembershipProof::from_bytes(&bytes).unwrap();
        decoded.verify(&key, verifier, realm, 1_000_100).unwrap();
    }
}
