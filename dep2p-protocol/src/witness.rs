// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

use dep2p_identity::KeyPair;
use libp2p_identity::PublicKey;
use serde::{Deserialize, Serialize};

use crate::{Error, NodeId, RealmId, Result};

/// How a witness observed a peer's disconnection. `QuicClose` is the only
/// high-confidence method (spec §3/§4.11); the rest are low-confidence and
/// feed the slow-path vote instead of an immediate fast-path eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionMethod {
    QuicClose,
    QuicTimeout,
    PingFailed,
    RelayCircuit,
}

impl DetectionMethod {
    pub fn is_high_confidence(self) -> bool {
        matches!(self, DetectionMethod::QuicClose)
    }

    fn marker(self) -> u8 {
        match self {
            DetectionMethod::QuicClose => 0,
            DetectionMethod::QuicTimeout => 1,
            DetectionMethod::PingFailed => 2,
            DetectionMethod::RelayCircuit => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmationType {
    Agree,
    Disagree,
    Abstain,
}

impl ConfirmationType {
    fn marker(self) -> u8 {
        match self {
            ConfirmationType::Agree => 0,
            ConfirmationType::Disagree => 1,
            ConfirmationType::Abstain => 2,
        }
    }
}

/// A signed claim by `witness` that `target` has disconnected, scoped to
/// `realm`. See spec §3 and §4.11 (the witness network, Layer 3 of
/// disconnect detection).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WitnessReport {
    report_id: [u8; 16],
    witness: NodeId,
    target: NodeId,
    realm: RealmId,
    detection_method: DetectionMethod,
    detected_at_ms: u64,
    reported_at_ms: u64,
    signature: Vec<u8>,
}

impl WitnessReport {
    pub fn sign_new(
        keypair: &KeyPair,
        report_id: [u8; 16],
        target: NodeId,
        realm: RealmId,
        detection_method: DetectionMethod,
        detected_at_ms: u64,
        reported_at_ms: u64,
    ) -> Result<Self> {
        let witness = keypair.node_id();
        let mut report = Self {
            report_id,
            witness,
            target,
            realm,
            detection_method,
            detected_at_ms,
            reported_at_ms,
            signature: Vec::new(),
        };
        report.signature = keypair.sign(&report.signable_bytes())?;
        Ok(report)
    }

    fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.report_id);
        buf.extend_from_slice(&self.witness.to_bytes());
        buf.extend_from_slice(&self.target.to_bytes());
        buf.extend_from_slice(self.realm.as_bytes());
        buf.push(self.detection_method.marker());
        buf.extend_from_slice(&self.detected_at_ms.to_be_bytes());
        buf.extend_from_slice(&self.reported_at_ms.to_be_bytes());
        buf
    }

    /// Verifies the signature against the witness's embedded public key and
    /// checks it hashes to `witness`.
    pub fn verify(&self, witness_public_key: &[u8]) -> Result<()> {
        let public_key =
            PublicKey::try_decode_protobuf(witness_public_key).map_err(|_| Error::SignatureInvalid)?;
        if NodeId::from_peer_id(public_key.to_peer_id()) != self.witness {
            return Err(Error::SignatureInvalid);
        }
        if !public_key.verify(&self.signable_bytes(), &self.signature) {
            return Err(Error::SignatureInvalid);
        }
        Ok(())
    }

    pub fn report_id(&self) -> [u8; 16] {
        self.report_id
    }

    pub fn witness(&self) -> NodeId {
        self.witness
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn realm(&self) -> RealmId {
        self.realm
    }

    pub fn detection_method(&self) -> DetectionMethod {
        self.detection_method
    }

    pub fn reported_at_ms(&self) -> u64 {
        self.reported_at_ms
    }

    /// True if a single AGREE/QUIC_CLOSE report should confirm removal
    /// immediately (fast path), given the realm's current member count.
    pub fn qualifies_for_fast_path(&self, realm_member_count: usize) -> bool {
        realm_member_count < 10 && self.detection_method.is_high_confidence()
    }
}

/// A confirmer's vote on a [`WitnessReport`], identified by `report_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WitnessConfirmation {
    report_id: [u8; 16],
    confirmer: NodeId,
    target: NodeId,
    vote: ConfirmationType,
    timestamp_ms: u64,
    signature: Vec<u8>,
}

impl WitnessConfirmation {
    pub fn sign_new(
        keypair: &KeyPair,
        report_id: [u8; 16],
        target: NodeId,
        vote: ConfirmationType,
        timestamp_ms: u64,
    ) -> Result<Self> {
        let confirmer = keypair.node_id();
        let mut confirmation = Self {
            report_id,
            confirmer,
            target,
            vote,
            timestamp_ms,
            signature: Vec::new(),
        };
        confirmation.signature = keypair.sign(&confirmation.signable_bytes())?;
        Ok(confirmation)
    }

    fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.report_id);
        buf.extend_from_slice(&self.confirmer.to_bytes());
        buf.extend_from_slice(&self.target.to_bytes());
        buf.push(self.vote.marker());
        buf.extend_from_slice(&self.timestamp_ms.to_be_bytes());
        buf
    }

    pub fn verify(&self, confirmer_public_key: &[u8]) -> Result<()> {
        let public_key = PublicKey::try_decode_protobuf(confirmer_public_key)
            .map_err(|_| Error::SignatureInvalid)?;
        if NodeId::from_peer_id(public_key.to_peer_id()) != self.confirmer {
            return Err(Error::SignatureInvalid);
        }
        if !public_key.verify(&self.signable_bytes(), &self.signature) {
            return Err(Error::SignatureInvalid);
        }
        Ok(())
    }

    pub fn report_id(&self) -> [u8; 16] {
        self.report_id
    }

    pub fn confirmer(&self) -> NodeId {
        self.confirmer
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn vote(&self) -> ConfirmationType {
        self.vote
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn realm() -> RealmId {
        RealmId::derive_from_hashed_key(&[1u8; 32])
    }

    #[test]
    fn quic_close_is_high_confidence_others_are_not() {
        assert!(DetectionMethod::QuicClose.is_high_confidence());
        assert!(!DetectionMethod::QuicTimeout.is_high_confidence());
        assert!(!DetectionMethod::PingFailed.is_high_confidence());
        assert!(!DetectionMethod::RelayCircuit.is_high_confidence());
    }

    #[test]
    fn report_sign_verify_round_trip() {
        let witness = KeyPair::generate();
        let target = KeyPair::generate().node_id();
        let report = WitnessReport::sign_new(
            &witness,
            [7u8; 16],
            target,
            realm(),
            DetectionMethod::QuicClose,
            1_000,
            1_050,
        )
        .expect("sign");
        let public = witness.as_libp2p_keypair().public().encode_protobuf();
        report.verify(&public).expect("verify");
    }

    #[test]
    fn fast_path_requires_small_realm_and_high_confidence() {
        let witness = KeyPair::generate();
        let target = KeyPair::generate().node_id();
        let report = WitnessReport::sign_new(
            &witness,
            [1u8; 16],
            target,
            realm(),
            DetectionMethod::QuicClose,
            0,
            0,
        )
        .expect("sign");
        assert!(report.qualifies_for_fast_path(9));
        assert!(!report.qualifies_for_fast_path(10));

        let slow_report = WitnessReport::sign_new(
            &witness,
            [2u8; 16],
            target,
            realm(),
            DetectionMethod::PingFailed,
            0,
            0,
        )
        .expect("sign");
        assert!(!slow_report.qualifies_for_fast_path(2));
    }
}
