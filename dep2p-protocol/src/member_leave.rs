// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

use std::time::Duration;

use libp2p_identity::PublicKey;
use serde::{Deserialize, Serialize};

use dep2p_identity::KeyPair;

use crate::{Error, NodeId, RealmId, Result};

/// Layer 2 of disconnect detection (spec §4.11): published to a realm's
/// member-sync topic on graceful shutdown, so members don't have to wait
/// out the slower witness vote for the common case of a node leaving on
/// purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaveReason {
    /// The node is shutting down or leaving the realm deliberately.
    Graceful,
    /// The node was evicted by the witness network or an operator and is
    /// announcing its own removal rather than leave silently.
    Kicked,
    /// Published on behalf of a peer that the witness network already
    /// confirmed gone, to speed up convergence among members who haven't
    /// seen the vote outcome yet.
    Witness,
}

/// Freshness window within which a consumer accepts a `MemberLeave`; older
/// messages are dropped rather than applied out of order (spec §4.11
/// ordering guarantee (c)).
pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(30);

/// A signed announcement that `leaving` is no longer part of `realm`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberLeave {
    leaving: NodeId,
    realm: RealmId,
    reason: LeaveReason,
    timestamp_ms: u64,
    signature: Vec<u8>,
}

impl MemberLeave {
    /// Signs a new announcement. For `Graceful`, `keypair` is the leaving
    /// node's own identity; for `Kicked`/`Witness`, it is whichever member
    /// is relaying the outcome on the departed peer's behalf; either way
    /// the signature only attests to the announcement, not to the leaving
    /// node's consent.
    pub fn sign_new(
        keypair: &KeyPair,
        leaving: NodeId,
        realm: RealmId,
        reason: LeaveReason,
        timestamp_ms: u64,
    ) -> Result<Self> {
        let mut msg = Self {
            leaving,
            realm,
            reason,
            timestamp_ms,
            signature: Vec::new(),
        };
        msg.signature = keypair.sign(&msg.signable_bytes())?;
        Ok(msg)
    }

    fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.leaving.to_bytes());
        buf.extend_from_slice(self.realm.as_bytes());
        buf.push(self.reason.marker());
        buf.extend_from_slice(&self.timestamp_ms.to_be_bytes());
        buf
    }

    /// Verifies the signature against the publisher's public key and the
    /// 30s freshness window, anchored to `now_ms`. Does not check realm
    /// membership of the publisher — callers that only trust self-reported
    /// `Graceful` leaves should additionally check `publisher == leaving`.
    pub fn verify(&self, publisher_public_key: &[u8], now_ms: u64) -> Result<()> {
        if now_ms.saturating_sub(self.timestamp_ms) > FRESHNESS_WINDOW.as_millis() as u64 {
            return Err(Error::RecordExpired);
        }
        let public_key = PublicKey::try_decode_protobuf(publisher_public_key)
            .map_err(|_| Error::SignatureInvalid)?;
        if !public_key.verify(&self.signable_bytes(), &self.signature) {
            return Err(Error::SignatureInvalid);
        }
        Ok(())
    }

    pub fn leaving(&self) -> NodeId {
        self.leaving
    }

    pub fn realm(&self) -> RealmId {
        self.realm
    }

    pub fn reason(&self) -> LeaveReason {
        self.reason
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }
}

impl LeaveReason {
    fn marker(self) -> u8 {
        match self {
            LeaveReason::Graceful => 0,
            LeaveReason::Kicked => 1,
            LeaveReason::Witness => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn realm() -> RealmId {
        RealmId::derive_from_hashed_key(&[5u8; 32])
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let keypair = KeyPair::generate();
        let leaving = keypair.node_id();
        let msg = MemberLeave::sign_new(&keypair, leaving, realm(), LeaveReason::Graceful, 1_000).unwrap();
        let public = keypair.as_libp2p_keypair().public().encode_protobuf();
        msg.verify(&public, 1_000).unwrap();
    }

    #[test]
    fn stale_message_is_rejected() {
        let keypair = KeyPair::generate();
        let leaving = keypair.node_id();
        let msg = MemberLeave::sign_new(&keypair, leaving, realm(), LeaveReason::Graceful, 1_000).unwrap();
        let public = keypair.as_libp2p_keypair().public().encode_protobuf();
        let far_future = 1_000 + FRESHNESS_WINDOW.as_millis() as u64 + 1;
        assert!(msg.verify(&public, far_future).is_err());
    }

    #[test]
    fn tampered_reason_fails_verification() {
        let keypair = KeyPair::generate();
        let leaving = keypair.node_id();
        let mut msg = MemberLeave::sign_new(&keypair, leaving, realm(), LeaveReason::Graceful, 1_000).unwrap();
        msg.reason = LeaveReason::Kicked;
        let public = keypair.as_libp2p_keypair().public().encode_protobuf();
        assert!(msg.verify(&public, 1_000).is_err());
    }
}
