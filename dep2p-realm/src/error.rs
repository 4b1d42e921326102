// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Already in a realm; leave it before joining another")]
    AlreadyInRealm,
    #[error("Not currently in a realm")]
    NotInRealm,
    #[error("Membership proof has expired or is not yet valid")]
    ProofExpired,
    #[error("Membership proof is for a different realm")]
    ProofRealmMismatch,
    #[error("Membership proof's peer_id does not match this verifier")]
    ProofPeerMismatch,
    #[error("Membership proof MAC does not verify")]
    ProofInvalidMac,
    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),
    #[error("Malformed membership proof bytes")]
    MalformedProof,
}

pub type Result<T> = std::result::Result<T, Error>;
