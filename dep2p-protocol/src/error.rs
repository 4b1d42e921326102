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
    #[error("multiaddr is missing a /p2p/<NodeId> tail")]
    MissingPeerIdTail,

    #[error("multiaddr could not be parsed: {0}")]
    InvalidMultiaddr(#[from] libp2p::multiaddr::Error),

    #[error("could not craft a relay-circuit address from the given multiaddr")]
    CannotCraftRelayAddress,

    #[error("signature verification failed")]
    SignatureInvalid,

    #[error("signing failed: {0}")]
    SigningFailed(#[from] dep2p_identity::Error),

    #[error("record sequence number did not increase: previous {previous}, got {got}")]
    StaleSequenceNumber { previous: u64, got: u64 },

    #[error("record has expired")]
    RecordExpired,

    #[error("(de)serialization failed: {0}")]
    Codec(#[from] rmp_serde::encode::Error),

    #[error("deserialization failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("protocol prefix {0:?} is reserved and cannot be registered by applications")]
    ReservedProtocol(String),
}
