// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

use thiserror::Error;

/// Errors surfaced by the identity boundary.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error while persisting key material: {0}")]
    Io(#[from] std::io::Error),

    #[error("key material at the given path is malformed")]
    MalformedKeyMaterial,

    #[error("decoding failed: {0}")]
    Decoding(#[from] libp2p_identity::DecodingError),

    #[error("signing operation failed")]
    SigningFailed,
}
