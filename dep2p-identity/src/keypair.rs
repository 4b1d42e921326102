// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

use std::path::Path;

use libp2p_identity::Keypair;
use tracing::info;

use crate::{node_id::NodeId, Error, Result};

/// Process-long Ed25519 key material. The private key never leaves this
/// boundary: callers only ever get a [`NodeId`] or a signature/verification
/// result back out.
#[derive(Clone)]
pub struct KeyPair {
    inner: Keypair,
}

impl KeyPair {
    /// Generates a fresh Ed25519 keypair.
    pub fn generate() -> Self {
        Self {
            inner: Keypair::generate_ed25519(),
        }
    }

    /// Returns the self-certifying [`NodeId`] derived from the public key.
    pub fn node_id(&self) -> NodeId {
        NodeId::from_peer_id(self.inner.public().to_peer_id())
    }

    /// Signs `bytes` with the private key.
    pub fn sign(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        self.inner.sign(bytes).map_err(|_| Error::SigningFailed)
    }

    /// Verifies a signature over `bytes` against the given public key's
    /// protobuf encoding.
    pub fn verify(public_key_bytes: &[u8], bytes: &[u8], signature: &[u8]) -> Result<bool> {
        let public_key = libp2p_identity::PublicKey::try_decode_protobuf(public_key_bytes)?;
        Ok(public_key.verify(bytes, signature))
    }

    /// Exposes the underlying libp2p keypair for use by the transport layer,
    /// which needs it to run the Noise/TLS handshake and to seed `PeerId`.
    pub fn as_libp2p_keypair(&self) -> &Keypair {
        &self.inner
    }

    /// Loads a previously persisted keypair (protobuf-encoded) from disk.
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let inner = Keypair::from_protobuf_encoding(&bytes).map_err(|_| Error::MalformedKeyMaterial)?;
        Ok(Self { inner })
    }

    /// Persists this keypair (protobuf-encoded) to disk. Callers are
    /// responsible for restricting file permissions on the destination.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let bytes = self
            .inner
            .to_protobuf_encoding()
            .map_err(|_| Error::MalformedKeyMaterial)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    /// Loads the keypair at `path` if present, otherwise generates a new one
    /// and persists it — the common "first run" path for a long-lived node.
    pub async fn load_or_generate(path: &Path) -> Result<Self> {
        match Self::load(path).await {
            Ok(keypair) => Ok(keypair),
            Err(Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("No identity found at {path:?}, generating a new one");
                let keypair = Self::generate();
                keypair.save(path).await?;
                Ok(keypair)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let keypair = KeyPair::generate();
        let msg = b"dep2p";
        let sig = keypair.sign(msg).expect("sign");
        let public = keypair.as_libp2p_keypair().public().encode_protobuf();
        assert!(KeyPair::verify(&public, msg, &sig).expect("verify"));
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let keypair = KeyPair::generate();
        let sig = keypair.sign(b"dep2p").expect("sign");
        let public = keypair.as_libp2p_keypair().public().encode_protobuf();
        assert!(!KeyPair::verify(&public, b"tampered", &sig).expect("verify"));
    }

    #[tokio::test]
    async fn load_or_generate_persists_across_calls() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("identity.key");

        let first = KeyPair::load_or_generate(&path).await.expect("first");
        let second = KeyPair::load_or_generate(&path).await.expect("second");

        assert_eq!(first.node_id(), second.node_id());
    }
}
