// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

//! Realm-gated request/response messaging (§4.10): a `Request` carries a
//! protocol ID and payload bytes, a `Response` carries either the reply
//! bytes or a rejection reason. The wire shape is intentionally thin —
//! dep2p ships bytes, not a fixed message catalogue, since it has no
//! storage-specific command set to encode.

use dep2p_protocol::RealmId;
use serde::{Deserialize, Serialize};

use crate::protocol_router::ProtocolRouter;
use crate::Error;

/// An outbound/inbound request over the request-response behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub protocol: String,
    pub realm: Option<RealmId>,
    pub payload: Vec<u8>,
}

/// A reply to a `Request`: either the handler's bytes, or a rejection
/// naming why (e.g. the sender was not a verified realm member).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    Ok(Vec<u8>),
    Rejected(String),
}

/// Checks an inbound `Request` against the protocol router before it is
/// handed to application code, producing the rejection `Response` to send
/// back if admission fails.
pub async fn admit_or_reject(
    router: &ProtocolRouter<'_>,
    request: &Request,
    remote: &dep2p_identity::NodeId,
) -> Result<(), Response> {
    match router.admit_inbound_stream(&request.protocol, remote).await {
        Ok(()) => Ok(()),
        Err(err) => Err(Response::Rejected(rejection_reason(&err))),
    }
}

fn rejection_reason(err: &Error) -> String {
    err.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dep2p_identity::KeyPair;
    use dep2p_realm::RealmSlot;

    #[tokio::test]
    async fn sys_protocol_request_bypasses_realm_check() {
        let slot = RealmSlot::new(KeyPair::generate().node_id());
        let router = ProtocolRouter::new(&slot);
        let request = Request {
            protocol: dep2p_protocol::sys::IDENTIFY.to_string(),
            realm: None,
            payload: vec![],
        };
        let remote = KeyPair::generate().node_id();
        assert!(admit_or_reject(&router, &request, &remote).await.is_ok());
    }

    #[tokio::test]
    async fn app_protocol_request_without_membership_is_rejected() {
        let slot = RealmSlot::new(KeyPair::generate().node_id());
        let router = ProtocolRouter::new(&slot);
        let realm_id = RealmId::derive_from_hashed_key(&[9u8; 32]);
        let request = Request {
            protocol: dep2p_protocol::app_protocol(realm_id, "chat").unwrap(),
            realm: Some(realm_id),
            payload: vec![],
        };
        let remote = KeyPair::generate().node_id();
        assert!(admit_or_reject(&router, &request, &remote).await.is_err());
    }
}
