// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

//! Protocol Router (§4.12): enforces the three-namespace boundary on every
//! inbound stream before it reaches application code. `/dep2p/sys/*` is
//! unconditional; `/dep2p/realm/*` and `/dep2p/app/*` require the remote to
//! be a verified member of the realm named in the path.

use dep2p_identity::NodeId;
use dep2p_protocol::is_reserved_prefix;
use dep2p_realm::RealmSlot;

use crate::error::{Error, Result};

/// Gatekeeper consulted by the Swarm's inbound-stream demux before handing
/// a stream to its protocol handler.
pub struct ProtocolRouter<'a> {
    realm: &'a RealmSlot,
}

impl<'a> ProtocolRouter<'a> {
    pub fn new(realm: &'a RealmSlot) -> Self {
        Self { realm }
    }

    /// Registers a user-facing protocol suffix under the currently joined
    /// realm's `/dep2p/app/<realm>/` namespace. Fails if no realm is
    /// joined, or if `user_protocol` itself collides with a reserved
    /// prefix.
    pub fn register_app_protocol(&self, user_protocol: &str) -> Result<String> {
        let realm_id = self.realm.current_realm_id().ok_or(dep2p_realm::Error::NotInRealm)?;
        Ok(dep2p_protocol::app_protocol(realm_id, user_protocol)?)
    }

    /// Validates a literal protocol ID a caller wants to register directly
    /// (not auto-prefixed). Registering anything under `/dep2p/sys/` or
    /// `/dep2p/realm/` by hand is `ErrReservedProtocol`.
    pub fn validate_custom_registration(protocol: &str) -> Result<()> {
        if is_reserved_prefix(protocol) {
            return Err(Error::ReservedProtocol(protocol.to_string()));
        }
        Ok(())
    }

    /// Decides whether an inbound stream for `protocol` from `remote`
    /// should be delivered. System protocols pass unconditionally; realm-
    /// and app-scoped protocols require `remote` to be a verified member of
    /// the realm segment embedded in the path, and that realm must be the
    /// one currently joined (no cross-realm delivery).
    pub async fn admit_inbound_stream(&self, protocol: &str, remote: &NodeId) -> Result<()> {
        if protocol.starts_with(dep2p_protocol::sys::IDENTIFY)
            || protocol.starts_with(dep2p_protocol::sys::PING)
            || protocol == dep2p_protocol::sys::IDENTIFY_PUSH
            || protocol == dep2p_protocol::sys::DHT
            || protocol == dep2p_protocol::sys::AUTONAT
            || protocol == dep2p_protocol::sys::HOLEPUNCH
            || protocol == dep2p_protocol::sys::RELAY_HOP
            || protocol == dep2p_protocol::sys::RELAY_STOP
        {
            return Ok(());
        }

        let Some(segment) = dep2p_protocol::extract_realm_segment(protocol) else {
            // Not a recognized namespace at all; treat conservatively as
            // requiring membership rather than silently admitting it.
            return Err(Error::NotMember);
        };

        let current = self.realm.current_realm_id().ok_or(dep2p_realm::Error::NotInRealm)?;
        if segment != current.to_hex() {
            return Err(Error::CrossRealmProtocol);
        }

        if !self.realm.is_member(remote).await? {
            return Err(Error::NotMember);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dep2p_realm::RealmKey;

    fn node() -> NodeId {
        dep2p_identity::KeyPair::generate().node_id()
    }

    #[tokio::test]
    async fn sys_protocol_always_admitted() {
        let slot = RealmSlot::new(node());
        let router = ProtocolRouter::new(&slot);
        router
            .admit_inbound_stream(dep2p_protocol::sys::PING, &node())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn realm_protocol_rejected_when_not_joined() {
        let slot = RealmSlot::new(node());
        let router = ProtocolRouter::new(&slot);
        let id = RealmKey::generate().realm_id();
        let proto = dep2p_protocol::realm_auth_protocol(id);
        let err = router.admit_inbound_stream(&proto, &node()).await.unwrap_err();
        assert!(matches!(err, Error::Realm(dep2p_realm::Error::NotInRealm)));
    }

    #[tokio::test]
    async fn app_protocol_rejected_for_non_member() {
        let own = node();
        let slot = RealmSlot::new(own);
        let key = RealmKey::generate();
        slot.join(key).unwrap();
        let realm_id = slot.current_realm_id().unwrap();
        let router = ProtocolRouter::new(&slot);

        let proto = dep2p_protocol::app_protocol(realm_id, "chat/1.0.0").unwrap();
        let err = router.admit_inbound_stream(&proto, &node()).await.unwrap_err();
        assert!(matches!(err, Error::NotMember));
    }

    #[tokio::test]
    async fn app_protocol_admitted_for_verified_member() {
        let own = node();
        let slot = RealmSlot::new(own);
        let key = RealmKey::generate();
        let realm_id = slot.join(key.clone()).unwrap();
        let router = ProtocolRouter::new(&slot);

        let member = node();
        let proof = dep2p_realm::MembershipProof::generate(&key, member, realm_id, own, 1).unwrap();
        slot.admit(&proof, member, 1).await.unwrap();

        let proto = dep2p_protocol::app_protocol(realm_id, "chat/1.0.0").unwrap();
        router.admit_inbound_stream(&proto, &member).await.unwrap();
    }

    #[test]
    fn custom_registration_rejects_reserved_prefix() {
        let err = ProtocolRouter::validate_custom_registration("/dep2p/sys/ping/1.0.0").unwrap_err();
        assert!(matches!(err, Error::ReservedProtocol(_)));
    }
}
