// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

use crate::{Error, RealmId, Result};

/// System protocol IDs: always allowed, no Realm requirement.
pub mod sys {
    pub const IDENTIFY: &str = "/dep2p/sys/identify/1.0.0";
    pub const IDENTIFY_PUSH: &str = "/dep2p/sys/identify/push/1.0.0";
    pub const PING: &str = "/dep2p/sys/ping/1.0.0";
    pub const RELAY_HOP: &str = "/dep2p/relay/1.0.0/hop";
    pub const RELAY_STOP: &str = "/dep2p/relay/1.0.0/stop";
    pub const DHT: &str = "/dep2p/sys/dht/1.0.0";
    pub const AUTONAT: &str = "/dep2p/sys/autonat/1.0.0";
    pub const HOLEPUNCH: &str = "/dep2p/sys/holepunch/1.0.0";
}

/// Security/muxer protocol IDs negotiated by the Upgrader on the TCP path.
pub mod security {
    pub const TLS: &str = "/tls/1.0.0";
    pub const NOISE: &str = "/noise";
}

pub const YAMUX: &str = "/yamux/1.0.0";

const REALM_PREFIX: &str = "/dep2p/realm/";
const APP_PREFIX: &str = "/dep2p/app/";
const SYS_PREFIX: &str = "/dep2p/sys/";

/// `/dep2p/realm/<realmID>/auth/1.0.0`
pub fn realm_auth_protocol(realm: RealmId) -> String {
    format!("{REALM_PREFIX}{realm}/auth/1.0.0")
}

/// `/dep2p/realm/<realmID>/sync/1.0.0`
pub fn realm_sync_protocol(realm: RealmId) -> String {
    format!("{REALM_PREFIX}{realm}/sync/1.0.0")
}

/// Generic `/dep2p/realm/<realmID>/<suffix>` builder, for protocols beyond
/// auth/sync (e.g. the member-leave broadcast channel).
pub fn realm_protocol(realm: RealmId, suffix: &str) -> String {
    format!("{REALM_PREFIX}{realm}/{suffix}")
}

/// `/dep2p/app/<realmID>/<user-protocol>`. Rejects a `user_protocol` whose
/// literal value is itself one of the reserved prefixes: registering
/// `/dep2p/sys/foo` or `/dep2p/realm/foo` as a user-facing "app protocol" is
/// `ErrReservedProtocol`, not a namespace escape.
pub fn app_protocol(realm: RealmId, user_protocol: &str) -> Result<String> {
    if is_reserved_prefix(user_protocol) {
        return Err(Error::ReservedProtocol(user_protocol.to_string()));
    }
    Ok(format!("{APP_PREFIX}{realm}/{user_protocol}"))
}

/// True if `protocol` begins with a reserved system or realm prefix.
/// Registering a user protocol whose literal prefix matches this is
/// `ErrReservedProtocol`.
pub fn is_reserved_prefix(protocol: &str) -> bool {
    protocol.starts_with(SYS_PREFIX) || protocol.starts_with(REALM_PREFIX)
}

/// Returns the [`RealmId`]-hex segment of a `/dep2p/realm/<id>/...` or
/// `/dep2p/app/<id>/...` protocol path, if present. Used by the Protocol
/// Router to decide which realm's membership to consult.
pub fn extract_realm_segment(protocol: &str) -> Option<&str> {
    let rest = protocol
        .strip_prefix(REALM_PREFIX)
        .or_else(|| protocol.strip_prefix(APP_PREFIX))?;
    rest.split('/').next().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn realm() -> RealmId {
        RealmId::derive_from_hashed_key(&[3u8; 32])
    }

    #[test]
    fn sys_protocols_never_reserved_reject_themselves() {
        assert!(is_reserved_prefix(sys::IDENTIFY));
        assert!(is_reserved_prefix(sys::PING));
    }

    #[test]
    fn realm_scoped_protocols_are_reserved() {
        let id = realm();
        assert!(is_reserved_prefix(&realm_auth_protocol(id)));
    }

    #[test]
    fn app_protocol_rejects_reserved_literal() {
        let id = realm();
        let err = app_protocol(id, "/dep2p/sys/ping/1.0.0").unwrap_err();
        assert!(matches!(err, Error::ReservedProtocol(_)));
    }

    #[test]
    fn app_protocol_accepts_ordinary_user_protocol() {
        let id = realm();
        let built = app_protocol(id, "chat/1.0.0").expect("ok");
        assert_eq!(built, format!("/dep2p/app/{id}/chat/1.0.0"));
    }

    #[test]
    fn extract_realm_segment_finds_hex_id() {
        let id = realm();
        let built = app_protocol(id, "chat/1.0.0").expect("ok");
        assert_eq!(extract_realm_segment(&built), Some(id.to_hex()).as_deref());
    }

    #[test]
    fn extract_realm_segment_is_none_for_sys() {
        assert_eq!(extract_realm_segment(sys::PING), None);
    }
}
