// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

//! Wire-level data shared between every layer of the dep2p core: multiaddr
//! helpers, the closed set of protocol-ID strings and namespace rules, and
//! the signed envelopes (`PeerRecord`, `WitnessReport`, `WitnessConfirmation`)
//! that travel the DHT and the witness network. Nothing in this crate spawns
//! a task or opens a socket — it is the shared vocabulary, the way
//! `sn_protocol` is the shared vocabulary beneath `sn_networking`.

#[macro_use]
extern crate tracing;

mod address_record;
mod dht_keys;
mod error;
mod member_leave;
mod multiaddr;
mod peer_record;
mod protocol_id;
mod realm_id;
mod witness;

pub use address_record::{
    AddressRecord, AddressSource, PRIORITY_LOCAL_LISTEN, PRIORITY_RELAY_GUARANTEED,
    PRIORITY_STUN_DISCOVERED, PRIORITY_UNVERIFIED, PRIORITY_USER_ADVERTISE,
    PRIORITY_VERIFIED_DIRECT, PUBLISHABLE_THRESHOLD,
};
pub use dht_keys::{global_node_key, member_sync_topic, members_provider_key, peer_record_key};
pub use error::Error;
pub use member_leave::{LeaveReason, MemberLeave, FRESHNESS_WINDOW};
pub use multiaddr::{DialAddress, FullAddress};
pub use peer_record::{NatClass, PeerRecord, Reachability};
pub use protocol_id::{
    app_protocol, extract_realm_segment, is_reserved_prefix, realm_auth_protocol, realm_protocol,
    realm_sync_protocol, sys,
};
pub use realm_id::RealmId;
pub use witness::{ConfirmationType, DetectionMethod, WitnessConfirmation, WitnessReport};

pub use dep2p_identity::NodeId;

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;
