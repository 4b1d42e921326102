// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

//! PSK-derived Realm namespace isolation.
//!
//! A Realm is a logical overlay keyed by a pre-shared secret
//! ([`RealmKey`]): nodes holding the same key derive the same
//! [`dep2p_protocol::RealmId`], can mint [`MembershipProof`]s the rest of
//! the realm will accept, and are otherwise invisible to each other. A node
//! holds at most one realm at a time; [`RealmSlot`] is the enforcement
//! point for that invariant and the home of the realm's member set.

#[macro_use]
extern crate tracing;

mod error;
mod member_set;
mod membership_proof;
mod realm;
mod realm_key;

pub use error::{Error, Result};
pub use member_set::MemberSet;
pub use membership_proof::MembershipProof;
pub use realm::{MemberJoined, MemberLeft, RealmEvent, RealmSlot};
pub use realm_key::RealmKey;
