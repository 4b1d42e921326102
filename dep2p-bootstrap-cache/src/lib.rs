// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

//! On-disk persistence for the Address Book (spec §4.6).
//!
//! The DHT `PeerRecord` is authoritative; this crate is the local,
//! non-authoritative cache consulted on DHT miss or timeout, and the seed
//! handed to the dialer on process start before any lookup has run. It
//! shares the `maidsafe-safe_network` bootstrap cache's file-locking and
//! atomic-write discipline for safe concurrent access across processes
//! sharing a data directory (e.g. a node and a client on the same host).

#[macro_use]
extern crate tracing;

mod cache_store;
mod config;
mod error;

pub use cache_store::{BootstrapCacheStore, CachedAddr};
pub use config::CacheConfig;
pub use error::{Error, Result};
