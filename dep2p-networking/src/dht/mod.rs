// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

//! DHT record layer (§4.9): signed, `seq`-ordered `PeerRecord`s keyed by
//! Realm-hash, stored over a `kad::store::MemoryStore`-style accept/
//! supersede rule rather than a content-addressed chunk store.

mod record_store;

pub use record_store::PeerRecordStore;
