// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

//! Relay circuits (§4.8): client-side candidate tracking (`manager`) and
//! server-side forwarding policy (`server`).

mod manager;
mod server;

pub use manager::RelayManager;
pub use server::{classify_circuit, RelayAdmission, RelayAnomalyTracker, SYSTEM_RELAY_BYTES_PER_SEC, SYSTEM_RELAY_MAX_DURATION};
