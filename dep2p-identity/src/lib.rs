// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

#[macro_use]
extern crate tracing;

mod error;
mod keypair;
mod node_id;

pub use error::Error;
pub use keypair::KeyPair;
pub use node_id::NodeId;

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;
