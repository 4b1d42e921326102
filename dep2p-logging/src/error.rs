// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("a tracing subscriber is already installed for this process")]
    SubscriberAlreadyInstalled,

    #[error("invalid DEP2P_LOG target spec entry: {0:?}, expected `target=level`")]
    InvalidTargetSpec(String),
}
