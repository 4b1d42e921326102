// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

//! Identity-first QUIC transport, NAT traversal, the unified Relay, Realm-
//! gated messaging, and disconnect detection — the networking core of
//! dep2p.
//!
//! The entry point is [`NetworkBuilder`]: it assembles the `libp2p::Swarm`
//! and every auxiliary component (Address Book, Connection Manager,
//! Disconnect Tracker, Relay Manager, DHT record store) into a
//! [`SwarmDriver`] the caller spawns, paired with a cloneable [`Node`]
//! handle and an [`NetworkEvent`] stream.
//!
//! ```no_run
//! # async fn example() -> Result<(), dep2p_networking::Error> {
//! use dep2p_identity::KeyPair;
//! use dep2p_networking::{NetworkBuilder, NetworkConfig, Preset};
//!
//! let keypair = KeyPair::generate();
//! let config = NetworkConfig::for_preset(Preset::Desktop, std::path::PathBuf::from("./data"));
//! let (node, mut events, driver) = NetworkBuilder::new(keypair, config).build().await?;
//! tokio::spawn(driver.run());
//! while let Some(event) = events.recv().await {
//!     tracing::info!(?event, "network event");
//! }
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate tracing;

mod address_book;
mod behaviour;
mod cmd;
mod config;
mod connection_manager;
mod dht;
mod disconnect;
mod driver;
mod error;
mod events;
mod messaging;
mod nat;
mod node;
mod protocol_router;
mod relay;
mod transport;

pub use address_book::{AddressBook, AddressBookEvent};
pub use cmd::SwarmCmd;
pub use config::{NetworkConfig, Preset, QuicRegime};
pub use connection_manager::ConnectionManager;
pub use dht::PeerRecordStore;
pub use disconnect::{DisconnectTracker, GraceDecision, ReportDecision, TallyOutcome};
pub use driver::{NetworkBuilder, SwarmDriver};
pub use error::{Error, Result};
pub use events::{DisconnectReason, MsgResponder, NetworkEvent};
pub use messaging::{Request, Response};
pub use nat::{
    promote_via_dialback, record_from_stun_observation, record_from_upnp_mapping, HolePunchOffer,
    HolePunchOutcome,
};
pub use node::Node;
pub use protocol_router::ProtocolRouter;
pub use relay::{classify_circuit, RelayAdmission, RelayAnomalyTracker, RelayManager};
pub use transport::{Muxer, SecurityProtocol, HANDSHAKE_TIMEOUT, NEGOTIATION_TIMEOUT};
