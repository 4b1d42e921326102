// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

//! Transport (§4.2) and Upgrader (§4.3). A single shared UDP socket backs
//! both dial and listen for QUIC, so hole-punching sees one NAT mapping on
//! each side. QUIC connections are already secure and muxed, so the
//! Upgrader step only exists for the TCP fallback path.

use futures::future::Either;
use libp2p::core::muxing::StreamMuxerBox;
use libp2p::core::transport::Boxed;
use libp2p::core::upgrade;
use libp2p::identity::Keypair;
use libp2p::{noise, tcp, yamux, PeerId, Transport as _};

use crate::config::QuicRegime;

/// The two connection-establishment paths this core supports, per REDESIGN
/// FLAGS §9: a closed set of variants, not an open pluggable list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityProtocol {
    QuicTls13,
    Noise,
}

impl SecurityProtocol {
    pub fn protocol_id(self) -> &'static str {
        match self {
            Self::QuicTls13 => "/quic/tls/1.3",
            Self::Noise => "/noise",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Muxer {
    QuicMuxer,
    Yamux,
}

impl Muxer {
    pub fn protocol_id(self) -> &'static str {
        match self {
            Self::QuicMuxer => "/quic/muxer/1.0",
            Self::Yamux => "/yamux/1.0.0",
        }
    }
}

/// Negotiation/handshake timeouts for the TCP upgrade path (§4.3). QUIC
/// bypasses these entirely — it arrives pre-secured and pre-muxed.
pub const NEGOTIATION_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);
pub const HANDSHAKE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Builds the boxed transport: QUIC configured for `regime`'s keep-alive/
/// idle-timeout pair, with a TCP+noise+yamux fallback composed via
/// multistream-select the way `sn_networking`'s `build_transport` composes
/// its websocket fallback.
pub fn build_transport(
    keypair: &Keypair,
    regime: QuicRegime,
) -> Boxed<(PeerId, StreamMuxerBox)> {
    let quic = build_quic_transport(keypair, regime);
    let quic = quic.map(|(peer_id, muxer), _| (peer_id, StreamMuxerBox::new(muxer)));

    let tcp = tcp::tokio::Transport::new(tcp::Config::default().nodelay(true))
        .upgrade(upgrade::Version::V1)
        .authenticate(noise::Config::new(keypair).expect("noise static keypair signing failed"))
        .multiplex(yamux::Config::default())
        .timeout(HANDSHAKE_TIMEOUT)
        .map(|(peer_id, muxer), _| (peer_id, StreamMuxerBox::new(muxer)));

    quic.or_transport(tcp)
        .map(|either_output, _| match either_output {
            Either::Left((peer_id, muxer)) => (peer_id, muxer),
            Either::Right((peer_id, muxer)) => (peer_id, muxer),
        })
        .boxed()
}

fn build_quic_transport(
    keypair: &Keypair,
    regime: QuicRegime,
) -> libp2p::quic::GenTransport<libp2p::quic::tokio::Provider> {
    let mut quic_config = libp2p::quic::Config::new(keypair);
    quic_config.keep_alive_interval = regime.keep_alive();
    quic_config.max_idle_timeout = regime.idle_timeout().as_millis() as u32;
    quic_config.support_draft_29 = false;
    libp2p::quic::tokio::Transport::new(quic_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quic_security_and_muxer_ids_match_wire_strings() {
        assert_eq!(SecurityProtocol::QuicTls13.protocol_id(), "/quic/tls/1.3");
        assert_eq!(Muxer::QuicMuxer.protocol_id(), "/quic/muxer/1.0");
    }

    #[test]
    fn tcp_upgrade_path_ids_match_wire_strings() {
        assert_eq!(SecurityProtocol::Noise.protocol_id(), "/noise");
        assert_eq!(Muxer::Yamux.protocol_id(), "/yamux/1.0.0");
    }
}
