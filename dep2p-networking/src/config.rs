// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

//! The shape of configuration `dep2p-networking` accepts. Loading it from a
//! CLI or a config file is a collaborator's job (`ConfigSource` in the
//! spec); this module only defines the struct that collaborator builds.

use std::path::PathBuf;
use std::time::Duration;

use libp2p::Multiaddr;

/// One of the three QUIC keep-alive/idle-timeout regimes of §4.2. Keep-alive
/// is always ≤ idle-timeout / 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuicRegime {
    RealTime,
    Balanced,
    Conservative,
}

impl QuicRegime {
    pub fn keep_alive(self) -> Duration {
        match self {
            Self::RealTime => Duration::from_secs(2),
            Self::Balanced => Duration::from_secs(3),
            Self::Conservative => Duration::from_secs(5),
        }
    }

    pub fn idle_timeout(self) -> Duration {
        match self {
            Self::RealTime => Duration::from_secs(4),
            Self::Balanced => Duration::from_secs(6),
            Self::Conservative => Duration::from_secs(10),
        }
    }
}

/// A coarse device-class preset a `ConfigSource` collaborator can pick
/// between, each pre-wiring sensible water marks and a QUIC regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Mobile,
    Desktop,
    Server,
    Minimal,
}

impl Preset {
    pub fn water_marks(self) -> (usize, usize) {
        match self {
            Self::Mobile => (8, 16),
            Self::Desktop => (50, 100),
            Self::Server => (200, 400),
            Self::Minimal => (2, 4),
        }
    }

    pub fn quic_regime(self) -> QuicRegime {
        match self {
            Self::Mobile => QuicRegime::Conservative,
            Self::Desktop => QuicRegime::Balanced,
            Self::Server => QuicRegime::Balanced,
            Self::Minimal => QuicRegime::RealTime,
        }
    }
}

const GRACE_PERIOD_DEFAULT: Duration = Duration::from_secs(30);

/// The full dial/listen/water-mark/realm surface a caller configures before
/// building a `SwarmDriver` — this struct is the *shape*; parsing CLI flags
/// or a TOML file into it stays outside this crate.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub listen_addrs: Vec<Multiaddr>,
    pub bootstrap_peers: Vec<Multiaddr>,
    pub preset: Preset,
    pub low_water: usize,
    pub high_water: usize,
    pub connection_grace_period: Duration,
    pub quic_regime: QuicRegime,
    pub realm_key_path: Option<PathBuf>,
    pub data_dir: PathBuf,
    pub enable_relay_server: bool,
    pub enable_upnp: bool,
}

impl NetworkConfig {
    pub fn for_preset(preset: Preset, data_dir: PathBuf) -> Self {
        let (low_water, high_water) = preset.water_marks();
        Self {
            listen_addrs: Vec::new(),
            bootstrap_peers: Vec::new(),
            preset,
            low_water,
            high_water,
            connection_grace_period: GRACE_PERIOD_DEFAULT,
            quic_regime: preset.quic_regime(),
            realm_key_path: None,
            data_dir,
            enable_relay_server: false,
            enable_upnp: true,
        }
    }

    pub fn with_listen_addr(mut self, addr: Multiaddr) -> Self {
        self.listen_addrs.push(addr);
        self
    }

    pub fn with_bootstrap_peers(mut self, peers: Vec<Multiaddr>) -> Self {
        self.bootstrap_peers = peers;
        self
    }

    pub fn with_water_marks(mut self, low: usize, high: usize) -> Self {
        self.low_water = low;
        self.high_water = high;
        self
    }

    pub fn with_realm_key_path(mut self, path: PathBuf) -> Self {
        self.realm_key_path = Some(path);
        self
    }

    pub fn with_relay_server(mut self, enabled: bool) -> Self {
        self.enable_relay_server = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_alive_never_exceeds_half_idle_timeout() {
        for regime in [QuicRegime::RealTime, QuicRegime::Balanced, QuicRegime::Conservative] {
            assert!(regime.keep_alive() * 2 <= regime.idle_timeout());
        }
    }

    #[test]
    fn preset_water_marks_are_ordered() {
        for preset in [Preset::Mobile, Preset::Desktop, Preset::Server, Preset::Minimal] {
            let (low, high) = preset.water_marks();
            assert!(low < high);
        }
    }
}
