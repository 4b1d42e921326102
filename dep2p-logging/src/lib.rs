// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

//! The `Logger` collaborator's concrete sink: a `tracing` subscriber with a
//! compact, span-aware event format. Log *rotation* and destination
//! selection are a deployment concern handled by callers (out of scope
//! here, same as file/JSON config loading); this crate only shapes events.

mod error;
mod format;

pub use error::Error;
pub use format::LogFormatter;

use tracing_core::Level;
use tracing_subscriber::{filter::Targets, fmt, prelude::*, registry, EnvFilter};

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;

/// Default per-module log levels for a dep2p node: quiet libp2p transport
/// chatter, verbose for our own crates.
pub fn default_targets() -> Vec<(String, Level)> {
    vec![
        ("dep2p_networking".to_string(), Level::DEBUG),
        ("dep2p_realm".to_string(), Level::DEBUG),
        ("dep2p_identity".to_string(), Level::INFO),
        ("libp2p_swarm".to_string(), Level::INFO),
        ("libp2p_quic".to_string(), Level::INFO),
    ]
}

/// Installs a process-global `tracing` subscriber writing formatted events to
/// stdout, honoring `DEP2P_LOG` as an override (falling back to
/// [`default_targets`]). Returns an error if a subscriber is already
/// installed.
pub fn init_tracing() -> Result<()> {
    let targets = match std::env::var("DEP2P_LOG") {
        Ok(spec) => parse_targets(&spec)?,
        Err(_) => default_targets(),
    };

    let filter = Targets::new().with_targets(targets);
    let fmt_layer = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .event_format(LogFormatter);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    registry()
        .with(fmt_layer.with_filter(filter))
        .with(env_filter)
        .try_init()
        .map_err(|_| Error::SubscriberAlreadyInstalled)
}

fn parse_targets(spec: &str) -> Result<Vec<(String, Level)>> {
    spec.split(',')
        .map(|entry| {
            let (target, level) = entry
                .split_once('=')
                .ok_or_else(|| Error::InvalidTargetSpec(entry.to_string()))?;
            let level: Level = level
                .parse()
                .map_err(|_| Error::InvalidTargetSpec(entry.to_string()))?;
            Ok((target.to_string(), level))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_target_spec() {
        let targets = parse_targets("dep2p_networking=debug,dep2p_realm=warn").expect("parse");
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0], ("dep2p_networking".to_string(), Level::DEBUG));
        assert_eq!(targets[1], ("dep2p_realm".to_string(), Level::WARN));
    }

    #[test]
    fn rejects_entries_without_level() {
        assert!(parse_targets("dep2p_networking").is_err());
    }
}
