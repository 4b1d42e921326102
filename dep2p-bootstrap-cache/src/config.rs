// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const MAX_ADDRS: usize = 1500;

/// Configuration for the on-disk Address Book cache. Carries no fetch
/// endpoints: seeding the initial peer list is an external collaborator's
/// job (`ConfigSource`/CLI), this crate only persists what the
/// `DiscoveryFeeder` hands it.
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Maximum number of addresses to retain in the cache.
    pub max_addrs: usize,
    /// Path to the cache file on disk.
    pub cache_file_path: PathBuf,
    /// Disables writing to disk entirely (e.g. `--local` mode).
    pub disable_cache_writing: bool,
}

impl CacheConfig {
    pub fn default_config(realm_label: &str) -> Result<Self> {
        Ok(Self {
            max_addrs: MAX_ADDRS,
            cache_file_path: default_cache_path(realm_label)?,
            disable_cache_writing: false,
        })
    }

    pub fn empty() -> Self {
        Self {
            max_addrs: MAX_ADDRS,
            cache_file_path: PathBuf::new(),
            disable_cache_writing: false,
        }
    }

    pub fn with_cache_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.cache_file_path = path.as_ref().to_path_buf();
        self
    }

    pub fn with_max_addrs(mut self, max_addrs: usize) -> Self {
        self.max_addrs = max_addrs;
        self
    }

    pub fn with_disable_cache_writing(mut self, disable: bool) -> Self {
        self.disable_cache_writing = disable;
        self
    }
}

/// Default cache path, namespaced per realm label so distinct realms never
/// share (or clobber) the same address book on disk.
fn default_cache_path(realm_label: &str) -> Result<PathBuf> {
    let dir = dirs_next::data_dir()
        .ok_or(Error::CouldNotObtainDataDir)?
        .join("dep2p")
        .join("bootstrap_cache");

    std::fs::create_dir_all(&dir)?;

    Ok(dir.join(format!("addrs_{realm_label}.json")))
}
