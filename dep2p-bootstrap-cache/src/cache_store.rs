// Copyright 2026 dep2p contributors.
//
// This dep2p Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the dep2p Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the dep2p Software.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use dep2p_protocol::{AddressSource, NodeId};
use fs2::FileExt;
use libp2p::Multiaddr;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::CacheConfig;

const ENTRY_EXPIRY_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Disk-serializable mirror of [`AddressRecord`]. `AddressRecord` itself
/// carries an `Instant` (monotonic, process-local) for its TTL clock; the
/// cache file needs a wall-clock stamp that survives a restart, plus the
/// dialback success/failure tally the in-memory record doesn't track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedAddr {
    node_id: String,
    addr: Multiaddr,
    source: AddressSource,
    priority: u16,
    ttl_secs: Option<u64>,
    success_count: u32,
    failure_count: u32,
    #[serde(default = "SystemTime::now")]
    last_seen: SystemTime,
}

impl CachedAddr {
    fn new(node_id: NodeId, addr: Multiaddr, source: AddressSource) -> Self {
        Self {
            node_id: node_id.to_string(),
            addr,
            priority: source.default_priority(),
            ttl_secs: source.default_ttl().map(|d| d.as_secs()),
            source,
            success_count: 0,
            failure_count: 0,
            last_seen: SystemTime::now(),
        }
    }

    pub fn node_id_str(&self) -> &str {
        &self.node_id
    }

    pub fn addr(&self) -> &Multiaddr {
        &self.addr
    }

    pub fn source(&self) -> AddressSource {
        self.source
    }

    pub fn priority(&self) -> u16 {
        self.priority
    }

    pub fn is_reliable(&self) -> bool {
        self.success_count >= self.failure_count
    }

    pub fn is_expired(&self) -> bool {
        match self.ttl_secs {
            Some(ttl_secs) => SystemTime::now()
                .duration_since(self.last_seen)
                .map(|elapsed| elapsed >= Duration::from_secs(ttl_secs))
                .unwrap_or(false),
            None => false,
        }
    }

    fn update_status(&mut self, success: bool) {
        if success {
            self.success_count = self.success_count.saturating_add(1);
            self.priority = AddressSource::Direct.default_priority().max(self.priority);
        } else {
            self.failure_count = self.failure_count.saturating_add(1);
        }
        self.last_seen = SystemTime::now();
    }

    fn key(node_id: &NodeId, addr: &Multiaddr) -> String {
        format!("{node_id}|{addr}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheData {
    addrs: HashMap<String, CachedAddr>,
    #[serde(default = "SystemTime::now")]
    last_updated: SystemTime,
    #[serde(default = "default_version")]
    version: u32,
}

fn default_version() -> u32 {
    1
}

impl Default for CacheData {
    fn default() -> Self {
        Self {
            addrs: HashMap::new(),
            last_updated: SystemTime::now(),
            version: default_version(),
        }
    }
}

impl CacheData {
    fn cleanup_stale_and_unreliable(&mut self) {
        self.addrs.retain(|_, entry| entry.is_reliable());
        let now = SystemTime::now();
        self.addrs.retain(|_, entry| {
            now.duration_since(entry.last_seen)
                .map(|elapsed| elapsed < ENTRY_EXPIRY_DURATION)
                .unwrap_or(false)
        });
    }

    /// Merges `current_shared_state` (as just re-read from disk) into self,
    /// referencing `old_shared_state` (what we last wrote) to avoid
    /// double-counting success/failure deltas accrued by other processes
    /// writing to the same cache file concurrently.
    fn sync(&mut self, old_shared_state: &CacheData, current_shared_state: &CacheData) {
        for (key, current_entry) in current_shared_state.addrs.iter() {
            let old_entry = old_shared_state.addrs.get(key);
            self.addrs
                .entry(key.clone())
                .and_modify(|entry| {
                    if entry.last_seen == current_entry.last_seen {
                        return;
                    }
                    let success_delta = entry
                        .success_count
                        .saturating_sub(old_entry.map_or(0, |e| e.success_count));
                    let failure_delta = entry
                        .failure_count
                        .saturating_sub(old_entry.map_or(0, |e| e.failure_count));
                    entry.success_count = current_entry.success_count.saturating_add(success_delta);
                    entry.failure_count = current_entry.failure_count.saturating_add(failure_delta);
                    entry.last_seen = std::cmp::max(entry.last_seen, current_entry.last_seen);
                })
                .or_insert_with(|| current_entry.clone());
        }
        self.last_updated = SystemTime::now();
    }
}

/// Persisted, cross-process Address Book cache (spec §4.6). This crate's
/// view is non-authoritative: the DHT PeerRecord is authoritative, this is
/// the local fallback consulted on DHT miss/timeout and the seed for the
/// next process start.
#[derive(Clone, Debug)]
pub struct BootstrapCacheStore {
    cache_path: PathBuf,
    config: CacheConfig,
    data: CacheData,
    old_shared_state: CacheData,
}

impl BootstrapCacheStore {
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub async fn new(config: CacheConfig) -> Result<Self> {
        let mut store = Self::new_without_init(config).await?;
        store.init().await?;
        info!("Address Book cache initialized at {:?}", store.cache_path);
        Ok(store)
    }

    pub async fn new_without_init(config: CacheConfig) -> Result<Self> {
        let cache_path = config.cache_file_path.clone();
        if let Some(parent) = cache_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).inspect_err(|err| {
                    warn!("Failed to create Address Book cache directory at {parent:?}: {err}");
                })?;
            }
        }
        Ok(Self {
            cache_path,
            config,
            data: CacheData::default(),
            old_shared_state: CacheData::default(),
        })
    }

    pub async fn init(&mut self) -> Result<()> {
        let data = if self.cache_path.exists() {
            match Self::load_cache_data(&self.cache_path).await {
                Ok(data) => data,
                Err(e) => {
                    warn!("Failed to load Address Book cache, starting empty: {e}");
                    CacheData::default()
                }
            }
        } else {
            CacheData::default()
        };

        self.data = data.clone();
        self.old_shared_state = data;
        self.sync_and_save_to_disk(false).await
    }

    async fn load_cache_data(cache_path: &PathBuf) -> Result<CacheData> {
        let mut file = OpenOptions::new().read(true).open(cache_path)?;
        Self::acquire_shared_lock(&file).await?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let mut data = serde_json::from_str::<CacheData>(&contents)
            .map_err(|_| Error::FailedToParseCacheData)?;
        data.cleanup_stale_and_unreliable();
        Ok(data)
    }

    pub fn get_addrs(&self) -> impl Iterator<Item = &CachedAddr> {
        self.data.addrs.values()
    }

    pub fn get_reliable_addrs(&self) -> impl Iterator<Item = &CachedAddr> {
        self.data.addrs.values().filter(|entry| entry.is_reliable())
    }

    pub fn addr_count(&self) -> usize {
        self.data.addrs.len()
    }

    pub fn update_addr_status(&mut self, node_id: &NodeId, addr: &Multiaddr, success: bool) {
        let key = CachedAddr::key(node_id, addr);
        if let Some(entry) = self.data.addrs.get_mut(&key) {
            entry.update_status(success);
        } else {
            debug!("Addr not found in Address Book cache, skipping status update: {addr}");
        }
    }

    /// Promotes an address to `verified-direct` priority following a
    /// successful dialback, mirroring [`AddressRecord::promote_to_verified_direct`].
    pub fn promote_to_verified_direct(&mut self, node_id: &NodeId, addr: &Multiaddr) {
        let key = CachedAddr::key(node_id, addr);
        if let Some(entry) = self.data.addrs.get_mut(&key) {
            entry.priority = AddressSource::Direct.default_priority();
            entry.source = AddressSource::Direct;
            entry.ttl_secs = AddressSource::Direct.default_ttl().map(|d| d.as_secs());
        }
    }

    pub fn add_addr(&mut self, node_id: NodeId, addr: Multiaddr, source: AddressSource) {
        let key = CachedAddr::key(&node_id, &addr);
        if let Some(entry) = self.data.addrs.get_mut(&key) {
            entry.last_seen = SystemTime::now();
            return;
        }
        self.try_remove_oldest();
        self.data.addrs.insert(key, CachedAddr::new(node_id, addr, source));
    }

    pub fn remove_addr(&mut self, node_id: &NodeId, addr: &Multiaddr) {
        self.data.addrs.remove(&CachedAddr::key(node_id, addr));
    }

    pub fn cleanup_stale_and_unreliable(&mut self) {
        self.data.cleanup_stale_and_unreliable();
    }

    pub async fn clear_and_save(&mut self) -> Result<()> {
        self.data.addrs.clear();
        self.old_shared_state.addrs.clear();
        self.atomic_write().await
    }

    /// Do not request cleanup here when `data` may have just been fetched
    /// externally, since wall-clock is not guaranteed accurate in every
    /// caller's environment.
    pub async fn sync_and_save_to_disk(&mut self, with_cleanup: bool) -> Result<()> {
        if self.config.disable_cache_writing {
            return Ok(());
        }

        if let Ok(data_from_file) = Self::load_cache_data(&self.cache_path).await {
            self.data.sync(&self.old_shared_state, &data_from_file);
        }

        if with_cleanup {
            self.data.cleanup_stale_and_unreliable();
            self.try_remove_oldest();
        }
        self.old_shared_state = self.data.clone();

        self.atomic_write().await.inspect_err(|e| {
            error!("Failed to save Address Book cache to disk: {e}");
        })
    }

    fn try_remove_oldest(&mut self) {
        while self.data.addrs.len() >= self.config.max_addrs {
            let Some((oldest_key, _)) = self
                .data
                .addrs
                .iter()
                .min_by_key(|(_, entry)| entry.last_seen)
            else {
                break;
            };
            let oldest_key = oldest_key.clone();
            self.data.addrs.remove(&oldest_key);
        }
    }

    async fn acquire_shared_lock(file: &File) -> Result<()> {
        let file = file.try_clone()?;
        tokio::task::spawn_blocking(move || file.try_lock_shared().map_err(Error::from))
            .await
            .map_err(|e| Error::Io(io::Error::other(e.to_string())))?
    }

    async fn acquire_exclusive_lock(file: &File) -> Result<()> {
        let mut backoff = Duration::from_millis(10);
        let max_attempts = 5;
        let mut attempts = 0;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(()),
                Err(_) if attempts >= max_attempts => return Err(Error::LockError),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    attempts += 1;
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(_) => return Err(Error::LockError),
            }
        }
    }

    async fn atomic_write(&self) -> Result<()> {
        if let Some(parent) = self.cache_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_file = NamedTempFile::new()?;
        serde_json::to_writer_pretty(&temp_file, &self.data)?;

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.cache_path)?;
        Self::acquire_exclusive_lock(&file).await?;

        temp_file.persist(&self.cache_path).inspect_err(|err| {
            error!("Failed to persist Address Book cache with err: {err:?}");
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_id() -> NodeId {
        dep2p_identity::KeyPair::generate().node_id()
    }

    async fn create_test_store() -> BootstrapCacheStore {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache_file = temp_dir.path().join("addrs.json");
        let config = CacheConfig::empty().with_cache_path(&cache_file);
        BootstrapCacheStore::new(config).await.unwrap()
    }

    #[tokio::test]
    async fn add_then_update_status_persists_counts() {
        let mut store = create_test_store().await;
        let node = node_id();
        let addr: Multiaddr = "/ip4/127.0.0.1/udp/4001/quic-v1".parse().unwrap();

        store.add_addr(node, addr.clone(), AddressSource::Dht);
        store.update_addr_status(&node, &addr, true);

        let entries: Vec<_> = store.get_addrs().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].success_count, 1);
        assert_eq!(entries[0].failure_count, 0);
    }

    #[tokio::test]
    async fn unreliable_addr_removed_on_cleanup() {
        let mut store = create_test_store().await;
        let node = node_id();
        let addr: Multiaddr = "/ip4/127.0.0.1/udp/4001/quic-v1".parse().unwrap();

        store.add_addr(node, addr.clone(), AddressSource::Dht);
        for _ in 0..5 {
            store.update_addr_status(&node, &addr, false);
        }
        store.cleanup_stale_and_unreliable();
        assert_eq!(store.addr_count(), 0);
    }

    #[tokio::test]
    async fn sync_and_save_round_trips_to_disk() {
        let mut store = create_test_store().await;
        let node = node_id();
        let addr: Multiaddr = "/ip4/127.0.0.1/udp/4001/quic-v1".parse().unwrap();
        store.add_addr(node, addr, AddressSource::Relay);
        store.sync_and_save_to_disk(false).await.unwrap();
        assert_eq!(store.addr_count(), 1);
    }

    #[tokio::test]
    async fn promote_to_verified_direct_raises_priority() {
        let mut store = create_test_store().await;
        let node = node_id();
        let addr: Multiaddr = "/ip4/127.0.0.1/udp/4001/quic-v1".parse().unwrap();
        store.add_addr(node, addr.clone(), AddressSource::Stun);
        store.promote_to_verified_direct(&node, &addr);
        let entries: Vec<_> = store.get_addrs().collect();
        assert_eq!(entries[0].source(), AddressSource::Direct);
    }
}
