//! Cache Facade Module
//!
//! The public surface: `get/set/delete/clear/invalidate/warmup/stats`,
//! composing the memory store, the disk tier and the write-behind queue.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, info, warn};

use crate::cache::store::Lookup;
use crate::cache::{
    CacheEntryMetadata, Clock, Codec, DiskTier, MemoryStore, ReadPolicy, SetOptions,
    StatsSnapshot, SystemClock, WritePolicy, MAX_KEY_LENGTH,
};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::tasks::writer::{spawn_write_behind_worker, WriteJob};

// == Tiers ==
/// State shared by the facade and the write-behind worker.
#[derive(Debug)]
pub(crate) struct Tiers {
    pub(crate) store: RwLock<MemoryStore>,
    pub(crate) disk: DiskTier,
}

impl Tiers {
    /// Applies one deferred write, unless the entry has since been
    /// overwritten, deleted or evicted.
    pub(crate) async fn apply_deferred_write(&self, key: &str, write_seq: u64) {
        let store = self.store.write().await;
        let Some((bytes, meta)) = store.current_version(key, write_seq) else {
            debug!("Write-behind for '{}' superseded, skipping", key);
            return;
        };

        match self.disk.save(key, &bytes, &meta).await {
            Ok(()) => debug!("Write-behind persisted '{}'", key),
            Err(e) => warn!("Write-behind failed for '{}': {}", key, e),
        }
    }

    /// Removes a key from disk, then from memory. If the disk delete fails
    /// the key is left intact in both tiers.
    async fn remove_everywhere(&self, store: &mut MemoryStore, key: &str) -> Result<bool> {
        let on_disk = self.disk.delete(key).await?;
        let in_memory = store.remove(key).is_some();
        Ok(on_disk || in_memory)
    }

    /// Frees room for `victims`. Disk failures are logged; the memory copy
    /// goes regardless so the byte budget holds.
    async fn evict(&self, store: &mut MemoryStore, victims: Vec<String>) {
        for victim in victims {
            if let Err(e) = self.disk.delete(&victim).await {
                warn!("Failed to delete evicted '{}' from disk: {}", victim, e);
            }
            if store.remove(&victim).is_some() {
                store.stats_mut().record_eviction();
                debug!("Evicted '{}'", victim);
            }
        }
    }
}

// == Cache ==
/// Two-tier cache handle. Cheap to clone; all clones share one store.
#[derive(Debug, Clone)]
pub struct Cache {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    tiers: Arc<Tiers>,
    codec: Codec,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    writer: mpsc::UnboundedSender<WriteJob>,
}

impl Cache {
    // == Constructors ==
    /// Opens a cache on the configured directory using the system clock.
    pub async fn open(config: CacheConfig) -> Result<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock)).await
    }

    /// Opens a cache with an injected clock.
    ///
    /// Must be called inside a Tokio runtime: the write-behind worker is
    /// spawned here.
    pub async fn open_with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let disk = DiskTier::new(&config.cache_directory, config.disk_timeout());
        disk.init().await?;

        let mut store = MemoryStore::new(config.max_size);
        match disk.load_stats().await {
            Ok(Some(persisted)) => store.stats_mut().restore_counters(&persisted),
            Ok(None) => {}
            Err(e) => warn!("Ignoring unreadable stats file: {}", e),
        }

        let tiers = Arc::new(Tiers {
            store: RwLock::new(store),
            disk,
        });

        let (tx, rx) = mpsc::unbounded_channel();
        spawn_write_behind_worker(tiers.clone(), rx);

        info!(
            "Cache opened at {} (max_size={} bytes, default_ttl={}ms)",
            config.cache_directory.display(),
            config.max_size,
            config.default_ttl_ms
        );

        Ok(Self {
            inner: Arc::new(Inner {
                tiers,
                codec: Codec::new(config.compression_enabled, config.compression_threshold),
                clock,
                config,
                writer: tx,
            }),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    fn now(&self) -> u64 {
        self.inner.clock.now_ms()
    }

    // == Set ==
    /// Stores `value` under `key`.
    ///
    /// Serialization and validation happen before any tier is touched.
    /// When the memory tier is full, victims chosen by the entry's strategy
    /// are evicted first; if that cannot free enough bytes the call fails
    /// with `Capacity` and nothing changes.
    pub async fn set<T>(&self, key: &str, value: &T, options: SetOptions) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        validate_key(key)?;
        let encoded = self.inner.codec.encode(value)?;

        let config = &self.inner.config;
        let policy = options.write_policy.unwrap_or(config.default_write_policy);
        let strategy = options.strategy.unwrap_or(config.default_strategy);
        let ttl_ms = options
            .ttl_ms
            .filter(|ttl| *ttl > 0)
            .unwrap_or(config.default_ttl_ms);

        let tiers = &self.inner.tiers;
        let mut store = tiers.store.write().await;
        let now = self.now();
        let meta = CacheEntryMetadata::new(
            key,
            encoded.bytes.len() as u64,
            ttl_ms,
            now,
            strategy,
            options.tags,
            encoded.compressed,
        );

        if policy == WritePolicy::WriteAround {
            if store.remove(key).is_some() {
                debug!("Write-around dropped resident copy of '{}'", key);
            }
            if let Err(e) = tiers.disk.save(key, &encoded.bytes, &meta).await {
                warn!("Write-around failed for '{}': {}", key, e);
            }
            store.stats_mut().record_set();
            return Ok(());
        }

        let victims = store.plan_eviction(key, meta.size, strategy, now)?;

        if policy == WritePolicy::WriteThrough {
            tiers.disk.save(key, &encoded.bytes, &meta).await?;
        }

        tiers.evict(&mut store, victims).await;
        let write_seq = store.put(key, encoded.bytes, meta);
        store.stats_mut().record_set();
        drop(store);

        if policy == WritePolicy::WriteBehind {
            let job = WriteJob::Save {
                key: key.to_string(),
                write_seq,
            };
            if self.inner.writer.send(job).is_err() {
                warn!("Write-behind worker stopped; '{}' stays memory-only", key);
            }
        }

        debug!("Set '{}' ({}, {})", key, policy, strategy);
        Ok(())
    }

    // == Get ==
    /// Cache-aside read: memory, then disk (promoting the entry into memory
    /// when it fits), else `None`.
    ///
    /// Disk failures count as misses. A value that cannot be decoded as `T`
    /// is a `Serialization` error; it is not counted as a hit and a disk
    /// copy is not promoted.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let tiers = &self.inner.tiers;
        let mut store = tiers.store.write().await;
        let now = self.now();

        match store.lookup(key, now) {
            Lookup::Hit { bytes, meta } => {
                let value = self.inner.codec.decode(&bytes, meta.compressed)?;
                store.stats_mut().record_hit();
                return Ok(Some(value));
            }
            Lookup::Expired => {
                if let Err(e) = tiers.disk.delete(key).await {
                    warn!("Failed to delete expired '{}' from disk: {}", key, e);
                }
                store.stats_mut().record_miss();
                debug!("'{}' expired", key);
                return Ok(None);
            }
            Lookup::Missing => {}
        }

        let (bytes, mut meta) = match tiers.disk.load(key, now).await {
            Ok(Some(found)) => found,
            Ok(None) => {
                store.stats_mut().record_miss();
                return Ok(None);
            }
            Err(e) => {
                warn!("Disk read for '{}' failed, treating as miss: {}", key, e);
                store.stats_mut().record_miss();
                return Ok(None);
            }
        };

        let value = self.inner.codec.decode(&bytes, meta.compressed)?;
        meta.touch(now);
        store.stats_mut().record_hit();

        match store.plan_eviction(key, meta.size, meta.strategy, now) {
            Ok(victims) => {
                tiers.evict(&mut store, victims).await;
                store.put(key, bytes, meta);
                debug!("Promoted '{}' from disk", key);
            }
            Err(e) => debug!("Not promoting '{}': {}", key, e),
        }

        Ok(Some(value))
    }

    // == Fetch ==
    /// Reads `key` under `policy`. Read-through invokes `loader` on a miss,
    /// stores a non-absent result with default options and returns it;
    /// cache-aside never calls the loader.
    pub async fn fetch<T, F, Fut, E>(&self, key: &str, policy: ReadPolicy, loader: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = std::result::Result<Option<T>, E>>,
        E: std::fmt::Display,
    {
        if let Some(value) = self.get(key).await? {
            return Ok(Some(value));
        }
        if policy == ReadPolicy::CacheAside {
            return Ok(None);
        }

        let loaded = loader(key.to_string()).await.map_err(|e| CacheError::Loader {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        if let Some(value) = &loaded {
            if let Err(e) = self.set(key, value, SetOptions::default()).await {
                warn!("Read-through could not cache '{}': {}", key, e);
            }
        }
        Ok(loaded)
    }

    /// `fetch` with the configured default read policy.
    pub async fn get_or_load<T, F, Fut, E>(&self, key: &str, loader: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = std::result::Result<Option<T>, E>>,
        E: std::fmt::Display,
    {
        self.fetch(key, self.inner.config.default_read_policy, loader)
            .await
    }

    // == Delete ==
    /// Removes `key` from both tiers. Returns false if it was in neither,
    /// or if the disk delete failed (the entry is then left intact).
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let tiers = &self.inner.tiers;
        let mut store = tiers.store.write().await;

        match tiers.remove_everywhere(&mut store, key).await {
            Ok(true) => {
                store.stats_mut().record_delete();
                debug!("Deleted '{}'", key);
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(e) => {
                warn!("Delete of '{}' failed on disk, left intact: {}", key, e);
                Ok(false)
            }
        }
    }

    // == Clear ==
    /// Empties both tiers. Counters other than size are kept.
    pub async fn clear(&self) -> Result<()> {
        let tiers = &self.inner.tiers;
        let mut store = tiers.store.write().await;

        if let Err(e) = tiers.disk.clear_all().await {
            warn!("Failed to clear disk tier: {}", e);
        }
        let removed = store.clear();
        info!("Cache cleared ({} entries)", removed);
        Ok(())
    }

    // == Invalidate By Tag ==
    /// Removes every entry carrying `tag`, in memory or on disk.
    ///
    /// A memory-resident entry is judged by its memory metadata alone; its
    /// disk copy may be older (a pending write-behind overwrite).
    pub async fn invalidate_by_tag(&self, tag: &str) -> Result<usize> {
        let tiers = &self.inner.tiers;
        let mut store = tiers.store.write().await;

        let mut keys: BTreeSet<String> = store
            .keys_where(|_, meta| meta.has_tag(tag))
            .into_iter()
            .collect();

        match tiers.disk.entry_paths().await {
            Ok(paths) => {
                for path in paths {
                    match tiers.disk.read_record(&path).await {
                        Ok(Some(record))
                            if !store.contains(&record.key) && record.metadata.has_tag(tag) =>
                        {
                            keys.insert(record.key);
                        }
                        Ok(_) => {}
                        Err(e) => warn!("Skipping unreadable disk entry: {}", e),
                    }
                }
            }
            Err(e) => warn!("Could not scan disk tier for tag '{}': {}", tag, e),
        }

        let removed = self.remove_keys(&mut store, keys).await;
        info!("Invalidated {} entries tagged '{}'", removed, tag);
        Ok(removed)
    }

    // == Invalidate By Pattern ==
    /// Removes every memory-resident entry whose key matches `pattern`.
    ///
    /// Only the memory tier's key set is matched: entries that exist solely
    /// on disk are not visited (their files are named by hash).
    pub async fn invalidate_by_pattern(&self, pattern: &str) -> Result<usize> {
        let regex = Regex::new(pattern)
            .map_err(|e| CacheError::Configuration(format!("invalid pattern '{}': {}", pattern, e)))?;

        let tiers = &self.inner.tiers;
        let mut store = tiers.store.write().await;
        let keys = store.keys_where(|key, _| regex.is_match(key));

        let removed = self.remove_keys(&mut store, keys).await;
        info!("Invalidated {} entries matching '{}'", removed, pattern);
        Ok(removed)
    }

    async fn remove_keys<I>(&self, store: &mut MemoryStore, keys: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut removed = 0;
        for key in keys {
            match self.inner.tiers.remove_everywhere(store, &key).await {
                Ok(true) => {
                    store.stats_mut().record_delete();
                    removed += 1;
                }
                Ok(false) => {}
                Err(e) => warn!("Could not invalidate '{}', left intact: {}", key, e),
            }
        }
        removed
    }

    // == Warmup ==
    /// Loads each key through `loader` and stores non-absent results.
    /// A failing key is logged and skipped. Returns how many were stored.
    pub async fn warmup<I, T, F, Fut, E>(&self, keys: I, mut loader: F) -> usize
    where
        I: IntoIterator,
        I::Item: Into<String>,
        T: Serialize,
        F: FnMut(String) -> Fut,
        Fut: Future<Output = std::result::Result<Option<T>, E>>,
        E: std::fmt::Display,
    {
        let mut loaded = 0;
        for key in keys {
            let key = key.into();
            match loader(key.clone()).await {
                Ok(Some(value)) => match self.set(&key, &value, SetOptions::default()).await {
                    Ok(()) => loaded += 1,
                    Err(e) => warn!("Warmup could not cache '{}': {}", key, e),
                },
                Ok(None) => debug!("Warmup loader had nothing for '{}'", key),
                Err(e) => warn!("Warmup loader failed for '{}': {}", key, e),
            }
        }
        info!("Warmup loaded {} entries", loaded);
        loaded
    }

    // == Sweep ==
    /// Removes every expired entry from both tiers. Returns the count.
    pub async fn sweep_expired(&self) -> usize {
        let tiers = &self.inner.tiers;
        let mut store = tiers.store.write().await;
        let now = self.now();

        let mut removed = 0;
        for key in store.expired_keys(now) {
            match tiers.remove_everywhere(&mut store, &key).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!("Sweep could not remove '{}': {}", key, e),
            }
        }
        removed
    }

    // == Stats ==
    pub async fn stats(&self) -> StatsSnapshot {
        let store = self.inner.tiers.store.read().await;
        StatsSnapshot::new(store.stats(), store.max_size(), store.len())
    }

    /// Rewrites the stats file from the current counters.
    pub async fn persist_stats(&self) -> Result<()> {
        let tiers = &self.inner.tiers;
        let stats = tiers.store.read().await.stats().clone();
        tiers.disk.save_stats(&stats).await
    }

    // == Write-Behind Control ==
    /// Waits until every write-behind write queued so far has been applied.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.inner.writer.send(WriteJob::Flush(tx)).is_err() {
            return;
        }
        let _ = rx.await;
    }

    /// Clean shutdown: drains write-behind writes and persists the stats file.
    pub async fn shutdown(&self) -> Result<()> {
        self.flush().await;
        self.persist_stats().await?;
        info!("Cache shut down cleanly");
        Ok(())
    }

    // == Introspection ==
    /// True if `key` is resident in the memory tier and not expired.
    pub async fn contains(&self, key: &str) -> bool {
        let store = self.inner.tiers.store.read().await;
        let now = self.now();
        store.metadata(key).is_some_and(|meta| !meta.is_expired(now))
    }

    /// Metadata of a memory-resident entry.
    pub async fn metadata(&self, key: &str) -> Option<CacheEntryMetadata> {
        self.inner.tiers.store.read().await.metadata(key).cloned()
    }

    /// Memory-resident keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let store = self.inner.tiers.store.read().await;
        let mut keys = store.keys_where(|_, _| true);
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        self.inner.tiers.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.tiers.store.read().await.is_empty()
    }

    /// Recomputed sum of entry sizes next to the tracked total.
    pub async fn size_accounting(&self) -> (u64, u64) {
        let store = self.inner.tiers.store.read().await;
        (store.size_total(), store.recomputed_size())
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidRequest("Key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidRequest(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}
