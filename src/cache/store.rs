//! Cache Store Module
//!
//! The memory tier and the metadata store, owned together so that every
//! insert and remove adjusts `stats.size` in the same place.

use std::collections::HashMap;

use crate::cache::eviction::{select_victims, Candidate};
use crate::cache::{CacheEntryMetadata, CacheStats, EvictionStrategy};
use crate::error::{CacheError, Result};

// == Slot ==
#[derive(Debug, Clone)]
struct Slot {
    bytes: Vec<u8>,
    meta: CacheEntryMetadata,
    /// Logical recency, bumped on every write and hit
    touch_seq: u64,
    /// Logical insertion order, bumped on every write
    insert_seq: u64,
}

// == Lookup ==
/// Outcome of a memory-tier read.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Hit {
        bytes: Vec<u8>,
        meta: CacheEntryMetadata,
    },
    /// The entry was present but expired; it has already been removed
    Expired,
    Missing,
}

// == Memory Store ==
/// Memory tier + metadata store.
#[derive(Debug)]
pub struct MemoryStore {
    entries: HashMap<String, Slot>,
    stats: CacheStats,
    max_size: u64,
    seq: u64,
}

impl MemoryStore {
    // == Constructor ==
    pub fn new(max_size: u64) -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
            max_size,
            seq: 0,
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    // == Lookup ==
    /// Reads an entry, recording the access on a hit.
    ///
    /// Expired entries are removed here and reported as `Expired`; they are
    /// never handed out. Hit/miss counters are left to the caller, which
    /// may still find the key on disk.
    pub fn lookup(&mut self, key: &str, now: u64) -> Lookup {
        let expired = match self.entries.get(key) {
            Some(slot) => slot.meta.is_expired(now),
            None => return Lookup::Missing,
        };

        if expired {
            self.remove(key);
            return Lookup::Expired;
        }

        let seq = self.next_seq();
        match self.entries.get_mut(key) {
            Some(slot) => {
                slot.meta.touch(now);
                slot.touch_seq = seq;
                Lookup::Hit {
                    bytes: slot.bytes.clone(),
                    meta: slot.meta.clone(),
                }
            }
            None => Lookup::Missing,
        }
    }

    // == Plan Eviction ==
    /// Returns the keys that must be evicted to admit `incoming_size`
    /// bytes under `key`, in eviction order.
    ///
    /// Pure: nothing is removed. An existing entry under `key` is counted as
    /// freed (it is about to be replaced) and is never a victim. Fails with
    /// `Capacity` if evicting everything else would still not be enough.
    pub fn plan_eviction(
        &self,
        key: &str,
        incoming_size: u64,
        strategy: EvictionStrategy,
        now: u64,
    ) -> Result<Vec<String>> {
        let replaced = self.entries.get(key).map_or(0, |slot| slot.meta.size);
        let projected = self.stats.size - replaced + incoming_size;
        if projected <= self.max_size {
            return Ok(Vec::new());
        }

        let mut needed = projected - self.max_size;
        let candidates = self
            .entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(_, slot)| Candidate {
                meta: &slot.meta,
                touch_seq: slot.touch_seq,
                insert_seq: slot.insert_seq,
            })
            .collect();

        let mut victims = Vec::new();
        for victim in select_victims(candidates, strategy, now) {
            if needed == 0 {
                break;
            }
            let size = self.entries.get(&victim).map_or(0, |slot| slot.meta.size);
            needed = needed.saturating_sub(size);
            victims.push(victim);
        }

        if needed > 0 {
            return Err(CacheError::Capacity(format!(
                "cannot admit '{}' ({} bytes): max size is {} bytes and {} bytes could not be freed",
                key, incoming_size, self.max_size, needed
            )));
        }

        Ok(victims)
    }

    // == Put ==
    /// Inserts or replaces an entry. Returns the write sequence number,
    /// which identifies this exact version of the entry.
    ///
    /// Callers must have made room first (see `plan_eviction`).
    pub fn put(&mut self, key: &str, bytes: Vec<u8>, meta: CacheEntryMetadata) -> u64 {
        let seq = self.next_seq();
        let size = meta.size;
        let slot = Slot {
            bytes,
            meta,
            touch_seq: seq,
            insert_seq: seq,
        };

        if let Some(old) = self.entries.insert(key.to_string(), slot) {
            self.stats.size -= old.meta.size;
        }
        self.stats.size += size;
        seq
    }

    // == Remove ==
    /// Removes an entry. Removing an absent key is a no-op.
    pub fn remove(&mut self, key: &str) -> Option<CacheEntryMetadata> {
        let slot = self.entries.remove(key)?;
        self.stats.size -= slot.meta.size;
        Some(slot.meta)
    }

    /// Drops every entry. Counters other than `size` are kept.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.stats.size = 0;
        count
    }

    // == Write-Behind Support ==
    /// Copies the entry out if it is still the version written as `write_seq`.
    pub fn current_version(&self, key: &str, write_seq: u64) -> Option<(Vec<u8>, CacheEntryMetadata)> {
        self.entries
            .get(key)
            .filter(|slot| slot.insert_seq == write_seq)
            .map(|slot| (slot.bytes.clone(), slot.meta.clone()))
    }

    // == Queries ==
    pub fn expired_keys(&self, now: u64) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, slot)| slot.meta.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn keys_where<F>(&self, mut predicate: F) -> Vec<String>
    where
        F: FnMut(&str, &CacheEntryMetadata) -> bool,
    {
        self.entries
            .iter()
            .filter(|(key, slot)| predicate(key, &slot.meta))
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn metadata(&self, key: &str) -> Option<&CacheEntryMetadata> {
        self.entries.get(key).map(|slot| &slot.meta)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn size_total(&self) -> u64 {
        self.stats.size
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut CacheStats {
        &mut self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of per-entry sizes, recomputed from scratch.
    pub fn recomputed_size(&self) -> u64 {
        self.entries.values().map(|slot| slot.meta.size).sum()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn meta(key: &str, size: u64, ttl: u64, now: u64) -> CacheEntryMetadata {
        CacheEntryMetadata::new(
            key,
            size,
            ttl,
            now,
            EvictionStrategy::Lru,
            BTreeSet::new(),
            false,
        )
    }

    fn put(store: &mut MemoryStore, key: &str, size: u64, ttl: u64, now: u64) -> u64 {
        store.put(key, vec![0; size as usize], meta(key, size, ttl, now))
    }

    #[test]
    fn test_store_new() {
        let store = MemoryStore::new(100);
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.size_total(), 0);
        assert_eq!(store.max_size(), 100);
    }

    #[test]
    fn test_put_and_lookup() {
        let mut store = MemoryStore::new(100);
        put(&mut store, "key1", 10, 0, 0);

        match store.lookup("key1", 5) {
            Lookup::Hit { bytes, meta } => {
                assert_eq!(bytes.len(), 10);
                assert_eq!(meta.access_count, 2);
                assert_eq!(meta.last_accessed, 5);
            }
            other => panic!("expected hit, got {:?}", other),
        }
        assert_eq!(store.size_total(), 10);
    }

    #[test]
    fn test_lookup_missing() {
        let mut store = MemoryStore::new(100);
        assert_eq!(store.lookup("nonexistent", 0), Lookup::Missing);
    }

    #[test]
    fn test_lookup_expired_removes_entry() {
        let mut store = MemoryStore::new(100);
        put(&mut store, "key1", 10, 100, 0);

        assert_eq!(store.lookup("key1", 100), Lookup::Expired);
        assert!(!store.contains("key1"));
        assert_eq!(store.size_total(), 0);
        assert_eq!(store.lookup("key1", 100), Lookup::Missing);
    }

    #[test]
    fn test_overwrite_resizes() {
        let mut store = MemoryStore::new(100);
        put(&mut store, "key1", 10, 0, 0);
        put(&mut store, "key1", 30, 0, 1);

        assert_eq!(store.len(), 1);
        assert_eq!(store.size_total(), 30);
        assert_eq!(store.recomputed_size(), 30);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut store = MemoryStore::new(100);
        put(&mut store, "key1", 10, 0, 0);

        assert!(store.remove("key1").is_some());
        assert!(store.remove("key1").is_none());
        assert_eq!(store.size_total(), 0);
    }

    #[test]
    fn test_clear() {
        let mut store = MemoryStore::new(100);
        put(&mut store, "a", 10, 0, 0);
        put(&mut store, "b", 10, 0, 0);
        store.stats_mut().record_hit();

        assert_eq!(store.clear(), 2);
        assert!(store.is_empty());
        assert_eq!(store.size_total(), 0);
        assert_eq!(store.stats().hits, 1);
    }

    #[test]
    fn test_plan_eviction_not_needed() {
        let mut store = MemoryStore::new(100);
        put(&mut store, "a", 50, 0, 0);
        let victims = store
            .plan_eviction("b", 50, EvictionStrategy::Lru, 0)
            .unwrap();
        assert!(victims.is_empty());
    }

    #[test]
    fn test_plan_eviction_lru_respects_touch() {
        let mut store = MemoryStore::new(2);
        put(&mut store, "a", 1, 0, 0);
        put(&mut store, "b", 1, 0, 0);
        // Same millisecond: recency comes from the touch sequence
        let _ = store.lookup("a", 0);

        let victims = store
            .plan_eviction("c", 1, EvictionStrategy::Lru, 0)
            .unwrap();
        assert_eq!(victims, vec!["b".to_string()]);
    }

    #[test]
    fn test_plan_eviction_takes_only_what_is_needed() {
        let mut store = MemoryStore::new(100);
        put(&mut store, "small", 10, 0, 0);
        put(&mut store, "large", 60, 0, 1);
        put(&mut store, "medium", 30, 0, 2);

        let victims = store
            .plan_eviction("new", 40, EvictionStrategy::Size, 3)
            .unwrap();
        assert_eq!(victims, vec!["large".to_string()]);
    }

    #[test]
    fn test_plan_eviction_overwrite_counts_replaced_bytes() {
        let mut store = MemoryStore::new(100);
        put(&mut store, "a", 60, 0, 0);
        put(&mut store, "b", 40, 0, 1);

        // 100 - 60 + 70 = 110: one victim needed, never "a" itself
        let victims = store
            .plan_eviction("a", 70, EvictionStrategy::Lru, 2)
            .unwrap();
        assert_eq!(victims, vec!["b".to_string()]);
    }

    #[test]
    fn test_plan_eviction_capacity_error() {
        let mut store = MemoryStore::new(100);
        put(&mut store, "a", 50, 0, 0);

        let result = store.plan_eviction("huge", 101, EvictionStrategy::Lru, 0);
        assert!(matches!(result, Err(CacheError::Capacity(_))));
        // Planning never mutates
        assert!(store.contains("a"));
        assert_eq!(store.size_total(), 50);
    }

    #[test]
    fn test_current_version() {
        let mut store = MemoryStore::new(100);
        let first = put(&mut store, "a", 10, 0, 0);
        assert!(store.current_version("a", first).is_some());

        let second = put(&mut store, "a", 12, 0, 1);
        assert!(store.current_version("a", first).is_none());
        let (bytes, meta) = store.current_version("a", second).unwrap();
        assert_eq!(bytes.len(), 12);
        assert_eq!(meta.size, 12);

        // A hit does not create a new version
        let _ = store.lookup("a", 2);
        assert!(store.current_version("a", second).is_some());
    }

    #[test]
    fn test_expired_keys() {
        let mut store = MemoryStore::new(100);
        put(&mut store, "short", 1, 100, 0);
        put(&mut store, "long", 1, 10_000, 0);
        put(&mut store, "forever", 1, 0, 0);

        assert_eq!(store.expired_keys(150), vec!["short".to_string()]);
    }

    #[test]
    fn test_keys_where() {
        let mut store = MemoryStore::new(100);
        put(&mut store, "schema:users", 1, 0, 0);
        put(&mut store, "seed:users", 1, 0, 0);

        let keys = store.keys_where(|key, _| key.starts_with("schema:"));
        assert_eq!(keys, vec!["schema:users".to_string()]);
    }
}
