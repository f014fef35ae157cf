//! Cache Entry Module
//!
//! Per-key metadata: size, TTL, timestamps, access count, tags and strategy.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::cache::EvictionStrategy;

// == Cache Entry Metadata ==
/// Bookkeeping for a single cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntryMetadata {
    pub key: String,
    /// Bytes occupied by the stored (possibly compressed) value
    pub size: u64,
    /// Effective TTL in milliseconds, 0 = never expires
    pub ttl_millis: u64,
    pub created_at: u64,
    pub last_accessed: u64,
    pub access_count: u64,
    pub strategy: EvictionStrategy,
    pub tags: BTreeSet<String>,
    pub compressed: bool,
}

impl CacheEntryMetadata {
    // == Constructor ==
    /// Creates metadata for a fresh write at `now`.
    ///
    /// `access_count` starts at 1, `last_accessed` equals `created_at`.
    pub fn new(
        key: impl Into<String>,
        size: u64,
        ttl_millis: u64,
        now: u64,
        strategy: EvictionStrategy,
        tags: BTreeSet<String>,
        compressed: bool,
    ) -> Self {
        Self {
            key: key.into(),
            size,
            ttl_millis,
            created_at: now,
            last_accessed: now,
            access_count: 1,
            strategy,
            tags,
            compressed,
        }
    }

    /// Absolute expiry timestamp, None if the entry never expires.
    pub fn expires_at(&self) -> Option<u64> {
        if self.ttl_millis == 0 {
            None
        } else {
            Some(self.created_at.saturating_add(self.ttl_millis))
        }
    }

    // == Is Expired ==
    /// An entry is expired once `now >= created_at + ttl`.
    pub fn is_expired(&self, now: u64) -> bool {
        match self.expires_at() {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    /// Remaining lifetime in milliseconds; `Some(0)` once expired.
    pub fn ttl_remaining(&self, now: u64) -> Option<u64> {
        self.expires_at().map(|expires| expires.saturating_sub(now))
    }

    // == Touch ==
    /// Records a successful read.
    pub fn touch(&mut self, now: u64) {
        self.last_accessed = now;
        self.access_count += 1;
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}
