//! Eviction Module
//!
//! Victim ordering for the five eviction strategies.

use std::cmp::{Ordering, Reverse};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cache::CacheEntryMetadata;
use crate::error::CacheError;

// == Eviction Strategy ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionStrategy {
    /// Oldest `last_accessed` first
    #[default]
    Lru,
    /// Lowest `access_count` first, ties by `last_accessed`
    Lfu,
    /// Oldest `created_at` first
    Fifo,
    /// Expired entries first, then soonest to expire
    Ttl,
    /// Largest `size` first
    Size,
}

impl EvictionStrategy {
    pub const ALL: [EvictionStrategy; 5] = [
        EvictionStrategy::Lru,
        EvictionStrategy::Lfu,
        EvictionStrategy::Fifo,
        EvictionStrategy::Ttl,
        EvictionStrategy::Size,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionStrategy::Lru => "lru",
            EvictionStrategy::Lfu => "lfu",
            EvictionStrategy::Fifo => "fifo",
            EvictionStrategy::Ttl => "ttl",
            EvictionStrategy::Size => "size",
        }
    }
}

impl fmt::Display for EvictionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvictionStrategy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lru" => Ok(EvictionStrategy::Lru),
            "lfu" => Ok(EvictionStrategy::Lfu),
            "fifo" => Ok(EvictionStrategy::Fifo),
            "ttl" => Ok(EvictionStrategy::Ttl),
            "size" => Ok(EvictionStrategy::Size),
            other => Err(CacheError::Configuration(format!(
                "unknown eviction strategy '{}'",
                other
            ))),
        }
    }
}

// == Candidate ==
/// One resident entry as seen by the eviction engine.
///
/// Millisecond timestamps tie easily, so the store also hands over its
/// logical `touch_seq` (bumped on every write and hit) and `insert_seq`
/// (bumped on every write) to keep the ordering total and stable.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub meta: &'a CacheEntryMetadata,
    pub touch_seq: u64,
    pub insert_seq: u64,
}

// == Select Victims ==
/// Orders `candidates` so that the first element is the first to evict.
pub fn select_victims(
    mut candidates: Vec<Candidate<'_>>,
    strategy: EvictionStrategy,
    now: u64,
) -> Vec<String> {
    candidates.sort_by(|a, b| compare(a, b, strategy, now));
    candidates
        .into_iter()
        .map(|c| c.meta.key.clone())
        .collect()
}

fn compare(a: &Candidate<'_>, b: &Candidate<'_>, strategy: EvictionStrategy, now: u64) -> Ordering {
    let (ma, mb) = (a.meta, b.meta);
    match strategy {
        EvictionStrategy::Lru => (ma.last_accessed, a.touch_seq).cmp(&(mb.last_accessed, b.touch_seq)),
        EvictionStrategy::Lfu => (ma.access_count, ma.last_accessed, a.touch_seq).cmp(&(
            mb.access_count,
            mb.last_accessed,
            b.touch_seq,
        )),
        EvictionStrategy::Fifo => (ma.created_at, a.insert_seq).cmp(&(mb.created_at, b.insert_seq)),
        EvictionStrategy::Ttl => ttl_rank(ma, now, a.insert_seq).cmp(&ttl_rank(mb, now, b.insert_seq)),
        EvictionStrategy::Size => {
            (Reverse(ma.size), a.insert_seq).cmp(&(Reverse(mb.size), b.insert_seq))
        }
    }
}

/// (not expired, remaining ms, insertion). Entries without a TTL sort last.
fn ttl_rank(meta: &CacheEntryMetadata, now: u64, insert_seq: u64) -> (bool, u64, u64) {
    let remaining = meta.ttl_remaining(now).unwrap_or(u64::MAX);
    (!meta.is_expired(now), remaining, insert_seq)
}
