//! Cache Module
//!
//! Two-tier (memory + disk) caching with pluggable eviction strategies,
//! write/read policies, TTL expiration and tag/pattern invalidation.

mod clock;
mod codec;
mod disk;
mod entry;
mod eviction;
mod facade;
mod policy;
mod stats;
mod store;


// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{Codec, Encoded};
pub use disk::{DiskRecord, DiskTier, STATS_FILE};
pub use entry::CacheEntryMetadata;
pub use eviction::{select_victims, Candidate, EvictionStrategy};
pub use facade::Cache;
pub use policy::{ReadPolicy, SetOptions, WritePolicy};
pub use stats::{CacheStats, StatsSnapshot};
pub use store::{Lookup, MemoryStore};

pub(crate) use facade::Tiers;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;
