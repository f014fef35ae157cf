//! Intelligent Cache - A two-tier in-process cache
//!
//! Memory + disk key/value cache with pluggable eviction strategies,
//! write/read policies, TTL expiration and tag/pattern invalidation.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{Cache, EvictionStrategy, ReadPolicy, SetOptions, StatsSnapshot, WritePolicy};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use tasks::spawn_sweeper_task;
