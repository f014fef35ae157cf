//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{EvictionStrategy, ReadPolicy, WritePolicy};
use crate::error::{CacheError, Result};

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Memory tier byte budget
    pub max_size: u64,
    /// TTL in milliseconds for entries set without one, 0 = never expire
    pub default_ttl_ms: u64,
    pub compression_enabled: bool,
    /// Serialized payloads below this many bytes are never compressed
    pub compression_threshold: usize,
    pub cache_directory: PathBuf,
    /// Interval between background expiry sweeps
    pub sweep_interval_ms: u64,
    /// Upper bound on any single disk operation
    pub disk_timeout_ms: u64,
    pub default_strategy: EvictionStrategy,
    pub default_write_policy: WritePolicy,
    pub default_read_policy: ReadPolicy,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_SIZE` - Byte budget (default: 100 MiB)
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in ms (default: 3600000)
    /// - `CACHE_COMPRESSION` - `true`/`false` (default: true)
    /// - `CACHE_COMPRESSION_THRESHOLD` - Bytes (default: 1024)
    /// - `CACHE_DIR` - Cache directory (default: `.cache`)
    /// - `CACHE_SWEEP_INTERVAL_MS` - Sweep interval in ms (default: 60000)
    /// - `CACHE_DISK_TIMEOUT_MS` - Disk timeout in ms (default: 5000)
    /// - `CACHE_STRATEGY` - `lru`, `lfu`, `fifo`, `ttl`, `size` (default: lru)
    /// - `CACHE_WRITE_POLICY` - `write-through`, `write-behind`, `write-around`
    /// - `CACHE_READ_POLICY` - `cache-aside`, `read-through`
    ///
    /// Unparseable numbers fall back to the default; unknown policy names
    /// are a `Configuration` error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let number = |name: &str, default: u64| -> u64 {
            lookup(name)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        Ok(Self {
            max_size: number("CACHE_MAX_SIZE", defaults.max_size),
            default_ttl_ms: number("CACHE_DEFAULT_TTL_MS", defaults.default_ttl_ms),
            compression_enabled: lookup("CACHE_COMPRESSION")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.compression_enabled),
            compression_threshold: number(
                "CACHE_COMPRESSION_THRESHOLD",
                defaults.compression_threshold as u64,
            ) as usize,
            cache_directory: lookup("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_directory),
            sweep_interval_ms: number("CACHE_SWEEP_INTERVAL_MS", defaults.sweep_interval_ms),
            disk_timeout_ms: number("CACHE_DISK_TIMEOUT_MS", defaults.disk_timeout_ms),
            default_strategy: parse_or(lookup("CACHE_STRATEGY"), defaults.default_strategy)?,
            default_write_policy: parse_or(
                lookup("CACHE_WRITE_POLICY"),
                defaults.default_write_policy,
            )?,
            default_read_policy: parse_or(
                lookup("CACHE_READ_POLICY"),
                defaults.default_read_policy,
            )?,
        })
    }

    /// Rejects values the cache cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(CacheError::Configuration(
                "max size must be greater than zero".to_string(),
            ));
        }
        if self.sweep_interval_ms == 0 {
            return Err(CacheError::Configuration(
                "sweep interval must be greater than zero".to_string(),
            ));
        }
        if self.disk_timeout_ms == 0 {
            return Err(CacheError::Configuration(
                "disk timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn disk_timeout(&self) -> Duration {
        Duration::from_millis(self.disk_timeout_ms)
    }
}

fn parse_or<T>(value: Option<String>, default: T) -> Result<T>
where
    T: FromStr<Err = CacheError>,
{
    match value {
        Some(v) if !v.trim().is_empty() => v.parse(),
        _ => Ok(default),
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 100 * 1024 * 1024,
            default_ttl_ms: 60 * 60 * 1000,
            compression_enabled: true,
            compression_threshold: 1024,
            cache_directory: PathBuf::from(".cache"),
            sweep_interval_ms: 60_000,
            disk_timeout_ms: 5_000,
            default_strategy: EvictionStrategy::Lru,
            default_write_policy: WritePolicy::WriteThrough,
            default_read_policy: ReadPolicy::CacheAside,
        }
    }
}
