//! Policy Module
//!
//! Write and read policies, and the per-call options for `Cache::set`.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cache::EvictionStrategy;
use crate::error::CacheError;

// == Write Policy ==
/// How a `set` propagates between the memory and disk tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WritePolicy {
    /// Memory, then disk before returning; disk errors surface
    #[default]
    WriteThrough,
    /// Memory now, disk from a background queue; disk errors are logged
    WriteBehind,
    /// Disk only; any resident copy is dropped from memory
    WriteAround,
}

impl WritePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            WritePolicy::WriteThrough => "write-through",
            WritePolicy::WriteBehind => "write-behind",
            WritePolicy::WriteAround => "write-around",
        }
    }
}

impl fmt::Display for WritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WritePolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "write-through" => Ok(WritePolicy::WriteThrough),
            "write-behind" => Ok(WritePolicy::WriteBehind),
            "write-around" => Ok(WritePolicy::WriteAround),
            other => Err(CacheError::Configuration(format!(
                "unknown write policy '{}'",
                other
            ))),
        }
    }
}

// == Read Policy ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadPolicy {
    /// Memory, then disk (promoting on hit), else absent
    #[default]
    CacheAside,
    /// As cache-aside, but a miss invokes the caller's loader and stores the result
    ReadThrough,
}

impl ReadPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadPolicy::CacheAside => "cache-aside",
            ReadPolicy::ReadThrough => "read-through",
        }
    }
}

impl fmt::Display for ReadPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadPolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cache-aside" => Ok(ReadPolicy::CacheAside),
            "read-through" => Ok(ReadPolicy::ReadThrough),
            other => Err(CacheError::Configuration(format!(
                "unknown read policy '{}'",
                other
            ))),
        }
    }
}

// == Set Options ==
/// Per-call overrides for `Cache::set`. Unset fields fall back to the
/// cache-wide defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetOptions {
    /// TTL in milliseconds; `Some(0)` and `None` both mean "use the default"
    pub ttl_ms: Option<u64>,
    pub strategy: Option<EvictionStrategy>,
    pub write_policy: Option<WritePolicy>,
    pub tags: BTreeSet<String>,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = Some(ttl_ms);
        self
    }

    pub fn strategy(mut self, strategy: EvictionStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn write_policy(mut self, policy: WritePolicy) -> Self {
        self.write_policy = Some(policy);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_write_policy() {
        assert_eq!(
            "write-behind".parse::<WritePolicy>().unwrap(),
            WritePolicy::WriteBehind
        );
        assert_eq!(
            " Write-Around ".parse::<WritePolicy>().unwrap(),
            WritePolicy::WriteAround
        );
        assert_eq!(WritePolicy::WriteThrough.to_string(), "write-through");
        assert!(matches!(
            "write-sometimes".parse::<WritePolicy>(),
            Err(CacheError::Configuration(_))
        ));
    }

    #[test]
    fn test_parse_read_policy() {
        assert_eq!(
            "read-through".parse::<ReadPolicy>().unwrap(),
            ReadPolicy::ReadThrough
        );
        assert_eq!(ReadPolicy::default(), ReadPolicy::CacheAside);
        assert!("refresh-ahead".parse::<ReadPolicy>().is_err());
    }

    #[test]
    fn test_set_options_builder() {
        let options = SetOptions::new()
            .ttl_ms(500)
            .strategy(EvictionStrategy::Size)
            .write_policy(WritePolicy::WriteAround)
            .tag("schema")
            .tags(["migrations", "schema"]);

        assert_eq!(options.ttl_ms, Some(500));
        assert_eq!(options.strategy, Some(EvictionStrategy::Size));
        assert_eq!(options.write_policy, Some(WritePolicy::WriteAround));
        assert_eq!(options.tags.len(), 2);
    }
}
