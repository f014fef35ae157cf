//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Eviction could not free enough bytes for a set
    #[error("Capacity exceeded: {0}")]
    Capacity(String),

    /// Value could not be converted to or from bytes
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Read, write or delete failure on the disk tier (timeouts included)
    #[error("Disk I/O error: {0}")]
    DiskIo(String),

    /// A disk entry exists but could not be parsed
    #[error("Disk entry corrupted: {0}")]
    DiskCorruption(String),

    /// Unknown policy name or invalid configuration value
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid key or value
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A caller-supplied loader failed
    #[error("Loader failed for key '{key}': {message}")]
    Loader { key: String, message: String },
}

impl CacheError {
    /// True for failures that originate in the disk tier.
    pub fn is_disk(&self) -> bool {
        matches!(self, CacheError::DiskIo(_) | CacheError::DiskCorruption(_))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CacheError::Capacity("need 10 bytes".to_string());
        assert_eq!(err.to_string(), "Capacity exceeded: need 10 bytes");

        let err = CacheError::Configuration("unknown eviction strategy 'mru'".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: unknown eviction strategy 'mru'"
        );
    }

    #[test]
    fn test_is_disk() {
        assert!(CacheError::DiskIo("timeout".to_string()).is_disk());
        assert!(CacheError::DiskCorruption("bad json".to_string()).is_disk());
        assert!(!CacheError::Capacity("full".to_string()).is_disk());
    }

    #[test]
    fn test_from_serde_error() {
        let err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let err: CacheError = err.into();
        assert!(matches!(err, CacheError::Serialization(_)));
    }
}
