//! Disk Tier Module
//!
//! Persistent fallback: one JSON file per entry, named by a hash of the key,
//! plus `metadata.json` holding the aggregate counters.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::cache::{CacheEntryMetadata, CacheStats};
use crate::error::{CacheError, Result};

/// Aggregate stats file name inside the cache directory.
pub const STATS_FILE: &str = "metadata.json";

const ENTRY_EXTENSION: &str = "entry";

// == Disk Record ==
/// On-disk layout of one entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskRecord {
    pub key: String,
    /// Stored bytes, hex encoded
    pub value: String,
    pub metadata: CacheEntryMetadata,
}

// == Disk Tier ==
#[derive(Debug, Clone)]
pub struct DiskTier {
    dir: PathBuf,
    timeout: Duration,
}

impl DiskTier {
    pub fn new(dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            timeout,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the cache directory if needed.
    pub async fn init(&self) -> Result<()> {
        self.io("create directory", &self.dir, tokio::fs::create_dir_all(&self.dir))
            .await
            .map_err(|e| disk_io("create directory", &self.dir, e))
    }

    // == Key Hashing ==
    /// 128-bit SHA-256 prefix of the key, hex encoded.
    pub fn file_name(key: &str) -> String {
        let digest = Sha256::digest(key.as_bytes());
        format!("{}.{}", hex::encode(&digest[..16]), ENTRY_EXTENSION)
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(Self::file_name(key))
    }

    // == Load ==
    /// Reads an entry. Missing files, hash collisions and expired entries
    /// are all `Ok(None)`; expired files are deleted on the way.
    ///
    /// Unparseable files are reported as `DiskCorruption` and removed.
    pub async fn load(&self, key: &str, now: u64) -> Result<Option<(Vec<u8>, CacheEntryMetadata)>> {
        let path = self.path_for(key);
        let record = match self.read_record(&path).await? {
            Some(record) => record,
            None => return Ok(None),
        };

        if record.key != key {
            debug!("Disk entry {} belongs to another key", path.display());
            return Ok(None);
        }

        if record.metadata.is_expired(now) {
            debug!("Disk entry for '{}' expired, removing", key);
            self.remove_file(&path).await?;
            return Ok(None);
        }

        match hex::decode(&record.value) {
            Ok(bytes) => Ok(Some((bytes, record.metadata))),
            Err(e) => {
                self.discard_corrupt(&path).await;
                Err(CacheError::DiskCorruption(format!(
                    "{}: bad value encoding: {}",
                    path.display(),
                    e
                )))
            }
        }
    }

    /// Reads and parses one entry file without any TTL check.
    pub async fn read_record(&self, path: &Path) -> Result<Option<DiskRecord>> {
        let data = match self.io("read", path, tokio::fs::read(path)).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(disk_io("read", path, e)),
        };

        match serde_json::from_slice::<DiskRecord>(&data) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                self.discard_corrupt(path).await;
                Err(CacheError::DiskCorruption(format!("{}: {}", path.display(), e)))
            }
        }
    }

    // == Save ==
    /// Writes an entry via a temp file and rename, so readers never see a
    /// partially written file.
    pub async fn save(&self, key: &str, bytes: &[u8], metadata: &CacheEntryMetadata) -> Result<()> {
        let record = DiskRecord {
            key: key.to_string(),
            value: hex::encode(bytes),
            metadata: metadata.clone(),
        };
        let data = serde_json::to_vec(&record)?;
        self.write_atomic(&self.path_for(key), &data).await
    }

    // == Delete ==
    /// Removes an entry. Returns whether a file was there.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        self.remove_file(&self.path_for(key)).await
    }

    // == Clear ==
    /// Removes every entry file; the stats file is kept.
    pub async fn clear_all(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.entry_paths().await? {
            if self.remove_file(&path).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    // == List ==
    /// Paths of every entry file in the cache directory.
    pub async fn entry_paths(&self) -> Result<Vec<PathBuf>> {
        let mut dir = match self.io("list", &self.dir, tokio::fs::read_dir(&self.dir)).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(disk_io("list", &self.dir, e)),
        };

        let mut paths = Vec::new();
        loop {
            let next = self
                .io("list", &self.dir, dir.next_entry())
                .await
                .map_err(|e| disk_io("list", &self.dir, e))?;
            match next {
                Some(entry) => {
                    let path = entry.path();
                    if path.extension().and_then(|ext| ext.to_str()) == Some(ENTRY_EXTENSION) {
                        paths.push(path);
                    }
                }
                None => break,
            }
        }
        Ok(paths)
    }

    // == Stats File ==
    pub async fn load_stats(&self) -> Result<Option<CacheStats>> {
        let path = self.dir.join(STATS_FILE);
        let data = match self.io("read", &path, tokio::fs::read(&path)).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(disk_io("read", &path, e)),
        };

        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| CacheError::DiskCorruption(format!("{}: {}", path.display(), e)))
    }

    pub async fn save_stats(&self, stats: &CacheStats) -> Result<()> {
        let data = serde_json::to_vec_pretty(stats)?;
        self.write_atomic(&self.dir.join(STATS_FILE), &data).await
    }

    // == Helpers ==
    async fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        let tmp = path.with_extension("tmp");
        self.io("write", &tmp, tokio::fs::write(&tmp, data))
            .await
            .map_err(|e| disk_io("write", &tmp, e))?;

        if let Err(e) = self.io("rename", path, tokio::fs::rename(&tmp, path)).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(disk_io("rename", path, e));
        }
        Ok(())
    }

    async fn remove_file(&self, path: &Path) -> Result<bool> {
        match self.io("delete", path, tokio::fs::remove_file(path)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(disk_io("delete", path, e)),
        }
    }

    async fn discard_corrupt(&self, path: &Path) {
        if let Err(e) = self.remove_file(path).await {
            warn!("Failed to remove corrupt disk entry: {}", e);
        }
    }

    /// Runs one filesystem call under the configured timeout; a timeout is
    /// reported as `io::ErrorKind::TimedOut`.
    async fn io<T, F>(&self, op: &str, path: &Path, fut: F) -> io::Result<T>
    where
        F: Future<Output = io::Result<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("{} {} timed out after {:?}", op, path.display(), self.timeout),
            )),
        }
    }
}

fn disk_io(op: &str, path: &Path, err: io::Error) -> CacheError {
    CacheError::DiskIo(format!("{} {}: {}", op, path.display(), err))
}
