//! Codec Module
//!
//! Converts values to the byte form stored in both tiers, optionally gzipped.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CacheError, Result};

// == Encoded ==
/// Bytes ready to be stored, plus whether they are gzipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub compressed: bool,
}

// == Codec ==
/// JSON codec with optional gzip for large payloads.
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    compression_enabled: bool,
    /// Payloads shorter than this are never compressed
    threshold: usize,
}

impl Codec {
    pub fn new(compression_enabled: bool, threshold: usize) -> Self {
        Self {
            compression_enabled,
            threshold,
        }
    }

    // == Encode ==
    /// Serializes `value`; compresses it when enabled, large enough, and
    /// the compressed form is actually smaller.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Encoded> {
        let raw = serde_json::to_vec(value)?;

        if self.compression_enabled && raw.len() >= self.threshold {
            let packed = gzip(&raw)?;
            if packed.len() < raw.len() {
                return Ok(Encoded {
                    bytes: packed,
                    compressed: true,
                });
            }
        }

        Ok(Encoded {
            bytes: raw,
            compressed: false,
        })
    }

    // == Decode ==
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8], compressed: bool) -> Result<T> {
        if compressed {
            let raw = gunzip(bytes)?;
            Ok(serde_json::from_slice(&raw)?)
        } else {
            Ok(serde_json::from_slice(bytes)?)
        }
    }
}

fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| CacheError::Serialization(format!("compression failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| CacheError::Serialization(format!("compression finish failed: {}", e)))
}

fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CacheError::Serialization(format!("decompression failed: {}", e)))?;
    Ok(out)
}
