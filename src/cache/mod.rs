//! Record cache (in-memory or file-backed).
//!
//! The cache stores opaque bytes under a key with a TTL. The pipeline uses
//! it to keep the last collected record set between runs.

pub mod file;
pub mod memory;

pub use file::FileCache;
pub use memory::MemoryCache;

use crate::models::RawRecord;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Key-value store with per-entry expiry.
pub trait RecordCache: Send + Sync {
    /// Bytes stored under `key`, or `None` if absent or expired.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    fn put(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt cache entry: {0}")]
    Corrupt(String),
}

/// Cache key for the record set of one workout kind and client filter.
pub fn record_set_key(kind: u32, client_tags: &[String]) -> String {
    let mut tags: Vec<String> = client_tags.iter().map(|t| t.to_lowercase()).collect();
    tags.sort();
    tags.dedup();
    if tags.is_empty() {
        format!("records-{}", kind)
    } else {
        format!("records-{}-{}", kind, tags.join("+"))
    }
}

/// Record set as stored in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedRecordSet {
    /// Start of the window the set was collected for; the set is complete
    /// from here up to its newest record.
    pub covered_since: i64,
    pub records: Vec<RawRecord>,
}

impl CachedRecordSet {
    pub fn encode(&self) -> Result<Vec<u8>, CacheError> {
        serde_json::to_vec(self).map_err(|e| CacheError::Corrupt(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CacheError> {
        serde_json::from_slice(bytes).map_err(|e| CacheError::Corrupt(e.to_string()))
    }

    /// Newest `created_at` in the set.
    pub fn newest(&self) -> Option<i64> {
        self.records.iter().map(|r| r.created_at).max()
    }
}
