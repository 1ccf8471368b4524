// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process cache shared across requests.

use super::{CacheError, RecordCache};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
struct CachedEntry {
    bytes: Vec<u8>,
    expires_at: DateTime<Utc>,
}

/// DashMap-backed cache. Clones share the same entries.
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<DashMap<String, CachedEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RecordCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let now = Utc::now();
        if let Some(entry) = self.entries.get(key) {
            if now < entry.expires_at {
                return Ok(Some(entry.bytes.clone()));
            }
        }
        // Expired entries are dropped on read
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        Ok(None)
    }

    fn put(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| CacheError::Corrupt(format!("invalid TTL: {}", e)))?;
        self.entries.insert(
            key.to_string(),
            CachedEntry {
                bytes: value.to_vec(),
                expires_at: Utc::now() + ttl,
            },
        );
        Ok(())
    }
}
