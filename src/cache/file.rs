// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! File-backed cache: one JSON envelope per key in a directory.
//!
//! Envelope: `{"expires_at": <rfc3339>, "data": <base64>}`. Writes go to a
//! temporary file that is renamed into place, so readers never see a
//! partially written entry.

use super::{CacheError, RecordCache};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Serialize, Deserialize)]
struct Envelope {
    expires_at: DateTime<Utc>,
    data: String,
}

#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Use `dir` for cache files, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Hex-encoded key, so every distinct key gets its own file and none
    /// can escape the directory.
    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hex::encode(key)))
    }
}

impl RecordCache for FileCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.path_for(key);
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let envelope: Envelope = serde_json::from_str(&json)
            .map_err(|e| CacheError::Corrupt(format!("{}: {}", path.display(), e)))?;

        if envelope.expires_at <= Utc::now() {
            tracing::debug!(key, "Cache entry expired");
            return Ok(None);
        }

        BASE64
            .decode(envelope.data)
            .map(Some)
            .map_err(|e| CacheError::Corrupt(format!("{}: {}", path.display(), e)))
    }

    fn put(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| CacheError::Corrupt(format!("invalid TTL: {}", e)))?;
        let envelope = Envelope {
            expires_at: Utc::now() + ttl,
            data: BASE64.encode(value),
        };
        let json =
            serde_json::to_vec(&envelope).map_err(|e| CacheError::Corrupt(e.to_string()))?;

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}
