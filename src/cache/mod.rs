//! File-backed scan cache.
//!
//! Entries are keyed by lowercased owner address plus chain id and hold
//! the reduced pair states, a block-number watermark, and a TTL expiry.
//! A lookup only returns an entry that is still fresh and whose watermark
//! covers the requested range; everything else is a miss and the caller
//! rescans. A corrupt cache file is discarded with a warning, never a
//! fatal error.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::state::ApprovalPairState;

/// Canonical cache key: lowercased hex owner address, colon, chain id.
pub fn cache_key(owner: Address, chain_id: u64) -> String {
    format!("{owner:#x}:{chain_id}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub owner: Address,
    pub chain_id: u64,
    /// Highest block the cached states reflect.
    pub watermark_block: u64,
    pub expires_at: DateTime<Utc>,
    pub pairs: Vec<ApprovalPairState>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    entries: HashMap<String, CacheEntry>,
}

pub struct ScanCache {
    path: PathBuf,
    file: CacheFile,
}

impl ScanCache {
    /// Open or create the cache at `path`. Unreadable or unparseable
    /// content starts a fresh cache.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let file = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(file) => file,
                Err(e) => {
                    tracing::warn!("Discarding corrupt cache {}: {e}", path.display());
                    CacheFile::default()
                }
            },
            Err(_) => CacheFile::default(),
        };
        Self { path, file }
    }

    /// Fresh entry covering blocks up to `to_block`, or `None`.
    pub fn get(
        &self,
        owner: Address,
        chain_id: u64,
        to_block: u64,
        now: DateTime<Utc>,
    ) -> Option<&CacheEntry> {
        self.file
            .entries
            .get(&cache_key(owner, chain_id))
            .filter(|entry| entry.expires_at > now && entry.watermark_block >= to_block)
    }

    pub fn put(
        &mut self,
        owner: Address,
        chain_id: u64,
        watermark_block: u64,
        pairs: Vec<ApprovalPairState>,
        ttl: Duration,
        now: DateTime<Utc>,
    ) {
        self.file.entries.insert(
            cache_key(owner, chain_id),
            CacheEntry {
                owner,
                chain_id,
                watermark_block,
                expires_at: now + ttl,
                pairs,
            },
        );
    }

    /// Write the cache back to disk.
    pub fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&self.file)?)?;
        Ok(())
    }
}
