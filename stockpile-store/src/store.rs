//! File-backed store with lazy TTL expiry

use crate::key::CacheKey;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;
use stockpile_core::StorageError;

/// Freshness policy for stored entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTtl {
    /// Entries never expire.
    Persistent,
    /// Entries older than this are treated as absent on reads.
    After(Duration),
}

impl CacheTtl {
    fn is_expired(&self, stored_at: i64, now: i64) -> bool {
        match self {
            CacheTtl::Persistent => false,
            CacheTtl::After(ttl) => now - stored_at >= ttl.as_secs() as i64,
        }
    }
}

/// Persisted entry: the raw payload plus its unix-seconds insert time.
/// The on-disk file is a JSON object mapping hex digest to this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    data: Value,
    timestamp: i64,
}

/// Lookup counters for one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Hit rate in [0, 1]; 0.0 when no lookups have happened yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Write-through key-value store.
///
/// Shared across workers behind an `Arc`; all interior state is lock- or
/// atomic-guarded. The store is never a correctness dependency: a corrupt
/// file is recovered from silently at open, and a poisoned lock degrades
/// reads to misses and writes to no-ops.
#[derive(Debug)]
pub struct CacheStore {
    path: Option<PathBuf>,
    ttl: CacheTtl,
    entries: RwLock<HashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStore {
    /// Open a file-backed store, loading whatever the file holds.
    ///
    /// A missing file starts empty. A corrupt or unreadable file is logged
    /// at WARN and also starts empty - the previous contents are abandoned,
    /// not propagated as an error. Entries already past the TTL are dropped
    /// while loading.
    pub fn open(path: impl Into<PathBuf>, ttl: CacheTtl) -> Self {
        let path = path.into();
        let entries = load_entries(&path, ttl);
        Self {
            path: Some(path),
            ttl,
            entries: RwLock::new(entries),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Memory-only store, for tests and ephemeral use.
    pub fn in_memory(ttl: CacheTtl) -> Self {
        Self {
            path: None,
            ttl,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Fresh-entry lookup against the current wall clock.
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        self.get_as_of(key, Utc::now().timestamp())
    }

    /// Fresh-entry lookup against an explicit unix-seconds clock.
    ///
    /// An expired entry counts as a miss but is left in place; overwrites
    /// and `clear` are the only physical removals after load.
    pub fn get_as_of(&self, key: &CacheKey, now: i64) -> Option<Value> {
        let found = self.entries.read().ok().and_then(|map| {
            map.get(key.as_str()).and_then(|entry| {
                if self.ttl.is_expired(entry.timestamp, now) {
                    None
                } else {
                    Some(entry.data.clone())
                }
            })
        });

        match found {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert a payload, stamped now, and write the whole map to disk.
    ///
    /// One write per insert: durability over batching, so an interrupted
    /// run never loses more than the in-flight entry.
    pub fn put(&self, key: &CacheKey, data: Value) -> Result<(), StorageError> {
        let entry = CacheEntry {
            data,
            timestamp: Utc::now().timestamp(),
        };
        if let Ok(mut map) = self.entries.write() {
            map.insert(key.as_str().to_string(), entry);
        }
        self.persist()
    }

    /// Drop every entry and remove the backing file.
    pub fn clear(&self) -> Result<(), StorageError> {
        if let Ok(mut map) = self.entries.write() {
            map.clear();
        }
        if let Some(path) = &self.path {
            if path.exists() {
                std::fs::remove_file(path).map_err(|e| StorageError::Io {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    fn persist(&self) -> Result<(), StorageError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let Ok(map) = self.entries.read() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        }
        let contents = serde_json::to_string_pretty(&*map).map_err(|e| StorageError::Serialize {
            reason: e.to_string(),
        })?;
        std::fs::write(path, contents).map_err(|e| StorageError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

fn load_entries(path: &Path, ttl: CacheTtl) -> HashMap<String, CacheEntry> {
    if !path.exists() {
        return HashMap::new();
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Cache file unreadable, starting empty"
            );
            return HashMap::new();
        }
    };

    let mut entries: HashMap<String, CacheEntry> = match serde_json::from_str(&contents) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Cache file corrupt, starting empty"
            );
            return HashMap::new();
        }
    };

    let before = entries.len();
    let now = Utc::now().timestamp();
    entries.retain(|_, entry| !ttl.is_expired(entry.timestamp, now));
    tracing::debug!(
        path = %path.display(),
        loaded = entries.len(),
        expired = before - entries.len(),
        "Cache loaded"
    );
    entries
}

// ============================================================================
// TESTS
// ============================================================================
