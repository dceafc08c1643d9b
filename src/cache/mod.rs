//! Caching subsystem.
//!
//! Three kinds of store cooperate to keep analyzer calls rare:
//!
//! - [`LocalStore`] — the authoritative durable tier, one JSON file per
//!   entry under a configurable directory.
//!
//! - [`RemoteStore`] — the same contract over HTTP, shared between
//!   machines. Writes to it are best-effort broadcast; reads fall back to
//!   the other tier on failure.
//!
//! - [`TieredCache`] — composes the two with configurable read order,
//!   warm-on-hit promotion, and fail-open remote writes.
//!
//! All three implement [`CacheManager`], the contract the protocol layer
//! consumes. A fourth store, [`MemoryCache`], is process-local and bounded;
//! the pipeline uses it for hot-path lookups keyed by fingerprint hash and
//! it is deliberately *not* a `CacheManager`.

pub mod local;
pub mod memory;
pub mod remote;
pub mod tiered;

pub use local::LocalStore;
pub use memory::{Lookup, MemoryCache, MemoryConfig};
pub use remote::{RemoteConfig, RemoteStore};
pub use tiered::{TieredCache, TieredConfig};

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::types::Finding;

/// A cached analysis result.
///
/// Entries are immutable once written; a `put` on an existing key replaces
/// the whole entry. `timestamp` is stamped inside `put` (seconds since
/// epoch) — callers cannot supply it, and last-writer-wins is the rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// The fingerprint this result was derived from.
    pub key: Fingerprint,
    /// The findings, opaque to the cache.
    pub results: Vec<Finding>,
    /// Creation time, seconds since epoch. Zero until first `put`.
    #[serde(default)]
    pub timestamp: u64,
}

impl Entry {
    pub fn new(key: Fingerprint, results: Vec<Finding>) -> Self {
        Self {
            key,
            results,
            timestamp: 0,
        }
    }
}

/// Current wall-clock time as seconds since epoch.
pub(crate) fn epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The storage contract consumed by the protocol layer.
///
/// Implemented by [`LocalStore`], [`RemoteStore`], and [`TieredCache`].
/// Every operation takes an explicit cancellation handle; a fired handle
/// surfaces as [`ForsetiError::Cancelled`](crate::ForsetiError::Cancelled),
/// never as a silent miss.
#[async_trait]
pub trait CacheManager: Send + Sync {
    /// Look up the entry for a fingerprint.
    ///
    /// Absence is the distinct [`CacheMiss`](crate::ForsetiError::CacheMiss)
    /// error kind, not an I/O failure.
    async fn get(&self, ctx: &CancellationToken, key: &Fingerprint) -> Result<Entry>;

    /// Store an entry, stamping its timestamp. Overwrites an existing key.
    async fn put(&self, ctx: &CancellationToken, entry: Entry) -> Result<()>;

    /// Remove the entry for a fingerprint. Idempotent — deleting an absent
    /// key succeeds.
    async fn delete(&self, ctx: &CancellationToken, key: &Fingerprint) -> Result<()>;
}

/// Counters snapshot for a bounded cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
    pub max_size: usize,
}

impl CacheStats {
    /// Fraction of lookups served from cache; 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Which tier served a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTier {
    Memory,
    Local,
    Remote,
}

impl CacheTier {
    /// Label value for telemetry.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_zero_without_lookups() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn hit_rate_counts_both_sides() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn entry_deserializes_without_timestamp() {
        let json = r#"{
            "key": {
                "file_hash": "h", "file_path": "/f", "provider": "p",
                "model": "m", "baml_version": "v", "policies": {}
            },
            "results": []
        }"#;
        let entry: Entry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.timestamp, 0);
    }
}
