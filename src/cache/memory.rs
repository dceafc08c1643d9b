//! Process-local bounded cache with TTL.
//!
//! [`MemoryCache`] is the pipeline's hot path: a thread-safe map from
//! opaque string keys (fingerprint hashes) to cloneable values, bounded by
//! entry count with oldest-first eviction and per-entry TTL. It is *not* a
//! [`CacheManager`](crate::cache::CacheManager) — durable tiers key on
//! structured fingerprints; this one trades generality for a synchronous,
//! allocation-light lookup.
//!
//! Expiry is lazy: an expired entry is dropped by the `get` that finds it
//! (counted as a miss, reported as [`Lookup::Expired`] so callers can track
//! staleness separately). The cache never spawns its own timer — callers
//! that want proactive reclamation invoke [`cleanup()`](MemoryCache::cleanup)
//! on their own schedule.
//!
//! One `RwLock` guards the map and the counters together, which keeps a
//! stats snapshot consistent with the content it describes. Lookups mutate
//! per-entry hit counts and the hit/miss totals, so `get` runs one
//! write-side critical section rather than a read-probe with an upgrade.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::cache::CacheStats;
use crate::telemetry;

/// Configuration for a [`MemoryCache`].
///
/// ```rust
/// # use forseti::cache::MemoryConfig;
/// # use std::time::Duration;
/// let config = MemoryConfig::new()
///     .max_size(500)
///     .default_ttl(Duration::from_secs(600));
/// ```
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Maximum number of entries. Default: 1000.
    pub max_size: usize,
    /// TTL applied by [`set`](MemoryCache::set). `Duration::ZERO` means
    /// entries never expire. Default: 1 hour.
    pub default_ttl: Duration,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            default_ttl: Duration::from_secs(3600),
        }
    }
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_size(mut self, n: usize) -> Self {
        self.max_size = n;
        self
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }
}

/// Outcome of a detailed lookup.
///
/// `Expired` and `Miss` both count as misses in [`CacheStats`]; the
/// distinction feeds the stale counter of the stats collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<V> {
    Hit(V),
    Miss,
    /// The key was present but past its TTL; the entry has been dropped.
    Expired,
}

struct MemoryEntry<V> {
    value: V,
    created_at: Instant,
    /// `None` means the entry never expires.
    expires_at: Option<Instant>,
    hit_count: u64,
}

struct Inner<V> {
    entries: HashMap<String, MemoryEntry<V>>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Bounded, TTL'd, thread-safe cache keyed by opaque strings.
pub struct MemoryCache<V> {
    inner: RwLock<Inner<V>>,
    config: MemoryConfig,
}

impl<V: Clone> MemoryCache<V> {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            config,
        }
    }

    /// Look up a value. Expired entries are dropped and count as misses.
    pub fn get(&self, key: &str) -> Option<V> {
        match self.get_detailed(key) {
            Lookup::Hit(v) => Some(v),
            Lookup::Miss | Lookup::Expired => None,
        }
    }

    /// Look up a value, distinguishing expired entries from plain misses.
    pub fn get_detailed(&self, key: &str) -> Lookup<V> {
        let now = Instant::now();
        let mut inner = self.inner.write().expect("cache lock poisoned");

        // Probe first, then act: the probe decides which counters move.
        let expired = inner
            .entries
            .get(key)
            .map(|e| e.expires_at.is_some_and(|at| now >= at));
        match expired {
            None => {
                inner.misses += 1;
                Lookup::Miss
            }
            Some(true) => {
                inner.entries.remove(key);
                inner.misses += 1;
                Lookup::Expired
            }
            Some(false) => {
                let entry = inner
                    .entries
                    .get_mut(key)
                    .expect("probed under the same lock");
                entry.hit_count += 1;
                let value = entry.value.clone();
                inner.hits += 1;
                Lookup::Hit(value)
            }
        }
    }

    /// Insert with the configured default TTL.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.config.default_ttl);
    }

    /// Insert with an explicit TTL. `Duration::ZERO` means never expire.
    ///
    /// Inserting a new key into a full cache evicts exactly one entry —
    /// the oldest by creation time. Overwriting an existing key evicts
    /// nothing.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let now = Instant::now();
        let mut inner = self.inner.write().expect("cache lock poisoned");

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.config.max_size {
            if let Some(oldest) = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.created_at)
                .map(|(k, _)| k.clone())
            {
                inner.entries.remove(&oldest);
                inner.evictions += 1;
                metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL).increment(1);
            }
        }

        inner.entries.insert(
            key,
            MemoryEntry {
                value,
                created_at: now,
                expires_at: (!ttl.is_zero()).then(|| now + ttl),
                hit_count: 0,
            },
        );
    }

    /// Remove a key. Returns whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        self.inner
            .write()
            .expect("cache lock poisoned")
            .entries
            .remove(key)
            .is_some()
    }

    /// Drop every entry. Counters are preserved.
    pub fn clear(&self) {
        self.inner
            .write()
            .expect("cache lock poisoned")
            .entries
            .clear();
    }

    /// Current entry count.
    pub fn size(&self) -> usize {
        self.inner.read().expect("cache lock poisoned").entries.len()
    }

    /// Counters snapshot, consistent with the content at the instant of
    /// the call.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.read().expect("cache lock poisoned");
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            size: inner.entries.len(),
            max_size: self.config.max_size,
        }
    }

    /// Drop all expired entries now, returning how many were removed.
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.write().expect("cache lock poisoned");
        let before = inner.entries.len();
        inner
            .entries
            .retain(|_, e| !e.expires_at.is_some_and(|at| now >= at));
        before - inner.entries.len()
    }
}
