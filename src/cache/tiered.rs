//! Two-tier cache composition.
//!
//! [`TieredCache`] pairs the authoritative local tier with an optional
//! remote tier. Reads consult the preferred tier first and fall through on
//! miss or failure; a remote read hit can warm the local tier in the
//! background. Writes are asymmetric on purpose: the local write is
//! authoritative and its failure surfaces, the remote write is a broadcast
//! and its failure is logged and swallowed.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::{CacheManager, CacheTier, Entry};
use crate::error::{ForsetiError, Result};
use crate::fingerprint::Fingerprint;
use crate::telemetry;

/// Read/write routing for a [`TieredCache`].
///
/// Four independent switches; all default to on.
///
/// ```rust
/// # use forseti::cache::TieredConfig;
/// let config = TieredConfig::new()
///     .prefer_local(true)
///     .warm_local_on_remote_hit(false);
/// ```
#[derive(Debug, Clone)]
pub struct TieredConfig {
    /// Consult the local tier first on reads. When false, remote first.
    pub prefer_local: bool,
    /// Whether reads may touch the remote tier at all.
    pub read_from_remote: bool,
    /// Whether writes and deletes are broadcast to the remote tier.
    pub write_to_remote: bool,
    /// After a remote read hit, asynchronously populate the local tier.
    pub warm_local_on_remote_hit: bool,
}

impl Default for TieredConfig {
    fn default() -> Self {
        Self {
            prefer_local: true,
            read_from_remote: true,
            write_to_remote: true,
            warm_local_on_remote_hit: true,
        }
    }
}

impl TieredConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefer_local(mut self, v: bool) -> Self {
        self.prefer_local = v;
        self
    }

    pub fn read_from_remote(mut self, v: bool) -> Self {
        self.read_from_remote = v;
        self
    }

    pub fn write_to_remote(mut self, v: bool) -> Self {
        self.write_to_remote = v;
        self
    }

    pub fn warm_local_on_remote_hit(mut self, v: bool) -> Self {
        self.warm_local_on_remote_hit = v;
        self
    }
}

/// Local + optional remote [`CacheManager`] composition.
pub struct TieredCache {
    local: Arc<dyn CacheManager>,
    remote: Option<Arc<dyn CacheManager>>,
    config: TieredConfig,
}

impl TieredCache {
    pub fn new(
        local: Arc<dyn CacheManager>,
        remote: Option<Arc<dyn CacheManager>>,
        config: TieredConfig,
    ) -> Self {
        Self {
            local,
            remote,
            config,
        }
    }

    /// Local-only composition.
    pub fn local_only(local: Arc<dyn CacheManager>) -> Self {
        Self::new(local, None, TieredConfig::default())
    }

    /// Look up an entry and report which tier served it.
    ///
    /// Read failures other than cancellation fall through to the other
    /// tier for availability; decode failures additionally surface to
    /// telemetry so schema drift stays visible. A miss in every consulted
    /// tier is a plain `CacheMiss`.
    pub async fn get_with_tier(
        &self,
        ctx: &CancellationToken,
        key: &Fingerprint,
    ) -> Result<(Entry, CacheTier)> {
        for tier in self.read_order() {
            let store = match tier {
                CacheTier::Local => &self.local,
                CacheTier::Remote => self.remote.as_ref().expect("read_order checked remote"),
                CacheTier::Memory => unreachable!("memory is not a tiered store"),
            };
            match store.get(ctx, key).await {
                Ok(entry) => {
                    if tier == CacheTier::Remote && self.config.warm_local_on_remote_hit {
                        self.warm_local(entry.clone());
                    }
                    return Ok((entry, tier));
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) if e.is_miss() => continue,
                Err(e) if e.is_decode() => {
                    metrics::counter!(telemetry::CACHE_DECODE_ERRORS_TOTAL,
                        "tier" => tier.as_str())
                    .increment(1);
                    warn!(tier = tier.as_str(), error = %e, "undecodable cache entry, treating as miss");
                    continue;
                }
                Err(e) => {
                    warn!(tier = tier.as_str(), error = %e, "cache read failed, falling through");
                    continue;
                }
            }
        }
        Err(ForsetiError::CacheMiss)
    }

    fn read_order(&self) -> Vec<CacheTier> {
        let remote_readable = self.remote.is_some() && self.config.read_from_remote;
        match (remote_readable, self.config.prefer_local) {
            (false, _) => vec![CacheTier::Local],
            (true, true) => vec![CacheTier::Local, CacheTier::Remote],
            (true, false) => vec![CacheTier::Remote, CacheTier::Local],
        }
    }

    /// Best-effort background population of the local tier after a remote
    /// hit. Failure is logged, never surfaced.
    fn warm_local(&self, entry: Entry) {
        let local = Arc::clone(&self.local);
        // Detached token: warming outlives the originating request.
        let ctx = CancellationToken::new();
        tokio::spawn(async move {
            let hash = entry.key.hash();
            if let Err(e) = local.put(&ctx, entry).await {
                metrics::counter!(telemetry::FAIL_OPEN_TOTAL, "operation" => "warm").increment(1);
                warn!(key = %hash, error = %e, "local warm after remote hit failed");
            } else {
                debug!(key = %hash, "warmed local tier from remote hit");
            }
        });
    }

    /// Broadcast an operation to the remote tier, swallowing failure.
    async fn broadcast<F, Fut>(&self, operation: &'static str, f: F)
    where
        F: FnOnce(Arc<dyn CacheManager>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let Some(remote) = &self.remote else { return };
        if !self.config.write_to_remote {
            return;
        }
        if let Err(e) = f(Arc::clone(remote)).await {
            metrics::counter!(telemetry::FAIL_OPEN_TOTAL, "operation" => operation).increment(1);
            warn!(operation, error = %e, "remote cache broadcast failed");
        }
    }
}

#[async_trait]
impl CacheManager for TieredCache {
    async fn get(&self, ctx: &CancellationToken, key: &Fingerprint) -> Result<Entry> {
        self.get_with_tier(ctx, key).await.map(|(entry, _)| entry)
    }

    /// Local first — its failure is fatal. Remote second — best-effort.
    async fn put(&self, ctx: &CancellationToken, entry: Entry) -> Result<()> {
        self.local.put(ctx, entry.clone()).await?;
        self.broadcast("put", |remote| async move { remote.put(ctx, entry).await })
            .await;
        Ok(())
    }

    async fn delete(&self, ctx: &CancellationToken, key: &Fingerprint) -> Result<()> {
        self.local.delete(ctx, key).await?;
        self.broadcast("delete", |remote| async move { remote.delete(ctx, key).await })
            .await;
        Ok(())
    }
}
