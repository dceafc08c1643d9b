//! The analysis pipeline.
//!
//! [`AnalysisPipeline`] is the coordinator between change events and the
//! expensive analyzer: a bounded work queue consumed by a small worker
//! pool, fronted by the in-memory cache and the durable tiers, with
//! single-flight deduplication per fingerprint.
//!
//! # Lookup chain
//!
//! `submit` serves memory hits synchronously. Otherwise the item's
//! fingerprint is registered in the waiters map — if an analysis for the
//! same fingerprint is already pending, the new submission just attaches
//! and no work is queued. The first waiter enqueues; a worker re-checks
//! the memory cache, consults the tiered durable cache, and only then
//! invokes the analyzer. Results fan out to every waiter registered under
//! the fingerprint, each channel closed exactly once. Errors are
//! delivered to all waiters and never cached.
//!
//! # Shutdown
//!
//! [`stop()`](AnalysisPipeline::stop) cancels the lifetime token, joins
//! the workers, and unwinds every undelivered waiter with a cancellation
//! result. [`submit_and_wait`](AnalysisPipeline::submit_and_wait) honors
//! its caller's own token independently — a cancelled caller walks away
//! while the background work may still complete and warm the cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::analyzer::{Analyzer, Usage};
use crate::cache::{CacheManager, CacheTier, Entry, Lookup, MemoryCache, MemoryConfig, TieredCache};
use crate::error::ForsetiError;
use crate::fingerprint::Fingerprint;
use crate::stats::{AnalysisEvent, CollectorConfig, MetricsCollector, StatsReport};
use crate::telemetry;
use crate::types::{Finding, WorkItem, WorkResult, dedup_findings};

/// Configuration for an [`AnalysisPipeline`].
///
/// ```rust
/// # use forseti::pipeline::PipelineConfig;
/// # use forseti::cache::MemoryConfig;
/// let config = PipelineConfig::new()
///     .workers(4)
///     .queue_capacity(256)
///     .memory(MemoryConfig::new().max_size(5000));
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Worker pool size. Default: 2.
    pub workers: usize,
    /// Bounded queue capacity. Default: 100.
    pub queue_capacity: usize,
    /// In-memory hot-path cache settings.
    pub memory: MemoryConfig,
    /// Stats collector settings.
    pub collector: CollectorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 100,
            memory: MemoryConfig::default(),
            collector: CollectorConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.workers = n.max(1);
        self
    }

    pub fn queue_capacity(mut self, n: usize) -> Self {
        self.queue_capacity = n.max(1);
        self
    }

    pub fn memory(mut self, config: MemoryConfig) -> Self {
        self.memory = config;
        self
    }

    pub fn collector(mut self, config: CollectorConfig) -> Self {
        self.collector = config;
        self
    }
}

/// Pipeline counters for the common-path stats query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Results delivered to waiters.
    pub processed: u64,
    /// Error results delivered to waiters.
    pub errors: u64,
    /// Results served from any cache tier.
    pub cache_hits: u64,
    /// Items currently sitting in the work queue.
    pub queue_depth: usize,
}

struct Waiter {
    id: String,
    submitted_at: Instant,
    tx: oneshot::Sender<WorkResult>,
}

struct QueueItem {
    item: WorkItem,
    key: Fingerprint,
    key_hash: String,
    enqueued_at: Instant,
}

struct PipelineInner {
    analyzer: Arc<dyn Analyzer>,
    cache: Arc<TieredCache>,
    memory: MemoryCache<Arc<Vec<Finding>>>,
    waiters: Mutex<HashMap<String, Vec<Waiter>>>,
    shutdown: CancellationToken,
    collector: MetricsCollector,
    processed: AtomicU64,
    errors: AtomicU64,
    cache_hits: AtomicU64,
}

/// Deduplicating worker pipeline in front of the analyzer.
pub struct AnalysisPipeline {
    inner: Arc<PipelineInner>,
    tx: mpsc::Sender<QueueItem>,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<QueueItem>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl AnalysisPipeline {
    /// Start a pipeline: spawns the worker pool immediately.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context.
    pub fn new(
        analyzer: Arc<dyn Analyzer>,
        cache: Arc<TieredCache>,
        config: PipelineConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let inner = Arc::new(PipelineInner {
            analyzer,
            cache,
            memory: MemoryCache::new(config.memory.clone()),
            waiters: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
            collector: MetricsCollector::new(config.collector.clone()),
            processed: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
        });

        let workers = (0..config.workers)
            .map(|worker| {
                let inner = Arc::clone(&inner);
                let rx = Arc::clone(&rx);
                tokio::spawn(async move {
                    debug!(worker, "analysis worker started");
                    worker_loop(inner, rx).await;
                    debug!(worker, "analysis worker stopped");
                })
            })
            .collect();

        Self {
            inner,
            tx,
            rx,
            workers: Mutex::new(workers),
        }
    }

    /// Submit an item, returning the channel its result will arrive on.
    ///
    /// Memory hits are delivered synchronously before this returns.
    /// Concurrent submissions of the same fingerprint share one analysis
    /// (single flight); each receives its own result carrying its own id.
    pub async fn submit(&self, item: WorkItem) -> oneshot::Receiver<WorkResult> {
        let submitted_at = Instant::now();
        let (tx, rx) = oneshot::channel();

        if self.inner.shutdown.is_cancelled() {
            let _ = tx.send(WorkResult::cancelled(item.id, submitted_at.elapsed()));
            return rx;
        }

        let key = self.fingerprint(&item);
        let key_hash = key.hash();

        // Hot path: serve straight from memory.
        match self.inner.memory.get_detailed(&key_hash) {
            Lookup::Hit(findings) => {
                self.inner.note_delivery(
                    CacheOutcome::Hit(CacheTier::Memory),
                    1,
                    AnalysisEvent {
                        total_duration: submitted_at.elapsed(),
                        tier: Some(CacheTier::Memory),
                        findings: findings.len(),
                        ..Default::default()
                    },
                );
                let _ = tx.send(WorkResult {
                    id: item.id,
                    outcome: Ok(findings.as_ref().clone()),
                    from_cache: true,
                    elapsed: submitted_at.elapsed(),
                });
                return rx;
            }
            Lookup::Expired => self.inner.collector.record_stale(),
            Lookup::Miss => {}
        }

        // Single flight: attach to a pending analysis when one exists.
        let waiter = Waiter {
            id: item.id.clone(),
            submitted_at,
            tx,
        };
        {
            let mut waiters = self.inner.waiters.lock().expect("waiters lock poisoned");
            if let Some(list) = waiters.get_mut(&key_hash) {
                list.push(waiter);
                debug!(key = %key_hash, waiters = list.len(), "attached to pending analysis");
                return rx;
            }
            waiters.insert(key_hash.clone(), vec![waiter]);
        }

        // First waiter for this fingerprint: enqueue. Registration happened
        // before the push, so a worker can never observe an empty list.
        let queue_item = QueueItem {
            item,
            key,
            key_hash: key_hash.clone(),
            enqueued_at: Instant::now(),
        };
        if self.tx.send(queue_item).await.is_err() || self.inner.shutdown.is_cancelled() {
            self.inner.fail_waiters(&key_hash, ForsetiError::ShuttingDown);
        }
        rx
    }

    /// [`submit`](Self::submit) plus a wait bounded by the caller's token.
    ///
    /// A cancelled caller receives a cancellation result; the background
    /// work is not stopped and may still populate the caches.
    pub async fn submit_and_wait(&self, ctx: &CancellationToken, item: WorkItem) -> WorkResult {
        let id = item.id.clone();
        let submitted_at = Instant::now();
        let rx = self.submit(item).await;
        tokio::select! {
            _ = ctx.cancelled() => WorkResult::cancelled(id, submitted_at.elapsed()),
            res = rx => res.unwrap_or_else(|_| WorkResult::cancelled(id, submitted_at.elapsed())),
        }
    }

    /// Shut down: cancel in-flight work, join the workers, and unwind
    /// every undelivered waiter with a cancellation result. Idempotent.
    pub async fn stop(&self) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        self.inner.shutdown.cancel();

        let handles: Vec<_> = {
            let mut workers = self.workers.lock().expect("workers lock poisoned");
            workers.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }

        // Discard whatever never reached a worker; their waiters are
        // unwound with everyone else's below.
        {
            let mut rx = self.rx.lock().await;
            while rx.try_recv().is_ok() {}
        }
        let remaining: Vec<Waiter> = {
            let mut waiters = self.inner.waiters.lock().expect("waiters lock poisoned");
            waiters.drain().flat_map(|(_, list)| list).collect()
        };
        for waiter in remaining {
            let _ = waiter.tx.send(WorkResult::cancelled(
                waiter.id,
                waiter.submitted_at.elapsed(),
            ));
        }
    }

    /// Pipeline counters plus the current queue depth.
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            processed: self.inner.processed.load(Ordering::Relaxed),
            errors: self.inner.errors.load(Ordering::Relaxed),
            cache_hits: self.inner.cache_hits.load(Ordering::Relaxed),
            queue_depth: self.tx.max_capacity() - self.tx.capacity(),
        }
    }

    /// Sliding-window stats report.
    pub fn report(&self) -> StatsReport {
        self.inner.collector.report()
    }

    /// The in-memory cache's counters.
    pub fn memory_stats(&self) -> crate::cache::CacheStats {
        self.inner.memory.stats()
    }

    /// Run one expiry sweep of the in-memory cache, returning the number
    /// of entries dropped. The pipeline never schedules this itself.
    pub fn cleanup_memory(&self) -> usize {
        self.inner.memory.cleanup()
    }

    fn fingerprint(&self, item: &WorkItem) -> Fingerprint {
        Fingerprint::for_request(
            &item.content,
            &item.path,
            self.inner.analyzer.provider(),
            self.inner.analyzer.model(),
            self.inner.analyzer.version(),
            &item.policies,
            &item.persona,
        )
    }
}

/// How a delivery was satisfied, for counter accounting.
enum CacheOutcome {
    Hit(CacheTier),
    Analyzed,
    Failed,
}

impl PipelineInner {
    /// Update counters and the collector for one completed key.
    fn note_delivery(&self, outcome: CacheOutcome, deliveries: u64, event: AnalysisEvent) {
        self.processed.fetch_add(deliveries, Ordering::Relaxed);
        match outcome {
            CacheOutcome::Hit(tier) => {
                self.cache_hits.fetch_add(deliveries, Ordering::Relaxed);
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "tier" => tier.as_str())
                    .increment(1);
            }
            CacheOutcome::Analyzed => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
            }
            CacheOutcome::Failed => {
                self.errors.fetch_add(deliveries, Ordering::Relaxed);
            }
        }
        self.collector.record(event);
    }

    /// Atomically take every waiter registered under a key.
    fn take_waiters(&self, key_hash: &str) -> Vec<Waiter> {
        self.waiters
            .lock()
            .expect("waiters lock poisoned")
            .remove(key_hash)
            .unwrap_or_default()
    }

    /// Deliver an error to every waiter of a key.
    fn fail_waiters(&self, key_hash: &str, err: ForsetiError) {
        let waiters = self.take_waiters(key_hash);
        let deliveries = waiters.len() as u64;
        if deliveries > 0 {
            self.note_delivery(
                CacheOutcome::Failed,
                deliveries,
                AnalysisEvent {
                    error: true,
                    ..Default::default()
                },
            );
        }
        for waiter in waiters {
            let _ = waiter.tx.send(WorkResult {
                id: waiter.id,
                outcome: Err(err.clone()),
                from_cache: false,
                elapsed: waiter.submitted_at.elapsed(),
            });
        }
    }
}

async fn worker_loop(
    inner: Arc<PipelineInner>,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<QueueItem>>>,
) {
    loop {
        let next = {
            let mut rx = rx.lock().await;
            tokio::select! {
                _ = inner.shutdown.cancelled() => None,
                item = rx.recv() => item,
            }
        };
        let Some(queue_item) = next else { return };
        process(&inner, queue_item).await;
    }
}

/// Drive one queued item through memory → durable tiers → analyzer.
async fn process(inner: &Arc<PipelineInner>, queue_item: QueueItem) {
    let QueueItem {
        item,
        key,
        key_hash,
        enqueued_at,
    } = queue_item;
    let queue_duration = enqueued_at.elapsed();

    // A concurrent worker may have finished this fingerprint while the
    // item sat in the queue.
    match inner.memory.get_detailed(&key_hash) {
        Lookup::Hit(findings) => {
            deliver_findings(
                inner,
                &key_hash,
                findings,
                CacheTier::Memory,
                queue_duration,
            );
            return;
        }
        Lookup::Expired => inner.collector.record_stale(),
        Lookup::Miss => {}
    }

    // Durable tiers.
    match inner.cache.get_with_tier(&inner.shutdown, &key).await {
        Ok((entry, tier)) => {
            let findings = Arc::new(entry.results);
            inner.memory.set(&key_hash, Arc::clone(&findings));
            deliver_findings(inner, &key_hash, findings, tier, queue_duration);
            return;
        }
        Err(e) if e.is_cancelled() => {
            inner.fail_waiters(&key_hash, ForsetiError::Cancelled);
            return;
        }
        Err(e) if e.is_miss() => {}
        Err(e) => {
            // Degraded durable cache: analyze anyway.
            warn!(key = %key_hash, error = %e, "durable cache lookup failed");
        }
    }

    // The expensive part. Bounded only by the pipeline's lifetime token.
    let started = Instant::now();
    let outcome = tokio::select! {
        _ = inner.shutdown.cancelled() => Err(ForsetiError::Cancelled),
        res = inner.analyzer.analyze(&item.content, &item.policies, &item.persona) => res,
    };
    let analysis_duration = started.elapsed();

    match outcome {
        Ok(response) => {
            metrics::counter!(telemetry::ANALYSES_TOTAL, "status" => "ok").increment(1);
            metrics::histogram!(telemetry::ANALYSIS_DURATION_SECONDS)
                .record(analysis_duration.as_secs_f64());
            metrics::counter!(telemetry::TOKENS_TOTAL, "direction" => "prompt")
                .increment(response.usage.prompt_tokens);
            metrics::counter!(telemetry::TOKENS_TOTAL, "direction" => "completion")
                .increment(response.usage.completion_tokens);

            // Analyzers occasionally repeat a finding across overlapping
            // prompt chunks; collapse exact (rule, uri, range) duplicates.
            let findings = Arc::new(dedup_findings(response.findings));
            metrics::counter!(telemetry::FINDINGS_TOTAL).increment(findings.len() as u64);
            inner.memory.set(&key_hash, Arc::clone(&findings));
            let entry = Entry::new(key, findings.as_ref().clone());
            if let Err(e) = inner.cache.put(&inner.shutdown, entry).await {
                warn!(key = %key_hash, error = %e, "durable cache put failed");
            }

            let waiters = inner.take_waiters(&key_hash);
            inner.note_delivery(
                CacheOutcome::Analyzed,
                waiters.len() as u64,
                AnalysisEvent {
                    analysis_duration,
                    queue_duration,
                    total_duration: earliest_submission(&waiters)
                        .map(|at| at.elapsed())
                        .unwrap_or(analysis_duration),
                    tier: None,
                    error: false,
                    findings: findings.len(),
                    usage: response.usage,
                },
            );
            for waiter in waiters {
                let _ = waiter.tx.send(WorkResult {
                    id: waiter.id,
                    outcome: Ok(findings.as_ref().clone()),
                    from_cache: false,
                    elapsed: waiter.submitted_at.elapsed(),
                });
            }
        }
        Err(e) => {
            metrics::counter!(telemetry::ANALYSES_TOTAL, "status" => "error").increment(1);
            // Errors are never cached; the next submission retries.
            inner.fail_waiters(&key_hash, e);
        }
    }
}

/// Deliver cached findings to every waiter of a key.
fn deliver_findings(
    inner: &PipelineInner,
    key_hash: &str,
    findings: Arc<Vec<Finding>>,
    tier: CacheTier,
    queue_duration: Duration,
) {
    let waiters = inner.take_waiters(key_hash);
    inner.note_delivery(
        CacheOutcome::Hit(tier),
        waiters.len() as u64,
        AnalysisEvent {
            queue_duration,
            total_duration: earliest_submission(&waiters)
                .map(|at| at.elapsed())
                .unwrap_or(queue_duration),
            tier: Some(tier),
            findings: findings.len(),
            usage: Usage::default(),
            ..Default::default()
        },
    );
    for waiter in waiters {
        let _ = waiter.tx.send(WorkResult {
            id: waiter.id,
            outcome: Ok(findings.as_ref().clone()),
            from_cache: true,
            elapsed: waiter.submitted_at.elapsed(),
        });
    }
}

fn earliest_submission(waiters: &[Waiter]) -> Option<Instant> {
    waiters.iter().map(|w| w.submitted_at).min()
}
