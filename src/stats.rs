//! Analysis statistics: lifetime counters and a sliding-window report.
//!
//! [`MetricsCollector`] takes one [`AnalysisEvent`] per completed pipeline
//! item. Lifetime totals live in atomics so the common-path stats query
//! never scans the buffer; the events themselves sit in a bounded ring
//! that drops its oldest tenth in one drain when full, amortizing the
//! cost of staying bounded.
//!
//! [`report()`](MetricsCollector::report) looks only at events inside the
//! sliding window (default one hour) for latency percentiles and the
//! per-tier breakdown; throughput is lifetime analyses over wall time
//! since the collector started.
//!
//! This collector is the queryable side of observability; the `metrics`
//! facade counters in [`telemetry`](crate::telemetry) are the exported
//! side. The pipeline feeds both.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::analyzer::Usage;
use crate::cache::CacheTier;

/// Configuration for a [`MetricsCollector`].
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Ring capacity. When exceeded, the oldest 10 % are dropped at once.
    /// Default: 10 000.
    pub max_events: usize,
    /// Sliding window for the latency report. Default: 1 hour.
    pub window: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_events: 10_000,
            window: Duration::from_secs(3600),
        }
    }
}

impl CollectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_events(mut self, n: usize) -> Self {
        self.max_events = n.max(1);
        self
    }

    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }
}

/// One completed pipeline item.
#[derive(Debug, Clone, Default)]
pub struct AnalysisEvent {
    /// Time spent inside the analyzer call. Zero for cache hits.
    pub analysis_duration: Duration,
    /// Time spent queued before a worker picked the item up.
    pub queue_duration: Duration,
    /// Submission-to-delivery wall time.
    pub total_duration: Duration,
    /// Which cache tier served the result; `None` when the analyzer ran.
    pub tier: Option<CacheTier>,
    pub error: bool,
    pub findings: usize,
    pub usage: Usage,
}

struct Recorded {
    at: Instant,
    event: AnalysisEvent,
}

/// Lifetime totals, independent of the sliding window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifetimeCounters {
    pub analyses: u64,
    pub errors: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_stale: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub findings: u64,
}

/// Latency summary over the window's analyzer calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DurationSummary {
    pub mean: Duration,
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
    pub max: Duration,
}

/// Window hit counts per serving tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierBreakdown {
    pub memory: usize,
    pub local: usize,
    pub remote: usize,
    /// Items that went all the way to the analyzer.
    pub analyzed: usize,
}

/// The sliding-window stats report.
#[derive(Debug, Clone)]
pub struct StatsReport {
    /// Events that fell inside the window.
    pub window_events: usize,
    pub analysis: DurationSummary,
    pub mean_queue_duration: Duration,
    pub mean_total_duration: Duration,
    pub tiers: TierBreakdown,
    /// Lifetime analyses per minute of collector uptime.
    pub analyses_per_minute: f64,
    pub lifetime: LifetimeCounters,
}

/// Bounded event ring plus lifetime atomics.
pub struct MetricsCollector {
    started: Instant,
    analyses: AtomicU64,
    errors: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_stale: AtomicU64,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    findings: AtomicU64,
    events: Mutex<VecDeque<Recorded>>,
    config: CollectorConfig,
}

impl MetricsCollector {
    pub fn new(config: CollectorConfig) -> Self {
        Self {
            started: Instant::now(),
            analyses: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            cache_stale: AtomicU64::new(0),
            prompt_tokens: AtomicU64::new(0),
            completion_tokens: AtomicU64::new(0),
            findings: AtomicU64::new(0),
            events: Mutex::new(VecDeque::new()),
            config,
        }
    }

    /// Record one completed item.
    pub fn record(&self, event: AnalysisEvent) {
        self.analyses.fetch_add(1, Ordering::Relaxed);
        if event.error {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
        match event.tier {
            Some(_) => self.cache_hits.fetch_add(1, Ordering::Relaxed),
            None => self.cache_misses.fetch_add(1, Ordering::Relaxed),
        };
        self.prompt_tokens
            .fetch_add(event.usage.prompt_tokens, Ordering::Relaxed);
        self.completion_tokens
            .fetch_add(event.usage.completion_tokens, Ordering::Relaxed);
        self.findings
            .fetch_add(event.findings as u64, Ordering::Relaxed);

        let mut events = self.events.lock().expect("collector lock poisoned");
        events.push_back(Recorded {
            at: Instant::now(),
            event,
        });
        if events.len() > self.config.max_events {
            // Shed a tenth at once so overflow doesn't pay per event.
            let shed = (self.config.max_events / 10).max(1);
            events.drain(..shed);
        }
    }

    /// Count a lookup that found only an expired entry.
    pub fn record_stale(&self) {
        self.cache_stale.fetch_add(1, Ordering::Relaxed);
    }

    /// Lifetime totals.
    pub fn lifetime(&self) -> LifetimeCounters {
        LifetimeCounters {
            analyses: self.analyses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_stale: self.cache_stale.load(Ordering::Relaxed),
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
            findings: self.findings.load(Ordering::Relaxed),
        }
    }

    /// Compute the sliding-window report.
    pub fn report(&self) -> StatsReport {
        let now = Instant::now();
        let events = self.events.lock().expect("collector lock poisoned");

        let mut analysis_durations = Vec::new();
        let mut queue_sum = Duration::ZERO;
        let mut total_sum = Duration::ZERO;
        let mut tiers = TierBreakdown::default();
        let mut window_events = 0usize;

        for recorded in events.iter() {
            if now.duration_since(recorded.at) > self.config.window {
                continue;
            }
            window_events += 1;
            let e = &recorded.event;
            queue_sum += e.queue_duration;
            total_sum += e.total_duration;
            match e.tier {
                Some(CacheTier::Memory) => tiers.memory += 1,
                Some(CacheTier::Local) => tiers.local += 1,
                Some(CacheTier::Remote) => tiers.remote += 1,
                None => {
                    tiers.analyzed += 1;
                    analysis_durations.push(e.analysis_duration);
                }
            }
        }
        drop(events);

        let minutes = self.started.elapsed().as_secs_f64() / 60.0;
        let lifetime = self.lifetime();
        let analyses_per_minute = if minutes > 0.0 {
            lifetime.analyses as f64 / minutes
        } else {
            0.0
        };

        StatsReport {
            window_events,
            analysis: summarize(&mut analysis_durations),
            mean_queue_duration: mean(queue_sum, window_events),
            mean_total_duration: mean(total_sum, window_events),
            tiers,
            analyses_per_minute,
            lifetime,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(CollectorConfig::default())
    }
}

fn mean(sum: Duration, count: usize) -> Duration {
    if count == 0 {
        Duration::ZERO
    } else {
        sum / count as u32
    }
}

/// Sort the samples and summarize. Percentile index is `floor((n-1)·p)`.
fn summarize(durations: &mut [Duration]) -> DurationSummary {
    if durations.is_empty() {
        return DurationSummary::default();
    }
    durations.sort_unstable();
    let n = durations.len();
    let sum: Duration = durations.iter().sum();
    let at = |p: f64| durations[((n - 1) as f64 * p).floor() as usize];
    DurationSummary {
        mean: sum / n as u32,
        p50: at(0.50),
        p95: at(0.95),
        p99: at(0.99),
        max: durations[n - 1],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzed_event(ms: u64) -> AnalysisEvent {
        AnalysisEvent {
            analysis_duration: Duration::from_millis(ms),
            queue_duration: Duration::from_millis(1),
            total_duration: Duration::from_millis(ms + 1),
            findings: 2,
            ..Default::default()
        }
    }

    fn hit_event(tier: CacheTier) -> AnalysisEvent {
        AnalysisEvent {
            tier: Some(tier),
            ..Default::default()
        }
    }

    #[test]
    fn lifetime_counters_accumulate() {
        let collector = MetricsCollector::default();
        collector.record(analyzed_event(10));
        collector.record(hit_event(CacheTier::Memory));
        collector.record(AnalysisEvent {
            error: true,
            ..Default::default()
        });
        collector.record_stale();

        let lifetime = collector.lifetime();
        assert_eq!(lifetime.analyses, 3);
        assert_eq!(lifetime.errors, 1);
        assert_eq!(lifetime.cache_hits, 1);
        assert_eq!(lifetime.cache_misses, 2);
        assert_eq!(lifetime.cache_stale, 1);
        assert_eq!(lifetime.findings, 2);
    }

    #[test]
    fn percentiles_use_floor_indexing() {
        let collector = MetricsCollector::default();
        for ms in [10, 20, 30, 40, 50, 60, 70, 80, 90, 100] {
            collector.record(analyzed_event(ms));
        }
        let report = collector.report();
        // n = 10: p50 → index 4, p95 → index 8, p99 → index 8, max → 100.
        assert_eq!(report.analysis.p50, Duration::from_millis(50));
        assert_eq!(report.analysis.p95, Duration::from_millis(90));
        assert_eq!(report.analysis.p99, Duration::from_millis(90));
        assert_eq!(report.analysis.max, Duration::from_millis(100));
        assert_eq!(report.analysis.mean, Duration::from_millis(55));
    }

    #[test]
    fn tier_breakdown_counts_each_side() {
        let collector = MetricsCollector::default();
        collector.record(hit_event(CacheTier::Memory));
        collector.record(hit_event(CacheTier::Memory));
        collector.record(hit_event(CacheTier::Local));
        collector.record(hit_event(CacheTier::Remote));
        collector.record(analyzed_event(5));

        let report = collector.report();
        assert_eq!(report.tiers.memory, 2);
        assert_eq!(report.tiers.local, 1);
        assert_eq!(report.tiers.remote, 1);
        assert_eq!(report.tiers.analyzed, 1);
        assert_eq!(report.window_events, 5);
    }

    #[test]
    fn overflow_sheds_oldest_tenth() {
        let collector = MetricsCollector::new(CollectorConfig::new().max_events(100));
        for _ in 0..101 {
            collector.record(analyzed_event(1));
        }
        let report = collector.report();
        // 101 pushed, one shed of 10 → 91 left in the ring.
        assert_eq!(report.window_events, 91);
        // Lifetime totals are unaffected by shedding.
        assert_eq!(report.lifetime.analyses, 101);
    }

    #[test]
    fn report_excludes_events_outside_window() {
        let collector = MetricsCollector::new(CollectorConfig::new().window(Duration::from_millis(20)));
        collector.record(analyzed_event(1));
        std::thread::sleep(Duration::from_millis(30));
        collector.record(analyzed_event(2));

        let report = collector.report();
        assert_eq!(report.window_events, 1);
        assert_eq!(report.lifetime.analyses, 2, "lifetime ignores the window");
    }

    #[test]
    fn empty_collector_reports_zeroes() {
        let report = MetricsCollector::default().report();
        assert_eq!(report.window_events, 0);
        assert_eq!(report.analysis, DurationSummary::default());
        assert_eq!(report.mean_queue_duration, Duration::ZERO);
    }
}
