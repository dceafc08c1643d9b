//! Telemetry emission tests using a local debugging recorder.

use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

use forseti::cache::{MemoryCache, MemoryConfig};

#[test]
fn capacity_eviction_emits_counter() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        let cache: MemoryCache<u32> = MemoryCache::new(MemoryConfig::new().max_size(2));
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("c", 3); // evicts "a"
        cache.set("a", 4); // evicts "b"
    });

    let snapshot = snapshotter.snapshot().into_vec();
    let evictions: u64 = snapshot
        .iter()
        .filter(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter
                && key.key().name() == "forseti_cache_evictions_total"
        })
        .map(|(_, _, _, val)| match val {
            DebugValue::Counter(c) => *c,
            _ => 0,
        })
        .sum();
    assert_eq!(evictions, 2, "two inserts into a full cache, two evictions");
}

#[test]
fn no_recorder_means_no_panic() {
    // Without a recorder installed all metric calls are no-ops.
    let cache: MemoryCache<u32> = MemoryCache::new(MemoryConfig::new().max_size(1));
    cache.set("a", 1);
    cache.set("b", 2);
    assert_eq!(cache.stats().evictions, 1);
}
