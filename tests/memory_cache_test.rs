//! Tests for [`MemoryCache`] — boundary behaviors of TTL and capacity.

use std::time::Duration;

use forseti::cache::{Lookup, MemoryCache, MemoryConfig};

#[test]
fn config_defaults() {
    let config = MemoryConfig::default();
    assert_eq!(config.max_size, 1000);
    assert_eq!(config.default_ttl, Duration::from_secs(3600));
}

#[test]
fn four_sets_into_three_slots_evicts_the_first() {
    let cache: MemoryCache<u32> = MemoryCache::new(MemoryConfig::new().max_size(3));
    cache.set("k1", 1);
    std::thread::sleep(Duration::from_millis(5));
    cache.set("k2", 2);
    cache.set("k3", 3);
    cache.set("k4", 4);

    let stats = cache.stats();
    assert_eq!(stats.size, 3);
    assert_eq!(stats.evictions, 1);
    assert_eq!(cache.get("k1"), None);
    assert_eq!(cache.get("k4"), Some(4));
}

#[test]
fn short_ttl_expires_after_double_the_ttl() {
    let cache: MemoryCache<u32> = MemoryCache::new(MemoryConfig::default());
    cache.set_with_ttl("k", 1, Duration::from_millis(10));

    assert_eq!(cache.get("k"), Some(1));
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(cache.get("k"), None);
}

#[test]
fn zero_ttl_means_never_expire() {
    let cache: MemoryCache<u32> = MemoryCache::new(MemoryConfig::default());
    cache.set_with_ttl("k", 1, Duration::ZERO);
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(cache.get("k"), Some(1));
}

#[test]
fn cleanup_reports_exact_expired_count() {
    let cache: MemoryCache<u32> = MemoryCache::new(MemoryConfig::default());
    cache.set_with_ttl("a", 1, Duration::from_millis(5));
    cache.set_with_ttl("b", 2, Duration::from_millis(5));
    cache.set_with_ttl("c", 3, Duration::from_millis(5));
    cache.set_with_ttl("keep", 4, Duration::from_secs(300));
    std::thread::sleep(Duration::from_millis(10));

    assert_eq!(cache.cleanup(), 3);
    assert_eq!(cache.cleanup(), 0, "second sweep finds nothing");
    assert_eq!(cache.size(), 1);
}

#[test]
fn expired_lookup_is_distinguishable_from_miss() {
    let cache: MemoryCache<u32> = MemoryCache::new(MemoryConfig::default());
    cache.set_with_ttl("k", 1, Duration::from_millis(5));
    std::thread::sleep(Duration::from_millis(10));

    assert_eq!(cache.get_detailed("k"), Lookup::Expired);
    assert_eq!(cache.get_detailed("k"), Lookup::Miss);
    assert_eq!(cache.get_detailed("never-set"), Lookup::Miss);
}

#[test]
fn stats_invariants_hold_under_mixed_operations() {
    let cache: MemoryCache<String> = MemoryCache::new(MemoryConfig::new().max_size(4));
    let mut gets = 0u64;
    for i in 0u64..20 {
        cache.set(format!("k{i}"), format!("v{i}"));
        cache.get(&format!("k{i}"));
        cache.get(&format!("k{}", i.saturating_sub(10)));
        gets += 2;
    }

    let stats = cache.stats();
    assert!(stats.size <= stats.max_size);
    assert_eq!(stats.hits + stats.misses, gets);
}

#[test]
fn concurrent_access_is_safe_and_bounded() {
    use std::sync::Arc;

    let cache: Arc<MemoryCache<u64>> =
        Arc::new(MemoryCache::new(MemoryConfig::new().max_size(50)));
    let mut handles = Vec::new();
    for t in 0..8u64 {
        let cache = Arc::clone(&cache);
        handles.push(std::thread::spawn(move || {
            for i in 0..200u64 {
                cache.set(format!("k{}", (t * 200 + i) % 120), i);
                cache.get(&format!("k{}", i % 120));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    assert!(cache.size() <= 50);
}
