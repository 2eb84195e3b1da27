use serial_test::serial;
use std::thread;
use std::time::Duration;
use wscache::{Cache, CacheConfig, Mode, Stats};

fn misses(cache: &Cache) -> u64 {
    let mut stats = Stats::default();
    cache.update_stats(&mut stats);
    stats.misses
}

#[test]
#[serial]
fn test_rotated_key_is_promoted() {
    let cache = Cache::new(1024, Duration::from_secs(1));
    cache.set(b"k1", b"v1");

    // One rotation: k1 now lives only in the previous generation.
    thread::sleep(Duration::from_millis(1500));
    let before = misses(&cache);

    let mut dst = Vec::new();
    assert!(cache.get(&mut dst, b"k1"));
    assert_eq!(dst, b"v1");
    assert_eq!(misses(&cache), before);

    dst.clear();
    assert!(cache.get(&mut dst, b"k1"));
    assert_eq!(dst, b"v1");
    assert_eq!(misses(&cache), before);
    assert_eq!(cache.mode(), Mode::Split);
}

#[test]
#[serial]
fn test_promoted_key_survives_next_rotation() {
    let cache = Cache::new(1024, Duration::from_secs(1));
    cache.set(b"k1", b"v1");

    thread::sleep(Duration::from_millis(1500));
    assert!(cache.has(b"k1"));

    // The rotation at ~2s discards the generation k1 was originally written to.
    thread::sleep(Duration::from_millis(1000));
    let mut dst = Vec::new();
    assert!(cache.get(&mut dst, b"k1"));
    assert_eq!(dst, b"v1");
    assert_eq!(misses(&cache), 0);
}

#[test]
#[serial]
fn test_untouched_key_expires() {
    let config = CacheConfig::new(1024 * 1024)
        .with_expire_duration(Duration::from_millis(400))
        .with_jitter(false);
    let cache = Cache::with_config(config);
    cache.set(b"k1", b"v1");

    thread::sleep(Duration::from_millis(100));
    // Still in the current generation: reading it does not extend its life.
    assert!(cache.get(&mut Vec::new(), b"k1"));

    // Two rotations, at 400ms and 800ms.
    thread::sleep(Duration::from_millis(1000));
    assert!(!cache.get(&mut Vec::new(), b"k1"));
    assert_eq!(misses(&cache), 1);
}

#[test]
#[serial]
fn test_regularly_read_key_never_expires() {
    let config = CacheConfig::new(1024 * 1024)
        .with_expire_duration(Duration::from_millis(200))
        .with_jitter(false);
    let cache = Cache::with_config(config);
    cache.set(b"hot", b"v");
    cache.set(b"cold", b"v");

    for _ in 0..10 {
        thread::sleep(Duration::from_millis(100));
        assert!(cache.has(b"hot"));
    }
    assert!(!cache.has(b"cold"));
}
