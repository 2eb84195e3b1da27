use serial_test::serial;
use std::fs;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;
use wscache::{Cache, CacheConfig, Mode, Stats};

const MAX_BYTES: usize = 4 * 1024 * 1024;

fn stats(cache: &Cache) -> Stats {
    let mut stats = Stats::default();
    cache.update_stats(&mut stats);
    stats
}

#[test]
fn test_load_missing_snapshot_starts_split() {
    let dir = TempDir::new().unwrap();
    let cache = Cache::load(dir.path().join("nonexistent"), 1024, Duration::from_secs(1));

    assert_eq!(cache.mode(), Mode::Split);
    let stats = stats(&cache);
    assert_eq!(stats.entries_count, 0);
    assert_eq!(stats.max_bytes_size, 1024);
}

#[test]
fn test_save_stop_load_restores_whole_cache() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache");

    let cache = Cache::new(MAX_BYTES, Duration::from_secs(1));
    for i in 0..100u32 {
        cache.set(format!("key-{}", i).as_bytes(), &i.to_le_bytes());
    }
    cache.save(&path).unwrap();
    cache.stop();

    let cache = Cache::load(&path, MAX_BYTES, Duration::from_secs(1));
    assert_eq!(cache.mode(), Mode::Whole);

    let loaded = stats(&cache);
    assert_eq!(loaded.entries_count, 100);
    assert_eq!(loaded.get_calls, 0);
    assert_eq!(loaded.set_calls, 0);

    for i in 0..100u32 {
        let mut dst = Vec::new();
        assert!(cache.get(&mut dst, format!("key-{}", i).as_bytes()));
        assert_eq!(dst, i.to_le_bytes());
    }
}

#[test]
#[serial]
fn test_save_only_persists_current_generation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache");

    let config = CacheConfig::new(MAX_BYTES)
        .with_expire_duration(Duration::from_millis(400))
        .with_jitter(false);
    let cache = Cache::with_config(config);
    cache.set(b"old", b"1");
    // One rotation moves "old" into the previous generation.
    thread::sleep(Duration::from_millis(600));
    cache.set(b"new", b"2");
    cache.save(&path).unwrap();
    drop(cache);

    let cache = Cache::load(&path, MAX_BYTES, Duration::from_secs(3600));
    assert_eq!(cache.mode(), Mode::Whole);
    assert!(cache.has(b"new"));
    assert!(!cache.has(b"old"));
}

#[test]
fn test_whole_mode_never_rotates() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache");

    let cache = Cache::new(MAX_BYTES, Duration::from_secs(3600));
    cache.set(b"k1", b"v1");
    cache.save(&path).unwrap();
    cache.stop();

    let config = CacheConfig::new(MAX_BYTES)
        .with_expire_duration(Duration::from_millis(50))
        .with_size_check_interval(Duration::from_millis(10));
    let cache = Cache::load_with_config(&path, config);
    thread::sleep(Duration::from_millis(300));

    assert_eq!(cache.mode(), Mode::Whole);
    let mut dst = Vec::new();
    assert!(cache.get(&mut dst, b"k1"));
    assert_eq!(dst, b"v1");
}

#[test]
fn test_load_corrupt_snapshot_starts_split() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache");

    let cache = Cache::new(MAX_BYTES, Duration::from_secs(3600));
    cache.set(b"k1", b"v1");
    cache.save(&path).unwrap();
    drop(cache);

    fs::write(path.join("metadata.bin"), b"garbage").unwrap();

    let cache = Cache::load(&path, MAX_BYTES, Duration::from_secs(3600));
    assert_eq!(cache.mode(), Mode::Split);
    assert!(!cache.has(b"k1"));
}

#[test]
fn test_load_into_smaller_cache_starts_split() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache");

    let cache = Cache::new(MAX_BYTES, Duration::from_secs(3600));
    cache.set(b"k1", b"v1");
    cache.save(&path).unwrap();
    drop(cache);

    // The snapshot holds a generation of MAX_BYTES / 2.
    let cache = Cache::load(&path, MAX_BYTES / 4, Duration::from_secs(3600));
    assert_eq!(cache.mode(), Mode::Split);
    assert_eq!(stats(&cache).entries_count, 0);
}

#[test]
fn test_save_overwrites_previous_snapshot() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache");

    let cache = Cache::new(MAX_BYTES, Duration::from_secs(3600));
    cache.set(b"first", b"1");
    cache.save(&path).unwrap();
    cache.reset();
    cache.set(b"second", b"2");
    cache.save(&path).unwrap();
    drop(cache);

    let cache = Cache::load(&path, MAX_BYTES, Duration::from_secs(3600));
    assert!(cache.has(b"second"));
    assert!(!cache.has(b"first"));
}

#[test]
fn test_save_error_propagates() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("file");
    fs::write(&file, b"not a directory").unwrap();

    let cache = Cache::new(MAX_BYTES, Duration::from_secs(3600));
    cache.set(b"k1", b"v1");
    assert!(cache.save(file.join("cache")).is_err());
}
