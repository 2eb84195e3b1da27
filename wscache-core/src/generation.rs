use crate::bucket::{Bucket, Lookup};
use crate::stats::Counters;
use crate::Stats;
use parking_lot::RwLock;
use xxhash_rust::xxh3::xxh3_64;

/// Maximum number of buckets in a generation.
pub const BUCKETS_COUNT: usize = 512;

/// Smallest byte budget a bucket is given before the bucket count is reduced.
pub const MIN_BUCKET_BYTES: usize = 1024 * 1024;

/// Entries with `key.len() + value.len()` at or above this size are not
/// stored by [`Generation::set`]. Use [`Generation::set_big`] for them.
pub const MAX_ENTRY_SIZE: usize = 64 * 1024;

/// A fixed-capacity, thread-safe, byte-keyed cache.
///
/// A generation never grows beyond the `max_bytes` it was created with. When
/// a bucket runs out of room, its oldest entries are evicted to make space.
/// Keys are spread over up to [`BUCKETS_COUNT`] independently locked buckets
/// by their `xxh3` hash, so concurrent callers rarely contend.
///
/// # Thread Safety
///
/// Every method takes `&self`. Buckets are protected by `parking_lot::RwLock`
/// (concurrent lookups, exclusive inserts); counters are atomics.
///
/// # Examples
///
/// ```
/// use wscache_core::Generation;
///
/// let generation = Generation::new(1024 * 1024);
/// generation.set(b"user:1", b"alice");
///
/// let mut dst = Vec::new();
/// assert!(generation.get(&mut dst, b"user:1"));
/// assert_eq!(dst, b"alice");
///
/// assert!(!generation.has(b"user:2"));
/// ```
pub struct Generation {
    buckets: Box<[RwLock<Bucket>]>,
    max_bytes: usize,
    pub(crate) counters: Counters,
}

impl Generation {
    /// Creates an empty generation holding at most `max_bytes` of entries.
    ///
    /// The budget is split evenly between the buckets; the number of buckets
    /// only depends on `max_bytes`.
    pub fn new(max_bytes: usize) -> Self {
        let count = buckets_count_for(max_bytes);
        let base = max_bytes / count;
        let extra = max_bytes % count;
        let buckets = (0..count)
            .map(|i| RwLock::new(Bucket::new(base + usize::from(i < extra))))
            .collect();

        Self {
            buckets,
            max_bytes,
            counters: Counters::default(),
        }
    }

    /// Capacity in bytes this generation was created with.
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Appends the value stored under `key` to `dst`.
    ///
    /// Returns true if the key was found. `dst` is left untouched on a miss.
    pub fn get(&self, dst: &mut Vec<u8>, key: &[u8]) -> bool {
        self.counters.record_get();
        let hash = xxh3_64(key);
        let bucket = self.bucket_for(hash).read();
        match bucket.lookup(hash, key) {
            Lookup::Found(value) => {
                dst.extend_from_slice(value);
                true
            }
            Lookup::Missing => {
                self.counters.record_miss();
                false
            }
            Lookup::Collision => {
                self.counters.record_collision();
                self.counters.record_miss();
                false
            }
        }
    }

    /// Returns true if a value is stored under `key`.
    pub fn has(&self, key: &[u8]) -> bool {
        self.counters.record_get();
        let hash = xxh3_64(key);
        let bucket = self.bucket_for(hash).read();
        match bucket.lookup(hash, key) {
            Lookup::Found(_) => true,
            Lookup::Missing => {
                self.counters.record_miss();
                false
            }
            Lookup::Collision => {
                self.counters.record_collision();
                self.counters.record_miss();
                false
            }
        }
    }

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// Entries with `key.len() + value.len() >= MAX_ENTRY_SIZE`, or larger
    /// than a single bucket, are silently skipped.
    pub fn set(&self, key: &[u8], value: &[u8]) {
        self.counters.record_set();
        if key.len() + value.len() >= MAX_ENTRY_SIZE {
            return;
        }
        self.insert(key, value);
    }

    /// Inserts without touching call counters. Used when restoring snapshots.
    pub(crate) fn insert(&self, key: &[u8], value: &[u8]) -> bool {
        let hash = xxh3_64(key);
        self.bucket_for(hash).write().insert(hash, key, value)
    }

    /// Removes every entry and zeroes the call counters.
    pub fn reset(&self) {
        for bucket in self.buckets.iter() {
            bucket.write().reset();
        }
        self.counters.reset();
    }

    /// Adds this generation's statistics to `dst`.
    pub fn update_stats(&self, dst: &mut Stats) {
        self.counters.add_to(dst);
        for bucket in self.buckets.iter() {
            let bucket = bucket.read();
            dst.entries_count += bucket.len() as u64;
            dst.bytes_size += bucket.bytes() as u64;
        }
        dst.max_bytes_size += self.max_bytes as u64;
    }

    /// Returns a fresh statistics snapshot.
    pub fn stats(&self) -> Stats {
        let mut stats = Stats::default();
        self.update_stats(&mut stats);
        stats
    }

    pub(crate) fn buckets(&self) -> &[RwLock<Bucket>] {
        &self.buckets
    }

    #[inline]
    fn bucket_for(&self, hash: u64) -> &RwLock<Bucket> {
        &self.buckets[(hash % self.buckets.len() as u64) as usize]
    }
}

impl std::fmt::Debug for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generation")
            .field("max_bytes", &self.max_bytes)
            .field("buckets", &self.buckets.len())
            .finish()
    }
}

/// Number of buckets used for a generation of the given capacity.
pub(crate) fn buckets_count_for(max_bytes: usize) -> usize {
    (max_bytes / MIN_BUCKET_BYTES).clamp(1, BUCKETS_COUNT)
}
