use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics snapshot for a generation or a whole working-set cache.
///
/// `update_stats` methods *add* their numbers to an existing `Stats`, so a
/// single value can aggregate several caches. Call [`Stats::reset`] before
/// reusing a value for a fresh snapshot.
///
/// # Examples
///
/// ```
/// use wscache_core::{Generation, Stats};
///
/// let generation = Generation::new(1024 * 1024);
/// generation.set(b"key", b"value");
///
/// let mut stats = Stats::default();
/// generation.update_stats(&mut stats);
/// assert_eq!(stats.entries_count, 1);
/// assert_eq!(stats.set_calls, 1);
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Number of `get` calls.
    pub get_calls: u64,
    /// Number of `set` calls.
    pub set_calls: u64,
    /// Number of lookups that found nothing.
    pub misses: u64,
    /// Number of lookups that hit a different key with the same hash.
    pub collisions: u64,
    /// Number of big values that failed length or checksum validation.
    pub corruptions: u64,
    /// Number of stored entries.
    pub entries_count: u64,
    /// Bytes occupied by stored entries.
    pub bytes_size: u64,
    /// Capacity in bytes.
    pub max_bytes_size: u64,
}

impl Stats {
    /// Resets all fields to zero.
    pub fn reset(&mut self) {
        *self = Stats::default();
    }

    /// Fraction of `get` calls that found a value (0.0 to 1.0).
    ///
    /// Returns 0.0 if there have been no calls.
    ///
    /// # Examples
    ///
    /// ```
    /// use wscache_core::Stats;
    ///
    /// let stats = Stats { get_calls: 4, misses: 1, ..Stats::default() };
    /// assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
    /// ```
    pub fn hit_rate(&self) -> f64 {
        if self.get_calls == 0 {
            0.0
        } else {
            self.get_calls.saturating_sub(self.misses) as f64 / self.get_calls as f64
        }
    }

    /// Fraction of `get` calls that missed (0.0 to 1.0).
    pub fn miss_rate(&self) -> f64 {
        if self.get_calls == 0 {
            0.0
        } else {
            self.misses as f64 / self.get_calls as f64
        }
    }
}

/// Lock-free call counters shared by all buckets of a generation.
///
/// All operations use `Relaxed` ordering; the counters are telemetry and never
/// synchronize other memory.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    get_calls: AtomicU64,
    set_calls: AtomicU64,
    misses: AtomicU64,
    collisions: AtomicU64,
    corruptions: AtomicU64,
}

impl Counters {
    #[inline]
    pub(crate) fn record_get(&self) {
        self.get_calls.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_set(&self) {
        self.set_calls.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_collision(&self) {
        self.collisions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_corruption(&self) {
        self.corruptions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_to(&self, dst: &mut Stats) {
        dst.get_calls += self.get_calls.load(Ordering::Relaxed);
        dst.set_calls += self.set_calls.load(Ordering::Relaxed);
        dst.misses += self.misses.load(Ordering::Relaxed);
        dst.collisions += self.collisions.load(Ordering::Relaxed);
        dst.corruptions += self.corruptions.load(Ordering::Relaxed);
    }

    pub(crate) fn reset(&self) {
        self.get_calls.store(0, Ordering::Relaxed);
        self.set_calls.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.collisions.store(0, Ordering::Relaxed);
        self.corruptions.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stats() {
        let stats = Stats::default();
        assert_eq!(stats.get_calls, 0);
        assert_eq!(stats.entries_count, 0);
        assert_eq!(stats.hit_rate(), 0.0);
        assert_eq!(stats.miss_rate(), 0.0);
    }

    #[test]
    fn test_rates() {
        let stats = Stats {
            get_calls: 3,
            misses: 1,
            ..Stats::default()
        };
        assert!((stats.hit_rate() - 0.6666).abs() < 0.001);
        assert!((stats.miss_rate() - 0.3333).abs() < 0.001);
    }

    #[test]
    fn test_reset() {
        let mut stats = Stats {
            get_calls: 10,
            bytes_size: 100,
            ..Stats::default()
        };
        stats.reset();
        assert_eq!(stats, Stats::default());
    }

    #[test]
    fn test_counters_accumulate() {
        let counters = Counters::default();
        counters.record_get();
        counters.record_get();
        counters.record_set();
        counters.record_miss();
        counters.record_collision();
        counters.record_corruption();

        let mut stats = Stats::default();
        counters.add_to(&mut stats);
        counters.add_to(&mut stats);
        assert_eq!(stats.get_calls, 4);
        assert_eq!(stats.set_calls, 2);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.collisions, 2);
        assert_eq!(stats.corruptions, 2);

        counters.reset();
        let mut stats = Stats::default();
        counters.add_to(&mut stats);
        assert_eq!(stats, Stats::default());
    }

    #[test]
    fn test_concurrent_counters() {
        use std::sync::Arc;
        use std::thread;

        let counters = Arc::new(Counters::default());
        let mut handles = vec![];

        for _ in 0..10 {
            let counters = Arc::clone(&counters);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    counters.record_get();
                }
                for _ in 0..50 {
                    counters.record_miss();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let mut stats = Stats::default();
        counters.add_to(&mut stats);
        assert_eq!(stats.get_calls, 1000);
        assert_eq!(stats.misses, 500);
    }
}
