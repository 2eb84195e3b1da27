use std::time::Duration;

/// Configuration of a working-set [`Cache`](crate::Cache).
///
/// Only `max_bytes` has no sensible default; everything else can be tuned
/// through the `with_*` builder methods.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use wscache::CacheConfig;
///
/// let config = CacheConfig::new(64 * 1024 * 1024)
///     .with_expire_duration(Duration::from_secs(600))
///     .with_jitter(false);
///
/// assert_eq!(config.max_bytes, 64 * 1024 * 1024);
/// assert_eq!(config.size_check_interval, CacheConfig::DEFAULT_SIZE_CHECK_INTERVAL);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct CacheConfig {
    /// Total byte budget shared by both generations.
    pub max_bytes: usize,
    /// Period of generation rotation while in split mode.
    pub expire_duration: Duration,
    /// How often the size watcher checks for capacity pressure.
    pub size_check_interval: Duration,
    /// How often the size watcher checks whether the previous generation
    /// still serves enough reads to be worth keeping.
    pub prev_check_interval: Duration,
    /// Share of reads, in percent of the reads reaching the current
    /// generation, below which the previous generation is dropped.
    /// Zero or less disables the check.
    pub prev_cache_removal_percent: f64,
    /// Pull the first tick of every watcher timer forward by up to 10% of
    /// its period.
    pub jitter: bool,
}

impl CacheConfig {
    pub const DEFAULT_EXPIRE_DURATION: Duration = Duration::from_secs(30 * 60);
    pub const DEFAULT_SIZE_CHECK_INTERVAL: Duration = Duration::from_millis(1500);
    pub const DEFAULT_PREV_CHECK_INTERVAL: Duration = Duration::from_secs(60);
    pub const DEFAULT_PREV_CACHE_REMOVAL_PERCENT: f64 = 0.1;

    /// Creates a configuration with the given byte budget and defaults for
    /// everything else.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            expire_duration: Self::DEFAULT_EXPIRE_DURATION,
            size_check_interval: Self::DEFAULT_SIZE_CHECK_INTERVAL,
            prev_check_interval: Self::DEFAULT_PREV_CHECK_INTERVAL,
            prev_cache_removal_percent: Self::DEFAULT_PREV_CACHE_REMOVAL_PERCENT,
            jitter: true,
        }
    }

    pub fn with_expire_duration(mut self, expire_duration: Duration) -> Self {
        self.expire_duration = expire_duration;
        self
    }

    pub fn with_size_check_interval(mut self, interval: Duration) -> Self {
        self.size_check_interval = interval;
        self
    }

    pub fn with_prev_check_interval(mut self, interval: Duration) -> Self {
        self.prev_check_interval = interval;
        self
    }

    pub fn with_prev_cache_removal_percent(mut self, percent: f64) -> Self {
        self.prev_cache_removal_percent = percent;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Fraction of curr reads below which prev is dropped, or `None` when
    /// the check is disabled.
    pub(crate) fn prev_removal_ratio(&self) -> Option<f64> {
        let ratio = self.prev_cache_removal_percent / 100.0;
        (ratio > 0.0 && ratio.is_finite()).then_some(ratio)
    }
}

impl Default for CacheConfig {
    /// A 32 MiB cache with the default timers.
    fn default() -> Self {
        Self::new(32 * 1024 * 1024)
    }
}
