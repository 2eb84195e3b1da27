use once_cell::sync::Lazy;
use std::time::Duration;

static AVAILABLE_CPUS: Lazy<usize> = Lazy::new(|| {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
});

/// Number of CPUs this process may run on, computed once per process.
///
/// Used to bound the number of threads writing a snapshot concurrently.
///
/// # Examples
///
/// ```
/// use wscache_core::utils::available_cpus;
///
/// assert!(available_cpus() >= 1);
/// ```
pub fn available_cpus() -> usize {
    *AVAILABLE_CPUS
}

/// Returns a random duration between zero and 10% of `d`.
///
/// Watchers shift their first tick by this amount so that timers of many
/// caches created at the same moment do not fire in lockstep.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use wscache_core::utils::random_jitter;
///
/// let jitter = random_jitter(Duration::from_secs(10));
/// assert!(jitter <= Duration::from_secs(1));
/// ```
pub fn random_jitter(d: Duration) -> Duration {
    (d / 10).mul_f64(fastrand::f64())
}
