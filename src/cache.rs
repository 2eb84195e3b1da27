use crate::config::CacheConfig;
use crate::mode::{AtomicMode, Mode};
use crate::watchers;
use arc_swap::ArcSwap;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info};
use wscache_core::utils::available_cpus;
use wscache_core::{BufferPool, Generation, Result, Stats};

/// Capacity of the placeholder standing in for the previous generation in
/// whole mode.
pub(crate) const PLACEHOLDER_BYTES: usize = 1024;

/// State shared between a [`Cache`] and its watcher threads.
pub(crate) struct Shared {
    pub(crate) curr: ArcSwap<Generation>,
    pub(crate) prev: ArcSwap<Generation>,
    pub(crate) mode: AtomicMode,
    pub(crate) config: CacheConfig,
    /// The transition mutex. Held for every mode change and generation swap.
    pub(crate) lifecycle: Mutex<Lifecycle>,
}

/// Watcher bookkeeping, only touched under the transition mutex.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    /// `None` once the cache is stopped; no watcher is started after that.
    pub(crate) stop: Option<Receiver<()>>,
    pub(crate) expiration_running: bool,
    pub(crate) size_running: bool,
    /// Capacity of curr before growth, set while in switching mode.
    pub(crate) growth_target: Option<usize>,
    pub(crate) handles: Vec<JoinHandle<()>>,
}

impl Lifecycle {
    fn new(stop: Receiver<()>) -> Self {
        Self {
            stop: Some(stop),
            expiration_running: false,
            size_running: false,
            growth_target: None,
            handles: Vec::new(),
        }
    }
}

/// An adaptive two-generation working-set cache.
///
/// Entries are written to the *current* generation. The expiration watcher
/// periodically turns the current generation into the *previous* one and
/// starts a fresh current generation; reads that miss the current generation
/// but hit the previous one copy the entry forward. Entries that are not
/// read for a while thus fall out of the cache without any per-entry
/// bookkeeping.
///
/// When the working set outgrows half of the byte budget, the size watcher
/// switches the cache, once and for all, to a single generation holding the
/// whole budget. See [`Mode`] for the three operating modes.
///
/// All methods take `&self`; share a cache between threads with an
/// [`Arc`]. Reads and writes never take a lock of their own.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use wscache::{Cache, Mode, Stats};
///
/// let cache = Cache::new(1024 * 1024, Duration::from_secs(60));
/// cache.set(b"key", b"value");
///
/// let mut value = Vec::new();
/// assert!(cache.get(&mut value, b"key"));
/// assert_eq!(value, b"value");
/// assert_eq!(cache.mode(), Mode::Split);
///
/// let mut stats = Stats::default();
/// cache.update_stats(&mut stats);
/// assert_eq!(stats.get_calls, 1);
/// assert_eq!(stats.set_calls, 1);
///
/// cache.stop();
/// ```
pub struct Cache {
    shared: Arc<Shared>,
    stop: Option<Sender<()>>,
    get_calls: AtomicU64,
    set_calls: AtomicU64,
    misses: AtomicU64,
    buffers: BufferPool,
}

impl Cache {
    /// Creates an empty cache of `max_bytes` rotating every `expire_duration`.
    ///
    /// The cache starts in [`Mode::Split`] with both watchers running.
    pub fn new(max_bytes: usize, expire_duration: Duration) -> Self {
        Self::with_config(CacheConfig::new(max_bytes).with_expire_duration(expire_duration))
    }

    /// Creates an empty cache from a full configuration.
    pub fn with_config(config: CacheConfig) -> Self {
        let half = config.max_bytes / 2;
        Self::from_parts(
            Generation::new(half),
            Generation::new(half),
            Mode::Split,
            config,
            true,
        )
    }

    /// Restores a cache from the snapshot at `path`.
    ///
    /// Never fails. A non-empty snapshot is trusted as is: the cache starts in
    /// [`Mode::Whole`] and no watcher is started. Otherwise (missing,
    /// corrupt or larger snapshot) the cache starts cold in [`Mode::Split`],
    /// exactly like [`Cache::new`].
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use wscache::{Cache, Mode};
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let path = dir.path().join("cache");
    ///
    /// let cache = Cache::new(1024 * 1024, Duration::from_secs(60));
    /// cache.set(b"key", b"value");
    /// cache.save(&path).unwrap();
    /// cache.stop();
    ///
    /// let cache = Cache::load(&path, 1024 * 1024, Duration::from_secs(60));
    /// assert_eq!(cache.mode(), Mode::Whole);
    /// assert!(cache.has(b"key"));
    /// ```
    pub fn load(path: impl AsRef<Path>, max_bytes: usize, expire_duration: Duration) -> Self {
        Self::load_with_config(
            path,
            CacheConfig::new(max_bytes).with_expire_duration(expire_duration),
        )
    }

    /// Restores a cache from the snapshot at `path` using a full configuration.
    pub fn load_with_config(path: impl AsRef<Path>, config: CacheConfig) -> Self {
        let path = path.as_ref();
        let curr = Generation::load_from_file_or_new(path, config.max_bytes);
        if curr.stats().entries_count > 0 {
            info!(path = %path.display(), "starting in whole mode from snapshot");
            return Self::from_parts(
                curr,
                Generation::new(PLACEHOLDER_BYTES),
                Mode::Whole,
                config,
                false,
            );
        }
        drop(curr);

        // A snapshot that did not fit the full budget does not fit half of it
        // either, and the reason was logged above.
        let half = config.max_bytes / 2;
        Self::from_parts(
            Generation::new(half),
            Generation::new(half),
            Mode::Split,
            config,
            true,
        )
    }

    fn from_parts(
        curr: Generation,
        prev: Generation,
        mode: Mode,
        config: CacheConfig,
        start_watchers: bool,
    ) -> Self {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(0);
        let shared = Arc::new(Shared {
            curr: ArcSwap::from_pointee(curr),
            prev: ArcSwap::from_pointee(prev),
            mode: AtomicMode::new(mode),
            config,
            lifecycle: Mutex::new(Lifecycle::new(stop_rx)),
        });
        if start_watchers {
            let mut lifecycle = shared.lifecycle.lock();
            watchers::start(&shared, &mut lifecycle);
        }

        Self {
            shared,
            stop: Some(stop_tx),
            get_calls: AtomicU64::new(0),
            set_calls: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            buffers: BufferPool::new(),
        }
    }

    /// Appends the value stored under `key` to `dst`.
    ///
    /// Returns `true` if the key was found, even if its value is empty.
    /// A value found only in the previous generation is copied into the
    /// current one.
    pub fn get(&self, dst: &mut Vec<u8>, key: &[u8]) -> bool {
        self.get_calls.fetch_add(1, Ordering::Relaxed);
        let curr = self.shared.curr.load();
        if curr.get(dst, key) {
            return true;
        }
        if self.shared.mode.load() == Mode::Whole {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let start = dst.len();
        if self.shared.prev.load().get(dst, key) {
            curr.set(key, &dst[start..]);
            return true;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        false
    }

    /// Returns whether `key` is cached, promoting it like [`Cache::get`].
    pub fn has(&self, key: &[u8]) -> bool {
        self.get_calls.fetch_add(1, Ordering::Relaxed);
        let curr = self.shared.curr.load();
        if curr.has(key) {
            return true;
        }
        if self.shared.mode.load() == Mode::Whole {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let mut buf = self.buffers.get();
        let found = self.shared.prev.load().get(&mut buf, key);
        if found {
            curr.set(key, &buf);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        self.buffers.put(buf);
        found
    }

    /// Stores `value` under `key` in the current generation.
    ///
    /// Entries of 64 KiB or more are dropped; use [`Cache::set_big`] for them.
    pub fn set(&self, key: &[u8], value: &[u8]) {
        self.set_calls.fetch_add(1, Ordering::Relaxed);
        self.shared.curr.load().set(key, value);
    }

    /// Appends the value stored by [`Cache::set_big`] under `key` to `dst`.
    pub fn get_big(&self, dst: &mut Vec<u8>, key: &[u8]) -> bool {
        self.get_calls.fetch_add(1, Ordering::Relaxed);
        let curr = self.shared.curr.load();
        if curr.get_big(dst, key) {
            return true;
        }
        if self.shared.mode.load() == Mode::Whole {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let start = dst.len();
        if self.shared.prev.load().get_big(dst, key) {
            curr.set_big(key, &dst[start..]);
            return true;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        false
    }

    /// Stores a value of any size under `key` in the current generation.
    pub fn set_big(&self, key: &[u8], value: &[u8]) {
        self.set_calls.fetch_add(1, Ordering::Relaxed);
        self.shared.curr.load().set_big(key, value);
    }

    /// Drops every entry and returns the cache to [`Mode::Split`].
    ///
    /// If the cache had grown, both generations are re-created at half the
    /// byte budget. Watchers that exited because of growth or a snapshot load
    /// are started again. The call counters reported by
    /// [`Cache::update_stats`] are kept.
    pub fn reset(&self) {
        let mut lifecycle = self.shared.lifecycle.lock();
        if self.shared.mode.load() == Mode::Split {
            self.shared.prev.load().reset();
            self.shared.curr.load().reset();
        } else {
            let half = self.shared.config.max_bytes / 2;
            self.shared.prev.store(Arc::new(Generation::new(half)));
            self.shared.curr.store(Arc::new(Generation::new(half)));
            self.shared.mode.store(Mode::Split);
            lifecycle.growth_target = None;
        }
        watchers::start(&self.shared, &mut lifecycle);
    }

    /// Adds the statistics of this cache to `dst`.
    ///
    /// Entry count, byte size and capacity cover both generations. Collisions
    /// and corruptions are those of the current generation only.
    pub fn update_stats(&self, dst: &mut Stats) {
        let _lifecycle = self.shared.lifecycle.lock();

        let mut curr = Stats::default();
        self.shared.curr.load().update_stats(&mut curr);
        let mut prev = Stats::default();
        self.shared.prev.load().update_stats(&mut prev);

        dst.entries_count += curr.entries_count + prev.entries_count;
        dst.bytes_size += curr.bytes_size + prev.bytes_size;
        dst.max_bytes_size += curr.max_bytes_size + prev.max_bytes_size;
        dst.collisions += curr.collisions;
        dst.corruptions += curr.corruptions;

        dst.get_calls += self.get_calls.load(Ordering::Relaxed);
        dst.set_calls += self.set_calls.load(Ordering::Relaxed);
        dst.misses += self.misses.load(Ordering::Relaxed);
    }

    /// Saves the current generation to `path`, using one writer thread per
    /// available CPU.
    ///
    /// The previous generation is never saved.
    ///
    /// # Errors
    ///
    /// Returns the I/O error of the first shard that could not be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let curr = self.shared.curr.load_full();
        curr.save_to_file_concurrent(path, available_cpus())
    }

    /// Current operating mode.
    pub fn mode(&self) -> Mode {
        self.shared.mode.load()
    }

    /// Stops both watchers, waits for them to exit and drops every entry.
    ///
    /// Dropping a cache does the same.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(stop) = self.stop.take() else {
            return;
        };
        drop(stop);

        let handles = {
            let mut lifecycle = self.shared.lifecycle.lock();
            lifecycle.stop = None;
            std::mem::take(&mut lifecycle.handles)
        };
        for handle in handles {
            if handle.join().is_err() {
                error!("cache watcher thread panicked");
            }
        }
        self.reset();
    }
}

impl Drop for Cache {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("mode", &self.mode())
            .field("max_bytes", &self.shared.config.max_bytes)
            .field("get_calls", &self.get_calls.load(Ordering::Relaxed))
            .field("set_calls", &self.set_calls.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish()
    }
}
