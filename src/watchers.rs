//! Background threads of a working-set cache.
//!
//! Every cache runs at most two watchers:
//!
//! - the **expiration watcher** rotates the generations every expire
//!   duration while the cache is in split mode, and exits otherwise;
//! - the **size watcher** drives the one-shot `split → switching → whole`
//!   growth and, while in split mode, drops a previous generation that no
//!   longer serves reads. It exits once the cache is whole.
//!
//! Both block on the cache's stop channel next to their timers, so dropping
//! the sender wakes and ends them immediately. All state changes happen
//! under the transition mutex.

use crate::cache::{Lifecycle, Shared, PLACEHOLDER_BYTES};
use crate::mode::Mode;
use crossbeam_channel::{select, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};
use wscache_core::utils::random_jitter;
use wscache_core::Generation;

/// Share of its capacity curr must fill before the cache grows.
const GROWTH_THRESHOLD: f64 = 0.9;

const MIN_PERIOD: Duration = Duration::from_millis(1);
const MAX_PERIOD: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// Starts the watchers that are not running yet.
///
/// Does nothing once the cache is stopped.
pub(crate) fn start(shared: &Arc<Shared>, lifecycle: &mut Lifecycle) {
    let Some(stop) = lifecycle.stop.clone() else {
        return;
    };
    lifecycle.handles.retain(|handle| !handle.is_finished());

    if !lifecycle.expiration_running {
        let started = spawn(
            "wscache-expiration",
            shared,
            stop.clone(),
            expiration_watcher,
            lifecycle,
        );
        lifecycle.expiration_running = started;
    }
    if !lifecycle.size_running {
        let started = spawn("wscache-size", shared, stop, size_watcher, lifecycle);
        lifecycle.size_running = started;
    }
}

fn spawn(
    name: &'static str,
    shared: &Arc<Shared>,
    stop: Receiver<()>,
    body: fn(Arc<Shared>, Receiver<()>),
    lifecycle: &mut Lifecycle,
) -> bool {
    let shared = Arc::clone(shared);
    match thread::Builder::new()
        .name(name.to_string())
        .spawn(move || body(shared, stop))
    {
        Ok(handle) => {
            lifecycle.handles.push(handle);
            true
        }
        Err(err) => {
            error!(watcher = name, %err, "cannot start cache watcher");
            false
        }
    }
}

/// A fixed-period timer.
///
/// With jitter, the first tick comes up to 10% of the period early; later
/// ticks follow at the exact period. Ticks missed while the owner was busy
/// are skipped.
struct Ticker {
    period: Duration,
    next: Instant,
}

impl Ticker {
    fn new(period: Duration, jitter: bool) -> Self {
        let period = period.clamp(MIN_PERIOD, MAX_PERIOD);
        let first = if jitter {
            period - random_jitter(period)
        } else {
            period
        };
        Self {
            period,
            next: Instant::now() + first,
        }
    }

    fn deadline(&self) -> Receiver<Instant> {
        crossbeam_channel::at(self.next)
    }

    fn advance(&mut self) {
        self.next += self.period;
        let now = Instant::now();
        if self.next <= now {
            self.next = now + self.period;
        }
    }
}

fn expiration_watcher(shared: Arc<Shared>, stop: Receiver<()>) {
    let mut ticker = Ticker::new(shared.config.expire_duration, shared.config.jitter);
    loop {
        select! {
            recv(stop) -> _ => return,
            recv(ticker.deadline()) -> _ => ticker.advance(),
        }

        let mut lifecycle = shared.lifecycle.lock();
        let mode = shared.mode.load();
        if mode != Mode::Split {
            lifecycle.expiration_running = false;
            debug!(%mode, "expiration watcher exits");
            return;
        }
        shared.rotate();
    }
}

fn size_watcher(shared: Arc<Shared>, stop: Receiver<()>) {
    let config = &shared.config;
    let mut size_ticker = Ticker::new(config.size_check_interval, config.jitter);
    let removal_ratio = config.prev_removal_ratio();
    let mut prev_ticker = removal_ratio.map(|_| Ticker::new(config.prev_check_interval, config.jitter));
    let mut usage = PrevUsage::default();

    loop {
        let prev_deadline = prev_ticker
            .as_ref()
            .map_or_else(crossbeam_channel::never, Ticker::deadline);
        select! {
            recv(stop) -> _ => return,
            recv(size_ticker.deadline()) -> _ => {
                size_ticker.advance();
                if !shared.check_size() {
                    return;
                }
            }
            recv(prev_deadline) -> _ => {
                if let (Some(ticker), Some(ratio)) = (prev_ticker.as_mut(), removal_ratio) {
                    ticker.advance();
                    shared.check_prev_usage(&mut usage, ratio);
                }
            }
        }
    }
}

/// Get calls seen by each generation at the previous check.
#[derive(Debug, Default)]
struct PrevUsage {
    curr_get_calls: u64,
    prev_get_calls: u64,
}

/// Calls since the previous check. A counter below its last value belongs to
/// a generation created or reset since then, so all of its calls are new.
fn calls_since(total: u64, last: &mut u64) -> u64 {
    let delta = total.checked_sub(*last).unwrap_or(total);
    *last = total;
    delta
}

impl Shared {
    /// Turns curr into prev and installs an empty curr of the same capacity.
    ///
    /// The caller holds the transition mutex.
    pub(crate) fn rotate(&self) {
        let curr = self.curr.load_full();
        let fresh = Arc::new(Generation::new(curr.max_bytes()));
        self.prev.store(curr);
        self.curr.store(fresh);
        debug!("rotated cache generations");
    }

    /// Advances the growth state machine by one step.
    ///
    /// Returns `false` once the size watcher has nothing left to do.
    fn check_size(&self) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        let done = match self.mode.load() {
            Mode::Split => {
                self.start_growth(&mut lifecycle);
                false
            }
            Mode::Switching => self.finish_growth(&mut lifecycle),
            Mode::Whole => true,
        };
        if done {
            lifecycle.size_running = false;
            debug!("size watcher exits");
        }
        !done
    }

    fn start_growth(&self, lifecycle: &mut Lifecycle) {
        let curr = self.curr.load_full();
        let stats = curr.stats();
        if (stats.bytes_size as f64) < stats.max_bytes_size as f64 * GROWTH_THRESHOLD {
            return;
        }

        let target = curr.max_bytes();
        self.mode.store(Mode::Switching);
        lifecycle.growth_target = Some(target);
        self.prev.store(curr);
        self.curr.store(Arc::new(Generation::new(target * 2)));
        info!(
            from_bytes = target,
            to_bytes = target * 2,
            "cache generation is full; switching to a single generation"
        );
    }

    fn finish_growth(&self, lifecycle: &mut Lifecycle) -> bool {
        let target = lifecycle
            .growth_target
            .expect("switching mode without a growth target");
        let bytes = self.curr.load().stats().bytes_size;
        if bytes < target as u64 {
            return false;
        }

        self.mode.store(Mode::Whole);
        self.prev.store(Arc::new(Generation::new(PLACEHOLDER_BYTES)));
        lifecycle.growth_target = None;
        info!(max_bytes = target * 2, "cache switched to whole mode");
        true
    }

    /// Drops prev's entries if it served too few reads since the last check.
    fn check_prev_usage(&self, usage: &mut PrevUsage, ratio: f64) {
        let _lifecycle = self.lifecycle.lock();
        if self.mode.load() != Mode::Split {
            return;
        }

        let curr = self.curr.load().stats();
        let prev = self.prev.load_full();
        let prev_stats = prev.stats();
        let curr_requests = calls_since(curr.get_calls, &mut usage.curr_get_calls);
        let prev_requests = calls_since(prev_stats.get_calls, &mut usage.prev_get_calls);

        let min_curr_requests = (1.0 / ratio) as u64;
        if curr_requests < min_curr_requests || prev_stats.entries_count == 0 {
            return;
        }
        if (prev_requests as f64) < ratio * curr_requests as f64 {
            prev.reset();
            debug!(
                curr_requests,
                prev_requests,
                entries = prev_stats.entries_count,
                "dropped rarely read previous cache generation"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calls_since() {
        let mut last = 0;
        assert_eq!(calls_since(10, &mut last), 10);
        assert_eq!(calls_since(25, &mut last), 15);
        // The generation was replaced.
        assert_eq!(calls_since(4, &mut last), 4);
        assert_eq!(last, 4);
    }

    #[test]
    fn test_ticker_without_jitter() {
        let before = Instant::now();
        let mut ticker = Ticker::new(Duration::from_secs(10), false);
        assert!(ticker.next >= before + Duration::from_secs(10));

        let first = ticker.next;
        ticker.advance();
        assert_eq!(ticker.next, first + Duration::from_secs(10));
    }

    #[test]
    fn test_ticker_jitter_pulls_first_tick_forward() {
        let before = Instant::now();
        let ticker = Ticker::new(Duration::from_secs(10), true);
        assert!(ticker.next >= before + Duration::from_secs(9));
        assert!(ticker.next <= Instant::now() + Duration::from_secs(10));
    }

    #[test]
    fn test_ticker_skips_missed_ticks() {
        let mut ticker = Ticker::new(Duration::from_millis(1), false);
        std::thread::sleep(Duration::from_millis(20));
        let now = Instant::now();
        ticker.advance();
        assert!(ticker.next > now);
    }

    #[test]
    fn test_ticker_clamps_period() {
        assert_eq!(Ticker::new(Duration::ZERO, false).period, MIN_PERIOD);
        assert_eq!(Ticker::new(Duration::MAX, false).period, MAX_PERIOD);
    }

    #[test]
    fn test_ticker_fires() {
        let ticker = Ticker::new(Duration::from_millis(5), false);
        assert!(ticker.deadline().recv_timeout(Duration::from_secs(1)).is_ok());
    }
}
