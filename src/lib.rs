//! # wscache
//!
//! An adaptive working-set cache for byte keys and values.
//!
//! A [`Cache`] keeps two fixed-capacity generations of half the byte budget
//! each. New entries go into the *current* generation; every expire duration
//! the current generation becomes the *previous* one and a fresh current
//! generation takes its place. Reads that miss the current generation but hit
//! the previous one copy the entry forward, so entries read at least once per
//! expire duration stay cached while everything else ages out, without any
//! per-entry timestamps.
//!
//! ## Features
//!
//! - **Recency without bookkeeping**: two rotating generations approximate
//!   "keep what was used recently"
//! - **Adaptive capacity**: once the working set no longer fits in half the
//!   budget, the cache switches once to a single generation using all of it
//! - **Snapshots**: [`Cache::save`] writes the current generation to disk
//!   concurrently; [`Cache::load`] restores it and never fails
//! - **Thread-safe**: reads and writes are lock-free atomic loads over
//!   internally locked generations; the background watchers are joined on
//!   [`Cache::stop`] or drop
//! - **Statistics**: see [`Cache::update_stats`] and [`Stats`]
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use wscache::Cache;
//!
//! let cache = Cache::new(32 * 1024 * 1024, Duration::from_secs(30 * 60));
//!
//! cache.set(b"series:42", b"{job=\"api\"}");
//!
//! let mut dst = Vec::new();
//! if cache.get(&mut dst, b"series:42") {
//!     assert_eq!(dst, b"{job=\"api\"}");
//! }
//!
//! cache.stop();
//! ```
//!
//! ## Modes
//!
//! | Mode | Generations read | Rotation | Entered |
//! |------|------------------|----------|---------|
//! | [`Mode::Split`] | current, then previous | every expire duration | on creation, on [`Cache::reset`] |
//! | [`Mode::Switching`] | current, then previous | no | current generation 90% full |
//! | [`Mode::Whole`] | current only | no | grown generation as full as the old one, or loaded from a snapshot |
//!
//! ## Large Values
//!
//! [`Cache::set`] drops entries of 64 KiB or more. Store them with
//! [`Cache::set_big`] and read them back with [`Cache::get_big`]:
//!
//! ```rust
//! use std::time::Duration;
//! use wscache::Cache;
//!
//! let cache = Cache::new(16 * 1024 * 1024, Duration::from_secs(60));
//! let blob = vec![1u8; 200 * 1024];
//! cache.set_big(b"blob", &blob);
//!
//! let mut dst = Vec::new();
//! assert!(cache.get_big(&mut dst, b"blob"));
//! assert_eq!(dst, blob);
//! ```
//!
//! ## Configuration
//!
//! [`Cache::with_config`] and [`Cache::load_with_config`] accept a
//! [`CacheConfig`] to tune the watcher intervals:
//!
//! ```rust
//! use std::time::Duration;
//! use wscache::{Cache, CacheConfig};
//!
//! let config = CacheConfig::new(8 * 1024 * 1024)
//!     .with_expire_duration(Duration::from_secs(300))
//!     .with_size_check_interval(Duration::from_secs(5));
//! let cache = Cache::with_config(config);
//! # cache.stop();
//! ```
//!
//! ## Logging
//!
//! Mode changes, snapshot loads and saves are reported through [`tracing`].
//! The crate never installs a subscriber.
//!
//! ## Module Organization
//!
//! - `cache` - The [`Cache`] façade: reads, writes, reset, stats, persistence
//! - `watchers` - Expiration and size watcher threads
//! - `mode` - The [`Mode`] state machine
//! - `config` - [`CacheConfig`]
//!
//! The storage engine lives in the `wscache-core` crate.

mod cache;
mod config;
mod mode;
mod watchers;

pub use cache::Cache;
pub use config::CacheConfig;
pub use mode::Mode;

pub use wscache_core::{Error, Generation, Result, Stats};
