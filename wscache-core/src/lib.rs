//! # wscache Core
//!
//! The storage engine underneath the `wscache` working-set cache.
//!
//! This crate provides [`Generation`], a fixed-capacity, thread-safe,
//! byte-keyed cache, together with everything needed to operate it:
//! statistics, chunked storage for large values, on-disk snapshots and a
//! reusable buffer pool.
//!
//! ## Features
//!
//! - **Fixed capacity**: a generation never holds more than the bytes it was
//!   created with; the oldest entries of a full bucket are evicted first
//! - **Concurrent access**: keys are spread over independently locked buckets
//! - **Big values**: [`Generation::set_big`] / [`Generation::get_big`] store
//!   values of any size as verified chunks
//! - **Snapshots**: [`Generation::save_to_file_concurrent`] writes sharded,
//!   checksummed snapshot files in parallel
//! - **Statistics**: call, miss, collision and corruption counters plus
//!   occupancy, see [`Stats`]
//!
//! ## Module Organization
//!
//! - `entry` - Stored key/value pairs and their byte accounting
//! - `generation` - The bucketed cache itself
//! - `big` - Chunked big values
//! - `persistence` - Snapshot format, save and load
//! - [`utils`] - CPU count and timer jitter helpers
//!
mod big;
mod bucket;
mod buffer_pool;
mod entry;
mod error;
mod generation;
mod persistence;
mod stats;

pub mod utils;

pub use big::MAX_SUBVALUE_LEN;
pub use buffer_pool::BufferPool;
pub use entry::ENTRY_OVERHEAD;
pub use error::{Error, Result};
pub use generation::{Generation, BUCKETS_COUNT, MAX_ENTRY_SIZE, MIN_BUCKET_BYTES};
pub use persistence::{DATA_MAGIC, METADATA_MAGIC, SNAPSHOT_VERSION};
pub use stats::Stats;
