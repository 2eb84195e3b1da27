//! Chunked storage for values that do not fit in a single entry.
//!
//! A big value is split into sub-values of at most [`MAX_SUBVALUE_LEN`] bytes.
//! Sub-value `i` is stored under a 16-byte sub-key made of the value's hash
//! and `i`; the user key maps to 16 bytes of metadata holding the value's
//! hash and total length. Reads reassemble the chunks and verify both.

use crate::generation::{Generation, MAX_ENTRY_SIZE};
use xxhash_rust::xxh3::xxh3_64;

/// Largest chunk stored per sub-entry: leaves room for the 16-byte sub-key,
/// the entry header and the `< MAX_ENTRY_SIZE` bound.
pub const MAX_SUBVALUE_LEN: usize = MAX_ENTRY_SIZE - 16 - 4 - 1;

const METADATA_LEN: usize = 16;

impl Generation {
    /// Stores a value of arbitrary size under `key`.
    ///
    /// Values stored with `set_big` must be read back with
    /// [`Generation::get_big`]. Every chunk plus the metadata entry counts as
    /// one `set` call in the statistics.
    ///
    /// # Examples
    ///
    /// ```
    /// use wscache_core::{Generation, MAX_SUBVALUE_LEN};
    ///
    /// let generation = Generation::new(4 * 1024 * 1024);
    /// let value = vec![42u8; 3 * MAX_SUBVALUE_LEN];
    /// generation.set_big(b"blob", &value);
    ///
    /// let mut dst = Vec::new();
    /// assert!(generation.get_big(&mut dst, b"blob"));
    /// assert_eq!(dst, value);
    /// ```
    pub fn set_big(&self, key: &[u8], value: &[u8]) {
        let value_hash = xxh3_64(value);
        for (i, chunk) in value.chunks(MAX_SUBVALUE_LEN).enumerate() {
            self.set(&pack(value_hash, i as u64), chunk);
        }
        self.set(key, &pack(value_hash, value.len() as u64));
    }

    /// Appends the big value stored under `key` to `dst`.
    ///
    /// Returns false, leaving `dst` untouched, when the metadata or any chunk
    /// is missing. A value whose reassembled length or hash does not match
    /// its metadata is counted as a corruption and treated as missing.
    pub fn get_big(&self, dst: &mut Vec<u8>, key: &[u8]) -> bool {
        let mut metadata = Vec::with_capacity(METADATA_LEN);
        if !self.get(&mut metadata, key) {
            return false;
        }
        let Some((value_hash, value_len)) = unpack(&metadata) else {
            self.counters.record_corruption();
            return false;
        };

        let start = dst.len();
        let chunks = (value_len as usize).div_ceil(MAX_SUBVALUE_LEN);
        for i in 0..chunks {
            if !self.get(dst, &pack(value_hash, i as u64)) {
                dst.truncate(start);
                return false;
            }
        }

        let value = &dst[start..];
        if value.len() as u64 != value_len || xxh3_64(value) != value_hash {
            self.counters.record_corruption();
            dst.truncate(start);
            return false;
        }
        true
    }
}

fn pack(a: u64, b: u64) -> [u8; METADATA_LEN] {
    let mut buf = [0u8; METADATA_LEN];
    buf[..8].copy_from_slice(&a.to_be_bytes());
    buf[8..].copy_from_slice(&b.to_be_bytes());
    buf
}

fn unpack(buf: &[u8]) -> Option<(u64, u64)> {
    if buf.len() != METADATA_LEN {
        return None;
    }
    let a = u64::from_be_bytes(buf[..8].try_into().ok()?);
    let b = u64::from_be_bytes(buf[8..].try_into().ok()?);
    Some((a, b))
}
