/// Per-entry bookkeeping bytes charged against bucket capacity.
///
/// Mirrors the length header a ring-buffer layout would store next to every
/// key/value pair, so capacity accounting stays comparable across layouts.
pub const ENTRY_OVERHEAD: usize = 4;

/// A key/value pair stored in a generation bucket.
///
/// The key is kept alongside the value so that two keys sharing a 64-bit hash
/// are detected as a collision instead of returning the wrong value.
///
/// # Fields
///
/// * `key` - The original key bytes
/// * `value` - The stored value bytes
/// * `seq` - Insertion sequence number, used to skip stale slots in the
///   bucket's order queue after an overwrite
#[derive(Clone, Debug)]
pub(crate) struct Entry {
    pub(crate) key: Box<[u8]>,
    pub(crate) value: Box<[u8]>,
    pub(crate) seq: u64,
}

impl Entry {
    /// Creates a new entry by copying `key` and `value`.
    pub(crate) fn new(key: &[u8], value: &[u8], seq: u64) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            seq,
        }
    }

    /// Bytes this entry occupies in its bucket.
    #[inline]
    pub(crate) fn byte_size(&self) -> usize {
        entry_size(&self.key, &self.value)
    }

    /// Returns true if this entry was stored under exactly `key`.
    #[inline]
    pub(crate) fn matches(&self, key: &[u8]) -> bool {
        &*self.key == key
    }
}

/// Bytes a key/value pair would occupy once stored.
#[inline]
pub(crate) fn entry_size(key: &[u8], value: &[u8]) -> usize {
    key.len() + value.len() + ENTRY_OVERHEAD
}
