use crate::entry::{entry_size, Entry};
use std::collections::{HashMap, VecDeque};

/// Result of looking a key up in a bucket.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Lookup<'a> {
    /// The key is stored; holds its value.
    Found(&'a [u8]),
    /// Nothing is stored under the key's hash.
    Missing,
    /// Another key with the same hash occupies the slot.
    Collision,
}

/// One shard of a generation: a hash-indexed map with FIFO eviction bounded
/// by a byte budget.
///
/// The order queue records `(hash, seq)` pairs in insertion order. Overwriting
/// a key leaves its old slot in the queue; such stale slots are recognized by
/// a sequence mismatch and skipped during eviction.
#[derive(Debug)]
pub(crate) struct Bucket {
    map: HashMap<u64, Entry>,
    order: VecDeque<(u64, u64)>,
    bytes: usize,
    max_bytes: usize,
    next_seq: u64,
}

impl Bucket {
    pub(crate) fn new(max_bytes: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            bytes: 0,
            max_bytes,
            next_seq: 0,
        }
    }

    pub(crate) fn lookup(&self, hash: u64, key: &[u8]) -> Lookup<'_> {
        match self.map.get(&hash) {
            Some(entry) if entry.matches(key) => Lookup::Found(&entry.value),
            Some(_) => Lookup::Collision,
            None => Lookup::Missing,
        }
    }

    /// Stores `key`/`value`, evicting the oldest entries until it fits.
    ///
    /// Returns false without touching the bucket if the entry is larger than
    /// the whole bucket.
    pub(crate) fn insert(&mut self, hash: u64, key: &[u8], value: &[u8]) -> bool {
        let size = entry_size(key, value);
        if size > self.max_bytes {
            return false;
        }

        if let Some(old) = self.map.remove(&hash) {
            self.bytes -= old.byte_size();
        }

        while self.bytes + size > self.max_bytes {
            match self.order.pop_front() {
                Some((evict_hash, seq)) => self.evict_if_live(evict_hash, seq),
                None => break,
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.map.insert(hash, Entry::new(key, value, seq));
        self.order.push_back((hash, seq));
        self.bytes += size;

        self.compact_order_if_needed();
        true
    }

    fn evict_if_live(&mut self, hash: u64, seq: u64) {
        if self.map.get(&hash).is_some_and(|e| e.seq == seq) {
            if let Some(entry) = self.map.remove(&hash) {
                self.bytes -= entry.byte_size();
            }
        }
    }

    /// Drops stale order slots once they outnumber live entries.
    fn compact_order_if_needed(&mut self) {
        if self.order.len() > 2 * self.map.len() + 16 {
            let map = &self.map;
            self.order
                .retain(|(hash, seq)| map.get(hash).is_some_and(|e| e.seq == *seq));
        }
    }

    pub(crate) fn reset(&mut self) {
        self.map.clear();
        self.order.clear();
        self.bytes = 0;
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    pub(crate) fn bytes(&self) -> usize {
        self.bytes
    }

    pub(crate) fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Live entries, oldest first.
    pub(crate) fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.order.iter().filter_map(move |(hash, seq)| {
            self.map.get(hash).filter(|entry| entry.seq == *seq)
        })
    }
}
