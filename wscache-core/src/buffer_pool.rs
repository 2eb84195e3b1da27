use crossbeam_queue::ArrayQueue;

/// A bounded pool of reusable byte buffers.
///
/// Each working-set cache owns its own pool, so buffers are never shared
/// between unrelated caches. Buffers are cleared when taken from the pool;
/// buffers that grew past [`BufferPool::MAX_POOLED_CAPACITY`] are dropped on
/// return instead of being kept alive.
///
/// # Examples
///
/// ```
/// use wscache_core::BufferPool;
///
/// let pool = BufferPool::new();
/// let mut buf = pool.get();
/// buf.extend_from_slice(b"scratch");
/// pool.put(buf);
///
/// let buf = pool.get();
/// assert!(buf.is_empty());
/// assert!(buf.capacity() >= 7);
/// ```
#[derive(Debug)]
pub struct BufferPool {
    buffers: ArrayQueue<Vec<u8>>,
}

impl BufferPool {
    /// Number of idle buffers kept by a pool.
    pub const POOL_SIZE: usize = 64;

    /// Largest buffer capacity returned to the pool.
    pub const MAX_POOLED_CAPACITY: usize = 1024 * 1024;

    pub fn new() -> Self {
        Self {
            buffers: ArrayQueue::new(Self::POOL_SIZE),
        }
    }

    /// Takes an empty buffer from the pool, allocating one if none is idle.
    pub fn get(&self) -> Vec<u8> {
        match self.buffers.pop() {
            Some(mut buf) => {
                buf.clear();
                buf
            }
            None => Vec::new(),
        }
    }

    /// Returns a buffer to the pool.
    pub fn put(&self, buf: Vec<u8>) {
        if buf.capacity() <= Self::MAX_POOLED_CAPACITY {
            // Full pool: the buffer is simply dropped.
            let _ = self.buffers.push(buf);
        }
    }

    /// Number of idle buffers currently pooled.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}
