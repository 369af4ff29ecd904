//! Bounded byte FIFO backing the central audio buffer.

use parking_lot::Mutex;

/// Thread-safe bounded byte queue.
///
/// Must be safe for one producer and one consumer thread operating
/// concurrently. Short reads and writes are allowed; the return value is the
/// number of bytes actually moved.
pub trait ByteQueue: Send + Sync {
    fn write(&self, data: &[u8]) -> usize;
    fn read(&self, out: &mut [u8]) -> usize;
    /// Bytes currently queued.
    fn size(&self) -> usize;
    fn capacity(&self) -> usize;
    /// Drops queued bytes, keeping at most `keep` of the oldest.
    fn empty_except(&self, keep: usize);
}

struct Ring {
    data: Box<[u8]>,
    begin: usize,
    len: usize,
}

/// Fixed-capacity ring of bytes behind a mutex.
pub struct CircularBuffer {
    ring: Mutex<Ring>,
    capacity: usize,
}

impl CircularBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(Ring {
                data: vec![0u8; capacity].into_boxed_slice(),
                begin: 0,
                len: 0,
            }),
            capacity,
        }
    }
}

impl ByteQueue for CircularBuffer {
    fn write(&self, data: &[u8]) -> usize {
        let mut ring = self.ring.lock();
        let n = data.len().min(self.capacity - ring.len);
        if n == 0 {
            return 0;
        }

        let end = (ring.begin + ring.len) % self.capacity;
        let first = n.min(self.capacity - end);
        ring.data[end..end + first].copy_from_slice(&data[..first]);
        ring.data[..n - first].copy_from_slice(&data[first..n]);
        ring.len += n;
        n
    }

    fn read(&self, out: &mut [u8]) -> usize {
        let mut ring = self.ring.lock();
        let n = out.len().min(ring.len);
        if n == 0 {
            return 0;
        }

        let begin = ring.begin;
        let first = n.min(self.capacity - begin);
        out[..first].copy_from_slice(&ring.data[begin..begin + first]);
        out[first..n].copy_from_slice(&ring.data[..n - first]);
        ring.begin = (begin + n) % self.capacity;
        ring.len -= n;
        n
    }

    fn size(&self) -> usize {
        self.ring.lock().len
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn empty_except(&self, keep: usize) {
        let mut ring = self.ring.lock();
        ring.len = ring.len.min(keep);
    }
}
