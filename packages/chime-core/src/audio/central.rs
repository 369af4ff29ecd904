//! Central audio buffer.
//!
//! The producer writes PCM of any size with [`CentralAudioBuffer::write_pcm`].
//! Bytes accumulate in an open chunk that is serialized into the backing
//! queue once it is full or the track changes. The consumer dequeues whole
//! chunks with [`CentralAudioBuffer::read_chunk`] and never observes the open
//! chunk.
//!
//! Cross-thread safety for concurrent production and consumption comes from
//! the [`ByteQueue`]. The open chunk is producer-owned; its mutex is only
//! contended by [`CentralAudioBuffer::flush`] during teardown.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::Mutex;

use super::chunk::{AudioChunk, CHUNK_BYTES};
use super::queue::{ByteQueue, CircularBuffer};
use super::AudioFormat;
use crate::config::BufferConfig;
use crate::protocol_constants::DEFAULT_SAMPLE_RATE;

/// Whether a playback session currently holds the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
}

pub struct CentralAudioBuffer {
    queue: Box<dyn ByteQueue>,
    open_chunk: Mutex<Option<Box<AudioChunk>>>,
    sample_rate: AtomicU32,
    active: AtomicBool,
}

impl CentralAudioBuffer {
    /// Creates a buffer holding up to `chunks` serialized chunks.
    pub fn new(chunks: usize) -> Self {
        Self::with_queue(Box::new(CircularBuffer::new(chunks * CHUNK_BYTES)))
    }

    pub fn from_config(config: &BufferConfig) -> Self {
        Self::new(config.chunks)
    }

    /// Wraps an existing byte queue.
    pub fn with_queue(queue: Box<dyn ByteQueue>) -> Self {
        log::debug!(
            "[Audio] Central buffer created: {} chunks of {} bytes",
            queue.capacity() / CHUNK_BYTES,
            CHUNK_BYTES
        );
        Self {
            queue,
            open_chunk: Mutex::new(None),
            sample_rate: AtomicU32::new(DEFAULT_SAMPLE_RATE),
            active: AtomicBool::new(false),
        }
    }

    fn free_bytes(&self) -> usize {
        self.queue.capacity().saturating_sub(self.queue.size())
    }

    fn enqueue(&self, chunk: &AudioChunk) -> bool {
        if self.free_bytes() < CHUNK_BYTES {
            log::trace!(
                "[Audio] Backpressure: {} bytes free, chunk needs {}",
                self.free_bytes(),
                CHUNK_BYTES
            );
            return false;
        }
        let written = self.queue.write(chunk.as_bytes());
        debug_assert_eq!(written, CHUNK_BYTES);
        true
    }

    /// Appends PCM to the open chunk, returning how many bytes were consumed.
    ///
    /// A full open chunk, or one belonging to another track, is flushed to
    /// the queue first. If the queue cannot take a whole chunk the call
    /// consumes nothing and returns 0; the open chunk is left untouched and
    /// the caller must resubmit. Partial consumption is normal: resubmit the
    /// remainder.
    pub fn write_pcm(&self, data: &[u8], track_hash: u64, format: AudioFormat) -> usize {
        let mut open = self.open_chunk.lock();

        if let Some(chunk) = open.as_deref() {
            if chunk.track_hash != track_hash || chunk.is_full() {
                if chunk.track_hash != track_hash {
                    log::debug!(
                        "[Audio] Track changed: {:016x} -> {:016x}",
                        chunk.track_hash,
                        track_hash
                    );
                }
                if !self.enqueue(chunk) {
                    return 0;
                }
                *open = None;
            }
        }

        open.get_or_insert_with(|| Box::new(AudioChunk::new(track_hash, format)))
            .append(data)
    }

    /// Pushes the open chunk to the queue even if it is not full.
    ///
    /// Used at end of stream so the tail of a track becomes readable. Returns
    /// `false` under backpressure, in which case the open chunk is kept.
    pub fn flush(&self) -> bool {
        let mut open = self.open_chunk.lock();
        let Some(chunk) = open.as_deref().filter(|chunk| !chunk.is_empty()) else {
            return true;
        };
        if !self.enqueue(chunk) {
            return false;
        }
        *open = None;
        true
    }

    /// Dequeues the oldest chunk.
    ///
    /// Returns a chunk with `pcm_size == 0` when less than one whole chunk is
    /// queued; the queue is not touched in that case.
    pub fn read_chunk(&self) -> AudioChunk {
        if self.queue.size() < CHUNK_BYTES {
            return AudioChunk::empty();
        }

        let mut chunk = AudioChunk::empty();
        let read = self.queue.read(chunk.as_bytes_mut());
        if read != CHUNK_BYTES {
            log::warn!("[Audio] Short chunk read ({} of {} bytes)", read, CHUNK_BYTES);
            return AudioChunk::empty();
        }

        self.sample_rate.store(chunk.sample_rate, Ordering::Release);
        chunk
    }

    /// Empties the queue except for about one second of audio at the current rate.
    pub fn clear_buffer(&self) {
        let keep = (self.sample_rate() as usize).div_ceil(CHUNK_BYTES) * CHUNK_BYTES;
        self.queue.empty_except(keep);
        log::debug!("[Audio] Buffer cleared, {} chunks kept", self.queued_chunks());
    }

    /// True when at least `chunks` whole chunks are queued.
    pub fn has_at_least(&self, chunks: usize) -> bool {
        self.queue.size() >= chunks * CHUNK_BYTES
    }

    /// Sample rate of the most recently read chunk.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Acquire)
    }

    pub fn queued_chunks(&self) -> usize {
        self.queue.size() / CHUNK_BYTES
    }

    pub fn free_chunks(&self) -> usize {
        self.free_bytes() / CHUNK_BYTES
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Playback session gate
    // ─────────────────────────────────────────────────────────────────────────

    /// Marks the start of playback. Clears the buffer on the Idle to Active
    /// transition only; repeated calls are no-ops.
    pub fn lock_access(&self) {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            log::info!("[Audio] Playback session started");
            self.clear_buffer();
        }
    }

    /// Marks the end of playback. Clears the buffer on the Active to Idle
    /// transition only; repeated calls are no-ops.
    pub fn unlock_access(&self) {
        if self
            .active
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.clear_buffer();
            log::info!("[Audio] Playback session ended");
        }
    }

    pub fn session_state(&self) -> SessionState {
        if self.active.load(Ordering::Acquire) {
            SessionState::Active
        } else {
            SessionState::Idle
        }
    }

    /// Starts a playback session that ends when the returned guard drops.
    pub fn begin_session(&self) -> PlaybackSession<'_> {
        self.lock_access();
        PlaybackSession { buffer: self }
    }
}

/// RAII handle for an active playback session.
///
/// Owned by the consumer; dereferences to the buffer for reads.
pub struct PlaybackSession<'a> {
    buffer: &'a CentralAudioBuffer,
}

impl std::ops::Deref for PlaybackSession<'_> {
    type Target = CentralAudioBuffer;

    fn deref(&self) -> &Self::Target {
        self.buffer
    }
}

impl Drop for PlaybackSession<'_> {
    fn drop(&mut self) {
        self.buffer.unlock_access();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::protocol_constants::PCM_CHUNK_SIZE;

    const CD: AudioFormat = AudioFormat {
        sample_rate: 44100,
        channels: 2,
        bit_depth: 16,
    };

    /// Writes all of `data`, asserting the buffer never pushes back.
    fn write_all(buffer: &CentralAudioBuffer, data: &[u8], hash: u64) {
        let mut offset = 0;
        while offset < data.len() {
            let n = buffer.write_pcm(&data[offset..], hash, CD);
            assert!(n > 0, "unexpected backpressure");
            offset += n;
        }
    }

    mod chunking {
        use super::*;

        #[test]
        fn full_chunk_then_tail_are_read_in_order() {
            let buffer = CentralAudioBuffer::new(4);
            assert_eq!(buffer.write_pcm(&[1u8; 4096], 42, CD), 4096);
            assert_eq!(buffer.write_pcm(&[2u8; 904], 42, CD), 904);
            assert!(buffer.flush());

            let first = buffer.read_chunk();
            assert_eq!(first.pcm_size, 4096);
            assert_eq!(first.track_hash, 42);
            assert_eq!(first.format(), CD);

            let second = buffer.read_chunk();
            assert_eq!(second.pcm_size, 904);
            assert_eq!(second.track_hash, 42);
            assert!(second.pcm().iter().all(|&b| b == 2));

            assert_eq!(buffer.read_chunk().pcm_size, 0);
        }

        #[test]
        fn open_chunk_is_invisible_until_flushed() {
            let buffer = CentralAudioBuffer::new(4);
            write_all(&buffer, &[1u8; 4096], 42);
            assert_eq!(buffer.queued_chunks(), 0);
            assert!(buffer.read_chunk().is_empty());

            // The next write flushes the full chunk before opening another.
            buffer.write_pcm(&[2u8; 904], 42, CD);
            assert_eq!(buffer.queued_chunks(), 1);
            assert_eq!(buffer.read_chunk().pcm_size, 4096);
            assert!(buffer.read_chunk().is_empty());
        }

        #[test]
        fn oversized_write_is_partially_consumed() {
            let buffer = CentralAudioBuffer::new(4);
            assert_eq!(buffer.write_pcm(&[0u8; 5000], 1, CD), PCM_CHUNK_SIZE);
            assert_eq!(buffer.write_pcm(&[0u8; 904], 1, CD), 904);
            assert_eq!(buffer.queued_chunks(), 1);
        }

        #[test]
        fn track_change_flushes_partial_chunk() {
            let buffer = CentralAudioBuffer::new(4);
            assert_eq!(buffer.write_pcm(&[1u8; 10], 1, CD), 10);
            assert_eq!(buffer.write_pcm(&[2u8; 10], 2, CD), 10);
            assert!(buffer.flush());

            let first = buffer.read_chunk();
            assert_eq!(first.track_hash, 1);
            assert_eq!(first.pcm_size, 10);

            let second = buffer.read_chunk();
            assert_eq!(second.track_hash, 2);
            assert_eq!(second.pcm_size, 10);
        }

        #[test]
        fn reading_updates_sample_rate() {
            let buffer = CentralAudioBuffer::new(4);
            assert_eq!(buffer.sample_rate(), 44100);

            buffer.write_pcm(&[0u8; 16], 9, AudioFormat::new(48000, 2, 16));
            buffer.flush();
            assert_eq!(buffer.sample_rate(), 44100);

            buffer.read_chunk();
            assert_eq!(buffer.sample_rate(), 48000);
        }

        #[test]
        fn flush_without_data_is_a_no_op() {
            let buffer = CentralAudioBuffer::new(1);
            assert!(buffer.flush());
            assert_eq!(buffer.queued_chunks(), 0);
        }
    }

    mod backpressure {
        use super::*;

        #[test]
        fn full_queue_rejects_write_and_keeps_open_chunk() {
            let buffer = CentralAudioBuffer::new(1);
            write_all(&buffer, &[1u8; 4096], 1);
            assert_eq!(buffer.write_pcm(&[2u8; 10], 1, CD), 10);
            assert_eq!(buffer.free_chunks(), 0);
            assert_eq!(buffer.write_pcm(&[3u8; 4086], 1, CD), 4086);

            // Open chunk is full and the queue has no room for it.
            assert_eq!(buffer.write_pcm(&[4u8; 5], 1, CD), 0);
            assert_eq!(buffer.write_pcm(&[4u8; 5], 2, CD), 0);
            assert!(!buffer.flush());

            let first = buffer.read_chunk();
            assert!(first.pcm().iter().all(|&b| b == 1));

            assert_eq!(buffer.write_pcm(&[4u8; 5], 1, CD), 5);
            let second = buffer.read_chunk();
            assert_eq!(second.pcm_size, 4096);
            assert_eq!(&second.pcm()[..10], &[2u8; 10]);
            assert!(second.pcm()[10..].iter().all(|&b| b == 3));
        }

        #[test]
        fn has_at_least_counts_whole_chunks() {
            let buffer = CentralAudioBuffer::new(4);
            for hash in 0..3 {
                write_all(&buffer, &[0u8; 100], hash);
            }
            assert!(buffer.has_at_least(2));
            assert!(!buffer.has_at_least(3));
            assert_eq!(buffer.free_chunks(), 2);
        }
    }

    mod session {
        use super::*;

        /// Queues `chunks` chunks by switching track on every write.
        fn queue_chunks(buffer: &CentralAudioBuffer, chunks: u64) {
            for hash in 0..=chunks {
                write_all(buffer, &[0u8; 64], 1000 + hash);
            }
        }

        #[test]
        fn lock_and_unlock_clear_once_per_transition() {
            let buffer = CentralAudioBuffer::new(16);
            // 44100 bytes round up to 11 serialized chunks.
            queue_chunks(&buffer, 13);
            assert_eq!(buffer.queued_chunks(), 13);

            buffer.lock_access();
            assert_eq!(buffer.session_state(), SessionState::Active);
            assert_eq!(buffer.queued_chunks(), 11);

            queue_chunks(&buffer, 2);
            assert_eq!(buffer.queued_chunks(), 14);
            buffer.lock_access();
            assert_eq!(buffer.queued_chunks(), 14);

            buffer.unlock_access();
            assert_eq!(buffer.session_state(), SessionState::Idle);
            assert_eq!(buffer.queued_chunks(), 11);

            queue_chunks(&buffer, 1);
            buffer.unlock_access();
            assert_eq!(buffer.queued_chunks(), 13);
        }

        #[test]
        fn session_guard_releases_on_drop() {
            let buffer = CentralAudioBuffer::new(2);
            {
                let session = buffer.begin_session();
                assert_eq!(session.session_state(), SessionState::Active);
                assert!(session.read_chunk().is_empty());
            }
            assert_eq!(buffer.session_state(), SessionState::Idle);
        }
    }

    #[test]
    fn producer_and_consumer_threads_preserve_order() {
        const CHUNKS: usize = 64;
        let buffer = Arc::new(CentralAudioBuffer::new(4));

        let producer = {
            let buffer = buffer.clone();
            std::thread::spawn(move || {
                for i in 0..CHUNKS {
                    let data = [i as u8; PCM_CHUNK_SIZE];
                    let mut offset = 0;
                    while offset < data.len() {
                        match buffer.write_pcm(&data[offset..], 7, CD) {
                            0 => std::thread::yield_now(),
                            n => offset += n,
                        }
                    }
                }
                while !buffer.flush() {
                    std::thread::yield_now();
                }
            })
        };

        let mut received = Vec::new();
        while received.len() < CHUNKS {
            let chunk = buffer.read_chunk();
            if chunk.is_empty() {
                std::thread::yield_now();
                continue;
            }
            assert_eq!(chunk.pcm_size as usize, PCM_CHUNK_SIZE);
            assert!(chunk.pcm().iter().all(|&b| b == chunk.pcm_data[0]));
            received.push(chunk.pcm_data[0]);
        }
        producer.join().unwrap();

        let expected: Vec<u8> = (0..CHUNKS).map(|i| i as u8).collect();
        assert_eq!(received, expected);
    }
}
