//! PCM buffering between a decode producer and a playback consumer.

pub mod central;
pub mod chunk;
pub mod queue;

pub use central::{CentralAudioBuffer, PlaybackSession};
pub use chunk::{AudioChunk, CHUNK_BYTES};
pub use queue::{ByteQueue, CircularBuffer};

use crate::protocol_constants::{DEFAULT_BIT_DEPTH, DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE};

/// PCM format carried alongside every chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u8,
    pub bit_depth: u8,
}

impl AudioFormat {
    pub fn new(sample_rate: u32, channels: u8, bit_depth: u8) -> Self {
        Self {
            sample_rate,
            channels,
            bit_depth,
        }
    }

    /// Returns bytes per sample (e.g., 2 for 16-bit audio).
    #[inline]
    pub const fn bytes_per_sample(&self) -> usize {
        (self.bit_depth as usize).div_ceil(8)
    }

    /// PCM bytes per second of audio, saturating on absurd formats.
    #[inline]
    pub fn bytes_per_second(&self) -> usize {
        (self.sample_rate as usize)
            .saturating_mul(self.channels as usize)
            .saturating_mul(self.bytes_per_sample())
    }

    /// Playback duration of `bytes` of PCM in milliseconds.
    pub fn duration_ms(&self, bytes: usize) -> u64 {
        match self.bytes_per_second() {
            0 => 0,
            rate => (bytes as u64).saturating_mul(1000) / rate as u64,
        }
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            bit_depth: DEFAULT_BIT_DEPTH,
        }
    }
}
