//! Serialized PCM chunk layout.

use std::fmt;

use bytemuck::{Pod, Zeroable};

use super::AudioFormat;
use crate::protocol_constants::PCM_CHUNK_SIZE;

/// One schedulable unit of PCM, tagged with its track and format.
///
/// The struct is its own wire format: chunks are copied byte-for-byte into
/// the backing queue and read back the same way, so the layout is `repr(C)`
/// with explicit padding.
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct AudioChunk {
    /// Identity of the track this PCM belongs to.
    pub track_hash: u64,
    pub sample_rate: u32,
    /// Valid bytes in `pcm_data`.
    pub pcm_size: u32,
    pub channels: u8,
    pub bit_depth: u8,
    _pad: [u8; 6],
    pub pcm_data: [u8; PCM_CHUNK_SIZE],
}

/// Size of one serialized [`AudioChunk`] in the backing queue.
pub const CHUNK_BYTES: usize = std::mem::size_of::<AudioChunk>();

impl AudioChunk {
    /// An empty chunk opened for `track_hash`.
    pub fn new(track_hash: u64, format: AudioFormat) -> Self {
        Self {
            track_hash,
            sample_rate: format.sample_rate,
            channels: format.channels,
            bit_depth: format.bit_depth,
            ..Self::zeroed()
        }
    }

    /// The empty-read sentinel returned when no chunk is queued.
    pub fn empty() -> Self {
        Self::zeroed()
    }

    pub fn format(&self) -> AudioFormat {
        AudioFormat::new(self.sample_rate, self.channels, self.bit_depth)
    }

    /// Valid PCM bytes.
    pub fn pcm(&self) -> &[u8] {
        &self.pcm_data[..(self.pcm_size as usize).min(PCM_CHUNK_SIZE)]
    }

    pub fn is_empty(&self) -> bool {
        self.pcm_size == 0
    }

    pub fn is_full(&self) -> bool {
        self.pcm_size as usize >= PCM_CHUNK_SIZE
    }

    /// Copies as much of `data` as fits, returning the bytes consumed.
    pub fn append(&mut self, data: &[u8]) -> usize {
        let start = (self.pcm_size as usize).min(PCM_CHUNK_SIZE);
        let n = data.len().min(PCM_CHUNK_SIZE - start);
        self.pcm_data[start..start + n].copy_from_slice(&data[..n]);
        self.pcm_size += n as u32;
        n
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::bytes_of_mut(self)
    }
}

impl fmt::Debug for AudioChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioChunk")
            .field("track_hash", &self.track_hash)
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("bit_depth", &self.bit_depth)
            .field("pcm_size", &self.pcm_size)
            .finish_non_exhaustive()
    }
}
