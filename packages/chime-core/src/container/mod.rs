//! Bitstream framers that split a byte source into codec samples.

pub mod aac;

pub use aac::AacContainer;

use crate::audio::AudioFormat;

/// Result of asking a framer for its next sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome<'a> {
    /// One complete frame, valid until the next call.
    Sample(&'a [u8]),
    /// Not enough bytes buffered yet. Try again once the source has more.
    NeedMoreData,
    /// No frame boundary was found; buffered bytes were dropped to resync.
    Desynced,
}

/// A framer over a sequential byte source.
pub trait AudioContainer {
    /// Extracts the next frame.
    fn read_sample(&mut self) -> SampleOutcome<'_>;

    /// Stream format. Fixed at construction for formats with implicit parameters.
    fn format(&self) -> AudioFormat;

    /// True once the source has ended and no buffered bytes remain.
    fn is_finished(&self) -> bool;
}
