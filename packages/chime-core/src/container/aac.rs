//! AAC elementary-stream (ADTS) framer.
//!
//! Frames are delimited by the 12-bit ADTS sync word `0xFFF`. A frame is
//! everything from one sync word up to the next, so a frame is only emitted
//! once the sync word of the following frame is buffered.
//!
//! Recovery is lossy: if no sync word (or no second one) is found in the
//! working buffer, the whole buffer is dropped and the call reports
//! [`SampleOutcome::Desynced`]. This bounds both memory and rescanning on
//! corrupt or mid-stream input.

use std::io::{self, Read};

use super::{AudioContainer, SampleOutcome};
use crate::audio::AudioFormat;
use crate::protocol_constants::{AAC_MAX_FRAME_SIZE, AAC_SYNC_WORD_LEN};

/// Offset of the first ADTS sync word in `buf`.
fn find_sync_word(buf: &[u8]) -> Option<usize> {
    buf.windows(2)
        .position(|w| w[0] == 0xFF && w[1] & 0xF0 == 0xF0)
}

pub struct AacContainer<R> {
    source: R,
    buffer: Box<[u8]>,
    filled: usize,
    /// Start of unconsumed data, compacted away on the next call.
    pending: usize,
    max_frame_size: usize,
    source_eof: bool,
    resyncs: u64,
}

impl<R: Read> AacContainer<R> {
    pub fn new(source: R) -> Self {
        Self::with_max_frame_size(source, AAC_MAX_FRAME_SIZE)
    }

    /// Framer tuned for streams whose frames never exceed `max_frame_size`.
    ///
    /// Reads are attempted until two maximum-size frames are buffered.
    pub fn with_max_frame_size(source: R, max_frame_size: usize) -> Self {
        let max_frame_size = max_frame_size.max(AAC_SYNC_WORD_LEN);
        Self {
            source,
            buffer: vec![0u8; max_frame_size * 4].into_boxed_slice(),
            filled: 0,
            pending: 0,
            max_frame_size,
            source_eof: false,
            resyncs: 0,
        }
    }

    /// Number of times buffered bytes were dropped to resynchronize.
    pub fn resync_count(&self) -> u64 {
        self.resyncs
    }

    fn compact(&mut self) {
        if self.pending > 0 {
            self.buffer.copy_within(self.pending..self.filled, 0);
            self.filled -= self.pending;
            self.pending = 0;
        }
    }

    /// Tops up the working buffer. Returns whether enough bytes are buffered
    /// to look for a frame.
    fn fill(&mut self) -> bool {
        let threshold = self.max_frame_size * 2;

        while self.filled < threshold && !self.source_eof {
            match self.source.read(&mut self.buffer[self.filled..]) {
                Ok(0) => {
                    log::debug!("[AAC] Source ended with {} bytes buffered", self.filled);
                    self.source_eof = true;
                }
                Ok(n) => self.filled += n,
                Err(e) if is_slow_source(&e) => break,
                Err(e) => {
                    log::warn!("[AAC] Source read failed, treating as end of stream: {}", e);
                    self.source_eof = true;
                }
            }
        }

        self.filled >= threshold || (self.source_eof && self.filled > 0)
    }

    fn discard(&mut self, reason: &str) -> SampleOutcome<'_> {
        log::debug!("[AAC] {}, dropping {} buffered bytes", reason, self.filled);
        self.filled = 0;
        self.pending = 0;
        self.resyncs += 1;
        SampleOutcome::Desynced
    }
}

fn is_slow_source(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

impl<R: Read> AudioContainer for AacContainer<R> {
    fn read_sample(&mut self) -> SampleOutcome<'_> {
        self.compact();

        if !self.fill() {
            return SampleOutcome::NeedMoreData;
        }

        let Some(start) = find_sync_word(&self.buffer[..self.filled]) else {
            return self.discard("No sync word");
        };

        let search_from = start + AAC_SYNC_WORD_LEN;
        let next = self
            .buffer
            .get(search_from..self.filled)
            .and_then(find_sync_word);
        let Some(next) = next else {
            return self.discard("No following sync word");
        };

        let end = search_from + next;
        self.pending = end;
        SampleOutcome::Sample(&self.buffer[start..end])
    }

    fn format(&self) -> AudioFormat {
        AudioFormat::default()
    }

    fn is_finished(&self) -> bool {
        self.source_eof && self.filled <= self.pending
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use super::*;

    const SYNC: [u8; 4] = [0xFF, 0xF1, 0x50, 0x80];

    fn frame(payload: &[u8]) -> Vec<u8> {
        let mut out = SYNC.to_vec();
        out.extend_from_slice(payload);
        out
    }

    fn sample(outcome: SampleOutcome<'_>) -> Vec<u8> {
        match outcome {
            SampleOutcome::Sample(bytes) => bytes.to_vec(),
            other => panic!("expected a sample, got {:?}", other),
        }
    }

    /// `[garbage][sync A][payload A][sync B][payload B][sync]`
    fn framed_stream() -> Vec<u8> {
        let mut stream = vec![0x00, 0x12, 0x34];
        stream.extend(frame(b"payloadA"));
        stream.extend(frame(b"payloadB"));
        stream.extend(SYNC);
        stream
    }

    #[test]
    fn yields_consecutive_frames_after_garbage() {
        let mut container = AacContainer::with_max_frame_size(Cursor::new(framed_stream()), 8);

        assert_eq!(sample(container.read_sample()), frame(b"payloadA"));
        assert_eq!(sample(container.read_sample()), frame(b"payloadB"));
        assert_eq!(container.resync_count(), 0);

        // Only a lone sync word remains.
        assert_eq!(container.read_sample(), SampleOutcome::Desynced);
        assert!(container.is_finished());
        assert_eq!(container.read_sample(), SampleOutcome::NeedMoreData);
    }

    #[test]
    fn garbage_only_stream_is_discarded() {
        let garbage = vec![0x11u8; 64];
        let mut container = AacContainer::with_max_frame_size(Cursor::new(garbage), 8);

        assert_eq!(container.read_sample(), SampleOutcome::Desynced);
        assert_eq!(container.resync_count(), 1);
        assert_eq!(container.filled, 0);
    }

    #[test]
    fn single_sync_in_full_window_is_discarded() {
        let mut stream = frame(&[0x22; 40]);
        stream.extend(frame(b"next"));
        let mut container = AacContainer::with_max_frame_size(Cursor::new(stream), 8);

        // The window holds 32 bytes: one sync word and no second one.
        assert_eq!(container.read_sample(), SampleOutcome::Desynced);
        assert_eq!(container.filled, 0);
    }

    #[test]
    fn default_format_is_cd_quality() {
        let container = AacContainer::new(Cursor::new(Vec::new()));
        assert_eq!(container.format(), AudioFormat::new(44100, 2, 16));
    }

    #[test]
    fn empty_source_needs_more_data() {
        let mut container = AacContainer::new(Cursor::new(Vec::new()));
        assert_eq!(container.read_sample(), SampleOutcome::NeedMoreData);
        assert!(container.is_finished());
    }

    /// Delivers its script one read at a time, reporting a timeout in between.
    struct SlowSource {
        reads: Vec<Option<Vec<u8>>>,
    }

    impl Read for SlowSource {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.reads.is_empty() {
                return Ok(0);
            }
            match self.reads.remove(0) {
                Some(bytes) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                None => Err(io::Error::from(io::ErrorKind::WouldBlock)),
            }
        }
    }

    #[test]
    fn slow_source_keeps_buffered_bytes() {
        let stream = framed_stream();
        let (head, tail) = stream.split_at(6);
        let source = SlowSource {
            reads: vec![Some(head.to_vec()), None, Some(tail.to_vec())],
        };
        let mut container = AacContainer::with_max_frame_size(source, 8);

        assert_eq!(container.read_sample(), SampleOutcome::NeedMoreData);
        assert_eq!(container.resync_count(), 0);
        assert_eq!(sample(container.read_sample()), frame(b"payloadA"));
    }

    #[test]
    fn frames_a_file_on_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let frames: Vec<Vec<u8>> = (0u8..20).map(|i| frame(&[i; 100])).collect();
        for f in &frames {
            file.write_all(f).unwrap();
        }
        file.write_all(&SYNC).unwrap();
        file.flush().unwrap();

        let source = std::fs::File::open(file.path()).unwrap();
        let mut container = AacContainer::with_max_frame_size(source, 256);

        let mut framed = Vec::new();
        while !container.is_finished() {
            match container.read_sample() {
                SampleOutcome::Sample(bytes) => framed.push(bytes.to_vec()),
                SampleOutcome::NeedMoreData => break,
                SampleOutcome::Desynced => {}
            }
        }
        assert_eq!(framed, frames);
    }
}
