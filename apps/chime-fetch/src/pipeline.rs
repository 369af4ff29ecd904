//! Producer/consumer wiring between a body stream and an output sink.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use chime_core::{AacContainer, AudioContainer, CentralAudioBuffer, SampleOutcome};

/// Consecutive empty polls tolerated before a stalled source is abandoned.
const STALL_LIMIT: u32 = 200;

/// Sleep between polls of a slow source or an empty buffer.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProducerStats {
    pub frames: u64,
    pub bytes: u64,
    pub resyncs: u64,
    pub stalled: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerStats {
    pub chunks: u64,
    pub bytes: u64,
}

fn is_slow(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

/// Copies a body verbatim, riding out read timeouts up to the stall limit.
pub fn copy_body<R: Read, W: Write>(mut source: R, out: &mut W) -> io::Result<u64> {
    let mut buf = [0u8; 8192];
    let mut total = 0u64;
    let mut stalls = 0;

    loop {
        match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                out.write_all(&buf[..n])?;
                total += n as u64;
                stalls = 0;
            }
            Err(e) if is_slow(&e) && stalls < STALL_LIMIT => {
                stalls += 1;
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => return Err(e),
        }
    }

    out.flush()?;
    Ok(total)
}

/// Frames AAC from `source` and pushes every frame into `buffer` under `track_hash`.
///
/// Waits out backpressure. Flushes the open chunk when the source ends so
/// the tail of the track becomes readable.
pub fn produce<R: Read>(source: R, buffer: &CentralAudioBuffer, track_hash: u64) -> ProducerStats {
    let mut container = AacContainer::new(source);
    let format = container.format();
    let mut stats = ProducerStats::default();
    let mut stalls = 0;

    loop {
        match container.read_sample() {
            SampleOutcome::Sample(frame) => {
                let mut offset = 0;
                while offset < frame.len() {
                    match buffer.write_pcm(&frame[offset..], track_hash, format) {
                        0 => thread::sleep(POLL_INTERVAL),
                        n => offset += n,
                    }
                }
                stats.frames += 1;
                stats.bytes += frame.len() as u64;
                stalls = 0;
            }
            SampleOutcome::Desynced => {}
            SampleOutcome::NeedMoreData => {
                if container.is_finished() {
                    break;
                }
                stalls += 1;
                if stalls >= STALL_LIMIT {
                    log::warn!("Source stalled, giving up after {} polls", stalls);
                    stats.stalled = true;
                    break;
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
    }

    while !buffer.flush() {
        thread::sleep(POLL_INTERVAL);
    }

    stats.resyncs = container.resync_count();
    stats
}

/// Drains whole chunks into `out` until `done` is set and the buffer is empty.
pub fn consume<W: Write>(buffer: &CentralAudioBuffer, done: &AtomicBool, out: &mut W) -> io::Result<ConsumerStats> {
    let mut stats = ConsumerStats::default();
    let mut last_track = None;

    loop {
        // Sample `done` before reading so a final flush is never missed.
        let finished = done.load(Ordering::Acquire);
        let chunk = buffer.read_chunk();

        if chunk.is_empty() {
            if finished {
                break;
            }
            thread::sleep(POLL_INTERVAL);
            continue;
        }

        if last_track != Some(chunk.track_hash) {
            log::info!(
                "Track {:016x}: {} Hz, {} ch, {} bit",
                chunk.track_hash,
                chunk.sample_rate,
                chunk.channels,
                chunk.bit_depth
            );
            last_track = Some(chunk.track_hash);
        }

        out.write_all(chunk.pcm())?;
        stats.chunks += 1;
        stats.bytes += chunk.pcm().len() as u64;
    }

    out.flush()?;
    Ok(stats)
}
