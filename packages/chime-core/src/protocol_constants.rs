//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by external formats (HTTP/1.1, ADTS) or by the
//! serialized chunk layout shared between producer and consumer threads.

// ─────────────────────────────────────────────────────────────────────────────
// HTTP
// ─────────────────────────────────────────────────────────────────────────────

/// Marker that starts every HTTP/1.x status line.
///
/// Bytes preceding this marker in the header buffer are discarded before parsing.
pub const HTTP_STATUS_MARKER: &[u8] = b"HTTP/";

/// Line terminator for request and response heads.
pub const CRLF: &[u8] = b"\r\n";

/// Default capacity of the response header buffer (bytes).
pub const DEFAULT_HEADER_BUFFER_SIZE: usize = 1024;

/// Default maximum number of response headers.
pub const DEFAULT_MAX_HEADERS: usize = 32;

/// Default limit for bodies buffered whole by the response engine (bytes).
pub const DEFAULT_MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

/// Default per-response reconnect budget.
pub const DEFAULT_RECONNECT_BUDGET: u32 = 3;

/// Short retries while waiting for a slow transport to deliver header bytes.
pub const DEFAULT_READ_RETRY_LIMIT: u32 = 10;

/// Sleep between short read retries and before reconnecting (milliseconds).
pub const DEFAULT_RETRY_DELAY_MS: u64 = 10;

// ─────────────────────────────────────────────────────────────────────────────
// TLS
// ─────────────────────────────────────────────────────────────────────────────

/// Maximum TLS handshake attempts on transient negotiation signals.
pub const TLS_HANDSHAKE_ATTEMPTS: u32 = 5;

/// Delay between TLS handshake attempts (milliseconds).
pub const TLS_HANDSHAKE_RETRY_DELAY_MS: u64 = 10;

// ─────────────────────────────────────────────────────────────────────────────
// AAC (ADTS)
// ─────────────────────────────────────────────────────────────────────────────

/// Largest AAC frame the framer expects to see (bytes).
///
/// Two stereo channels of 6144 bits each.
pub const AAC_MAX_FRAME_SIZE: usize = 1536;

/// Bytes skipped past a sync marker before searching for the next one.
pub const AAC_SYNC_WORD_LEN: usize = 4;

// ─────────────────────────────────────────────────────────────────────────────
// Central audio buffer
// ─────────────────────────────────────────────────────────────────────────────

/// PCM payload capacity of a single audio chunk (bytes).
pub const PCM_CHUNK_SIZE: usize = 4096;

/// Default number of chunks the backing queue can hold.
pub const DEFAULT_BUFFER_CHUNKS: usize = 32;

/// Default audio sample rate (Hz).
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Default number of audio channels (stereo).
pub const DEFAULT_CHANNELS: u8 = 2;

/// Default PCM bit depth.
pub const DEFAULT_BIT_DEPTH: u8 = 16;
