//! Centralized error types for the Chime core library.
//!
//! Transport failures and HTTP engine failures are kept as separate enums so
//! the engine can decide per kind whether to reconnect, close, or surface.
//! Flow-control outcomes (audio buffer backpressure, framer desync) are not
//! errors and never appear here.

use thiserror::Error;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// logging and reporting paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised by a byte-stream transport (plain socket or TLS wrapper).
#[derive(Debug, Error)]
pub enum TransportError {
    /// Underlying socket I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation attempted on a transport that is not open.
    #[error("transport is closed")]
    Closed,

    /// TLS negotiation failed with a non-transient error.
    #[error("TLS handshake failed: {0}")]
    Handshake(String),

    /// TLS negotiation kept reporting transient signals past the retry limit.
    #[error("TLS handshake retries exhausted")]
    HandshakeRetriesExhausted,

    /// Host cannot be used as a TLS server name.
    #[error("invalid TLS server name: {0}")]
    InvalidServerName(String),

    /// TLS record layer error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),
}

/// Convenient Result alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

impl ErrorCode for TransportError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "transport_io",
            Self::Closed => "transport_closed",
            Self::Handshake(_) => "tls_handshake_failed",
            Self::HandshakeRetriesExhausted => "tls_handshake_exhausted",
            Self::InvalidServerName(_) => "tls_invalid_server_name",
            Self::Tls(_) => "tls_error",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP
// ─────────────────────────────────────────────────────────────────────────────

/// Which half of a header entry failed a bounds check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderPart {
    Name,
    Value,
}

impl std::fmt::Display for HeaderPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name => f.write_str("name"),
            Self::Value => f.write_str("value"),
        }
    }
}

/// Errors produced by the HTTP response engine.
#[derive(Debug, Error)]
pub enum HttpError {
    /// URL could not be parsed or uses an unsupported scheme. Never retried.
    #[error("invalid URL: {0}")]
    UrlParse(String),

    /// Connect, handshake, read or write failure on the transport.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Response head is malformed.
    #[error("cannot parse HTTP response")]
    Parse,

    /// Stream ended before a complete response head arrived.
    #[error("end of stream reached before response head")]
    Eof,

    /// No bytes arrived within the short retry budget.
    #[error("response stalled: no data after retries")]
    BufferExhausted,

    /// Response head filled the header buffer without completing.
    #[error("response head too large for header buffer")]
    ResponseTooLarge,

    /// Declared body length exceeds the in-memory body limit.
    #[error("body of {size} bytes exceeds limit of {limit} bytes")]
    BodyTooLarge { size: usize, limit: usize },

    /// Parser reported a header span outside the filled header buffer.
    #[error("header {index} {part} out of bounds")]
    HeaderOutOfBounds { index: usize, part: HeaderPart },

    /// Fewer than two bytes were buffered when restoring the line terminator.
    #[error("insufficient space to restore CRLF")]
    LineTooShort,

    /// The per-response reconnect budget is spent.
    #[error("reconnect budget exhausted")]
    RetriesExhausted,

    /// Request attempted before `connect`.
    #[error("not connected")]
    NotConnected,
}

/// Convenient Result alias for HTTP operations.
pub type HttpResult<T> = Result<T, HttpError>;

impl HttpError {
    /// Numeric code for callers that branch on failure class.
    ///
    /// - 1: URL parse failure
    /// - 2: transport (connect) failure
    /// - 3: reconnect budget exhausted
    /// - 4: anything else (unexpected)
    #[must_use]
    pub fn status(&self) -> i32 {
        match self {
            Self::UrlParse(_) => 1,
            Self::Transport(_) => 2,
            Self::RetriesExhausted => 3,
            _ => 4,
        }
    }

    /// Returns true if the engine should reconnect and replay the request.
    ///
    /// Bounds and capacity violations are never retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Parse | Self::Transport(_))
    }

    /// Returns true if the stream is finished and the transport should be closed.
    #[must_use]
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::Eof | Self::BufferExhausted)
    }
}

impl ErrorCode for HttpError {
    fn code(&self) -> &'static str {
        match self {
            Self::UrlParse(_) => "url_parse_error",
            Self::Transport(e) => e.code(),
            Self::Parse => "http_parse_error",
            Self::Eof => "eof",
            Self::BufferExhausted => "buffer_exhausted",
            Self::ResponseTooLarge => "response_too_large",
            Self::BodyTooLarge { .. } => "body_too_large",
            Self::HeaderOutOfBounds { .. } => "header_out_of_bounds",
            Self::LineTooShort => "line_too_short",
            Self::RetriesExhausted => "retries_exhausted",
            Self::NotConnected => "not_connected",
        }
    }
}

impl From<std::io::Error> for HttpError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(TransportError::Io(err))
    }
}
