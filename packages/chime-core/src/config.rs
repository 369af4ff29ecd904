//! Tunable configuration for the core library.
//!
//! All structs deserialize with `#[serde(default)]`, so partial YAML files
//! only need to name the values they change.

use std::time::Duration;

use serde::Deserialize;

use crate::protocol_constants::{
    DEFAULT_BUFFER_CHUNKS, DEFAULT_HEADER_BUFFER_SIZE, DEFAULT_MAX_BODY_SIZE,
    DEFAULT_MAX_HEADERS, DEFAULT_READ_RETRY_LIMIT, DEFAULT_RECONNECT_BUDGET, DEFAULT_RETRY_DELAY_MS,
};

/// HTTP response engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Capacity of the response header buffer (bytes).
    pub header_buffer_size: usize,

    /// Maximum number of headers accepted in a response.
    pub max_headers: usize,

    /// Largest body `Response::body`/`bytes` will buffer in memory (bytes).
    pub max_body_size: usize,

    /// Reconnect attempts allowed per response object.
    pub reconnect_budget: u32,

    /// Sleep before reopening the transport on reconnect (milliseconds).
    pub reconnect_delay_ms: u64,

    /// Short retries while the transport has no header bytes ready.
    pub read_retry_limit: u32,

    /// Sleep between short read retries (milliseconds).
    pub read_retry_delay_ms: u64,

    /// TCP connect timeout (milliseconds).
    pub connect_timeout_ms: u64,

    /// Socket read timeout (milliseconds, 0 = block indefinitely).
    pub read_timeout_ms: u64,

    /// Verify TLS server certificates against the bundled root store.
    pub verify_tls: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            header_buffer_size: DEFAULT_HEADER_BUFFER_SIZE,
            max_headers: DEFAULT_MAX_HEADERS,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            reconnect_budget: DEFAULT_RECONNECT_BUDGET,
            reconnect_delay_ms: DEFAULT_RETRY_DELAY_MS,
            read_retry_limit: DEFAULT_READ_RETRY_LIMIT,
            read_retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            connect_timeout_ms: 5000,
            read_timeout_ms: 2000,
            verify_tls: true,
        }
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns `None` when reads should block indefinitely.
    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_ms > 0).then(|| Duration::from_millis(self.read_timeout_ms))
    }
}

/// Central audio buffer configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Number of serialized chunks the backing queue can hold.
    pub chunks: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            chunks: DEFAULT_BUFFER_CHUNKS,
        }
    }
}

/// Top-level core configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub http: HttpConfig,
    pub buffer: BufferConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: CoreConfig = serde_yaml::from_str("http:\n  reconnect_budget: 7\n").unwrap();
        assert_eq!(config.http.reconnect_budget, 7);
        assert_eq!(config.http.header_buffer_size, DEFAULT_HEADER_BUFFER_SIZE);
        assert_eq!(config.buffer.chunks, DEFAULT_BUFFER_CHUNKS);
    }

    #[test]
    fn zero_read_timeout_means_blocking() {
        let config = HttpConfig {
            read_timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.read_timeout(), None);
    }
}
