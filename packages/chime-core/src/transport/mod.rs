//! Byte-stream transports consumed by the HTTP response engine.
//!
//! A [`Transport`] is a duplex byte channel to one peer. Plain TCP
//! ([`PlainSocket`]) and TLS ([`TlsSocket`]) satisfy the same contract, so the
//! engine never branches on the scheme beyond asking its [`Connector`] for
//! the right kind. [`SocketStream`] layers buffering, line reads and an
//! end-of-stream flag on top of any transport.

pub mod plain;
pub mod stream;
#[cfg(test)]
pub(crate) mod test_support;
pub mod tls;

pub use plain::PlainSocket;
pub use stream::SocketStream;
pub use tls::TlsSocket;

use std::sync::Arc;
use std::time::Duration;

use crate::config::HttpConfig;
use crate::error::TransportResult;

/// Duplex byte channel to a single peer.
///
/// `read` returning `Ok(0)` means the peer closed the stream. Timeouts surface
/// as `TransportError::Io` with `WouldBlock` or `TimedOut` kinds and are
/// treated as "no data yet" by [`SocketStream`].
pub trait Transport: Send {
    /// Connects to `host:port`, replacing any previous connection.
    fn open(&mut self, host: &str, port: u16) -> TransportResult<()>;

    /// Reads up to `buf.len()` bytes.
    fn read(&mut self, buf: &mut [u8]) -> TransportResult<usize>;

    /// Writes up to `buf.len()` bytes, returning how many were accepted.
    fn write(&mut self, buf: &[u8]) -> TransportResult<usize>;

    /// Bytes that can be read without blocking.
    fn poll(&mut self) -> usize;

    fn is_open(&self) -> bool;

    /// Closes the channel. Idempotent.
    fn close(&mut self);
}

/// Factory for transports, chosen by whether the scheme needs encryption.
///
/// Injected into the response engine so tests can script peers without
/// opening sockets.
pub trait Connector: Send + Sync {
    fn transport(&self, secure: bool) -> Box<dyn Transport>;
}

/// Socket options shared by plain and TLS transports.
#[derive(Debug, Clone, Copy)]
pub struct SocketOptions {
    pub connect_timeout: Duration,
    pub read_timeout: Option<Duration>,
}

impl From<&HttpConfig> for SocketOptions {
    fn from(config: &HttpConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
        }
    }
}

/// Default connector opening real TCP or TLS connections.
pub struct NetConnector {
    options: SocketOptions,
    tls: Arc<rustls::ClientConfig>,
}

impl NetConnector {
    /// Creates a connector from HTTP configuration.
    #[must_use]
    pub fn new(config: &HttpConfig) -> Self {
        Self {
            options: SocketOptions::from(config),
            tls: tls::client_config(config.verify_tls),
        }
    }

    /// Convenience constructor returning a shareable connector.
    #[must_use]
    pub fn arc(config: &HttpConfig) -> Arc<dyn Connector> {
        Arc::new(Self::new(config))
    }
}

impl Connector for NetConnector {
    fn transport(&self, secure: bool) -> Box<dyn Transport> {
        if secure {
            Box::new(TlsSocket::new(self.tls.clone(), self.options))
        } else {
            Box::new(PlainSocket::new(self.options))
        }
    }
}

/// Returns true for I/O error kinds that mean "no data yet" rather than failure.
pub(crate) fn is_transient_io(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::WouldBlock
            | std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::Interrupted
    )
}
