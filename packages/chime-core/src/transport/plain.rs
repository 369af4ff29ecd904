//! Plain TCP transport.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};

use socket2::{Domain, Protocol, Socket, Type};

use super::{SocketOptions, Transport};
use crate::error::{TransportError, TransportResult};

/// Blocking TCP socket configured through socket2.
pub struct PlainSocket {
    stream: Option<TcpStream>,
    options: SocketOptions,
}

impl PlainSocket {
    #[must_use]
    pub fn new(options: SocketOptions) -> Self {
        Self {
            stream: None,
            options,
        }
    }

    /// Connects a raw TCP stream, trying each resolved address in turn.
    pub(crate) fn connect(
        host: &str,
        port: u16,
        options: SocketOptions,
    ) -> TransportResult<TcpStream> {
        let mut last_error = None;
        for addr in (host, port).to_socket_addrs()? {
            match Self::connect_addr(addr, options) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    log::debug!("[Socket] Connect to {} failed: {}", addr, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .map(TransportError::Io)
            .unwrap_or_else(|| {
                TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no addresses resolved for {}", host),
                ))
            }))
    }

    fn connect_addr(addr: SocketAddr, options: SocketOptions) -> std::io::Result<TcpStream> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;

        if let Err(e) = socket.set_keepalive(true) {
            log::warn!("[Socket] Failed to enable keepalive: {}", e);
        }

        socket.connect_timeout(&addr.into(), options.connect_timeout)?;
        socket.set_read_timeout(options.read_timeout)?;

        let stream: TcpStream = socket.into();
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    fn stream_mut(&mut self) -> TransportResult<&mut TcpStream> {
        self.stream.as_mut().ok_or(TransportError::Closed)
    }
}

impl Transport for PlainSocket {
    fn open(&mut self, host: &str, port: u16) -> TransportResult<()> {
        self.close();
        let stream = Self::connect(host, port, self.options)?;
        log::debug!("[Socket] Connected to {}:{}", host, port);
        self.stream = Some(stream);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        Ok(self.stream_mut()?.read(buf)?)
    }

    fn write(&mut self, buf: &[u8]) -> TransportResult<usize> {
        Ok(self.stream_mut()?.write(buf)?)
    }

    fn poll(&mut self) -> usize {
        let Some(stream) = self.stream.as_ref() else {
            return 0;
        };

        let mut peeked = [0u8; 4096];
        if stream.set_nonblocking(true).is_err() {
            return 0;
        }
        let available = stream.peek(&mut peeked).unwrap_or(0);
        let _ = stream.set_nonblocking(false);
        available
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
    }
}

impl Drop for PlainSocket {
    fn drop(&mut self) {
        self.close();
    }
}
