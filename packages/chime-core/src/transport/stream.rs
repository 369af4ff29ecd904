//! Buffered stream over a boxed transport.
//!
//! Adds what the HTTP engine needs on top of raw reads and writes: a
//! read-ahead buffer for line extraction, a write buffer flushed in one go,
//! and a sticky end-of-stream flag.

use std::io;
use std::sync::Arc;

use bytes::{Buf, BytesMut};

use super::{is_transient_io, Connector, Transport};
use crate::error::{TransportError, TransportResult};

/// Read size requested from the transport on each fill.
const READ_CHUNK: usize = 1024;

/// Consecutive empty reads tolerated by [`SocketStream::read_exact`].
const STALL_LIMIT: u32 = 10;

pub struct SocketStream {
    connector: Arc<dyn Connector>,
    transport: Option<Box<dyn Transport>>,
    read_buf: BytesMut,
    write_buf: BytesMut,
    eof: bool,
}

impl SocketStream {
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            transport: None,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            write_buf: BytesMut::new(),
            eof: false,
        }
    }

    /// Opens a fresh transport to `host:port`, TLS iff `secure`.
    pub fn open(&mut self, host: &str, port: u16, secure: bool) -> TransportResult<()> {
        self.close();
        let mut transport = self.connector.transport(secure);
        transport.open(host, port)?;
        self.transport = Some(transport);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| t.is_open())
    }

    /// True once the transport has reported end-of-stream.
    pub fn eof(&self) -> bool {
        self.eof
    }

    /// Bytes readable without blocking, buffered or pending in the transport.
    pub fn poll(&mut self) -> usize {
        let pending = self.transport.as_mut().map_or(0, |t| t.poll());
        self.read_buf.len() + pending
    }

    /// Closes the transport and discards buffered input and output.
    pub fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.read_buf.clear();
        self.write_buf.clear();
        self.eof = false;
    }

    /// Queues bytes for the next [`flush`](Self::flush).
    pub fn write_all(&mut self, data: &[u8]) {
        self.write_buf.extend_from_slice(data);
    }

    /// Writes all queued bytes to the transport.
    pub fn flush(&mut self) -> TransportResult<()> {
        let transport = self.transport.as_mut().ok_or(TransportError::Closed)?;
        while !self.write_buf.is_empty() {
            let written = transport.write(&self.write_buf)?;
            if written == 0 {
                return Err(io::Error::from(io::ErrorKind::WriteZero).into());
            }
            self.write_buf.advance(written);
        }
        Ok(())
    }

    /// Reads once from the transport into the read-ahead buffer.
    ///
    /// Returns 0 both at end-of-stream (setting the flag) and when a slow
    /// transport has nothing ready yet.
    fn fill(&mut self) -> TransportResult<usize> {
        let transport = self.transport.as_mut().ok_or(TransportError::Closed)?;
        let mut chunk = [0u8; READ_CHUNK];
        match transport.read(&mut chunk) {
            Ok(0) => {
                self.eof = true;
                Ok(0)
            }
            Ok(n) => {
                self.read_buf.extend_from_slice(&chunk[..n]);
                Ok(n)
            }
            Err(TransportError::Io(e)) if is_transient_io(&e) => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Extracts one line into `out`, in the manner of `istream::getline`.
    ///
    /// The `\n` delimiter is consumed and counted but not stored; its slot in
    /// `out` is zeroed. Returns the number of bytes consumed from the stream,
    /// which is 0 when nothing was available. A line longer than `out` is
    /// returned truncated to `out.len()` bytes.
    pub fn read_line(&mut self, out: &mut [u8]) -> TransportResult<usize> {
        if out.is_empty() {
            return Ok(0);
        }

        loop {
            let window = self.read_buf.len().min(out.len());
            if let Some(pos) = self.read_buf[..window].iter().position(|&b| b == b'\n') {
                out[..pos].copy_from_slice(&self.read_buf[..pos]);
                out[pos] = 0;
                self.read_buf.advance(pos + 1);
                return Ok(pos + 1);
            }

            if self.read_buf.len() >= out.len() {
                let n = out.len();
                out.copy_from_slice(&self.read_buf[..n]);
                self.read_buf.advance(n);
                return Ok(n);
            }

            if self.fill()? == 0 {
                if self.eof && !self.read_buf.is_empty() {
                    let n = self.read_buf.len();
                    out[..n].copy_from_slice(&self.read_buf);
                    self.read_buf.clear();
                    return Ok(n);
                }
                return Ok(0);
            }
        }
    }

    /// Fills `buf` completely from buffered and transport bytes.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> TransportResult<()> {
        let mut filled = 0;
        let mut stalls = 0;
        while filled < buf.len() {
            if self.read_buf.is_empty() && self.fill()? == 0 {
                if self.eof {
                    return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
                }
                stalls += 1;
                if stalls >= STALL_LIMIT {
                    return Err(io::Error::from(io::ErrorKind::TimedOut).into());
                }
                continue;
            }
            stalls = 0;
            let n = self.read_buf.len().min(buf.len() - filled);
            buf[filled..filled + n].copy_from_slice(&self.read_buf[..n]);
            self.read_buf.advance(n);
            filled += n;
        }
        Ok(())
    }
}

impl io::Read for SocketStream {
    /// Streams body bytes; `WouldBlock`/`TimedOut` signal a slow peer.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.read_buf.is_empty() {
            let transport = self
                .transport
                .as_mut()
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;
            return match transport.read(buf) {
                Ok(0) => {
                    self.eof = true;
                    Ok(0)
                }
                Ok(n) => Ok(n),
                Err(TransportError::Io(e)) => Err(e),
                Err(e) => Err(io::Error::other(e)),
            };
        }

        let n = self.read_buf.len().min(buf.len());
        buf[..n].copy_from_slice(&self.read_buf[..n]);
        self.read_buf.advance(n);
        Ok(n)
    }
}

impl Drop for SocketStream {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;
    use crate::transport::test_support::{MockConnector, Session, Step};

    fn stream_with(reads: Vec<Step>) -> (SocketStream, Arc<MockConnector>) {
        let connector = Arc::new(MockConnector::new(vec![Session::reads(reads)]));
        let mut stream = SocketStream::new(connector.clone());
        stream.open("example.com", 80, false).unwrap();
        (stream, connector)
    }

    #[test]
    fn read_line_strips_delimiter_and_reports_consumed() {
        let (mut stream, _) = stream_with(vec![Step::data(b"HTTP/1.1 200 OK\r\nX: y\r\n")]);
        let mut out = [0xAAu8; 64];

        let n = stream.read_line(&mut out).unwrap();
        assert_eq!(n, 17);
        assert_eq!(&out[..15], b"HTTP/1.1 200 OK");
        assert_eq!(out[15], b'\r');
        assert_eq!(out[16], 0);

        let n = stream.read_line(&mut out).unwrap();
        assert_eq!(n, 6);
        assert_eq!(&out[..4], b"X: y");
    }

    #[test]
    fn read_line_joins_split_reads() {
        let (mut stream, _) = stream_with(vec![Step::data(b"Content-"), Step::data(b"Length: 5\r\n")]);
        let mut out = [0u8; 64];
        assert_eq!(stream.read_line(&mut out).unwrap(), 19);
        assert_eq!(&out[..17], b"Content-Length: 5");
    }

    #[test]
    fn read_line_truncates_to_output_size() {
        let (mut stream, _) = stream_with(vec![Step::data(b"abcdefgh\n")]);
        let mut out = [0u8; 4];
        assert_eq!(stream.read_line(&mut out).unwrap(), 4);
        assert_eq!(&out, b"abcd");
    }

    #[test]
    fn stall_returns_zero_without_eof() {
        let (mut stream, _) = stream_with(vec![Step::Stall]);
        let mut out = [0u8; 16];
        assert_eq!(stream.read_line(&mut out).unwrap(), 0);
        assert!(!stream.eof());
        assert_eq!(stream.read_line(&mut out).unwrap(), 0);
        assert!(stream.eof());
    }

    #[test]
    fn read_exact_drains_buffer_then_transport() {
        let (mut stream, _) = stream_with(vec![Step::data(b"line\nHEL"), Step::data(b"LO")]);
        let mut line = [0u8; 16];
        stream.read_line(&mut line).unwrap();

        let mut body = [0u8; 5];
        stream.read_exact(&mut body).unwrap();
        assert_eq!(&body, b"HELLO");
    }

    #[test]
    fn read_exact_fails_on_early_eof() {
        let (mut stream, _) = stream_with(vec![Step::data(b"HE")]);
        let mut body = [0u8; 5];
        let err = stream.read_exact(&mut body).unwrap_err();
        assert!(matches!(err, TransportError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn flush_sends_queued_bytes_once() {
        let (mut stream, connector) = stream_with(vec![]);
        stream.write_all(b"GET / HTTP/1.1\r\n");
        stream.write_all(b"\r\n");
        stream.flush().unwrap();
        stream.flush().unwrap();
        assert_eq!(connector.written(0), b"GET / HTTP/1.1\r\n\r\n");
    }

    #[test]
    fn io_read_serves_buffered_bytes_first() {
        let (mut stream, _) = stream_with(vec![Step::data(b"x\nabc"), Step::data(b"def")]);
        let mut line = [0u8; 8];
        stream.read_line(&mut line).unwrap();

        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"abcdef");
        assert!(stream.eof());
    }

    #[test]
    fn flush_on_closed_stream_fails() {
        let connector = Arc::new(MockConnector::new(vec![]));
        let mut stream = SocketStream::new(connector);
        stream.write_all(b"x");
        assert!(matches!(stream.flush(), Err(TransportError::Closed)));
    }
}
