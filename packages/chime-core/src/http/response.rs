//! HTTP response engine.
//!
//! A [`Response`] owns one transport and one fixed-capacity header buffer.
//! It writes a request, then reads the response head line by line into the
//! buffer, re-running the incremental parser after each line. The body is
//! left on the stream so callers can either read it whole ([`Response::body`])
//! or stream it ([`Response::stream`]).
//!
//! Retry policy lives here: write failures, malformed heads and transport
//! errors trigger a reconnect and a full replay of the request, bounded by a
//! per-response reconnect budget. End-of-stream closes the transport without
//! retrying. Capacity and bounds violations are surfaced immediately.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};

use super::headers::{content_range_total, find_header, Header, Headers};
use super::parsed_url::ParsedUrl;
use super::parser::{parse_response, HeaderSpan, ParseStatus};
use crate::config::HttpConfig;
use crate::error::{ErrorCode, HeaderPart, HttpError, HttpResult};
use crate::protocol_constants::{CRLF, HTTP_STATUS_MARKER};
use crate::transport::{Connector, NetConnector, SocketStream};

/// Serializes a request head and body.
///
/// Writes the request line, `Host`, `Connection: keep-alive`, `Accept`, a
/// `Content-Length` when `body` is non-empty, the caller's headers in order,
/// a blank line, and the body.
pub fn encode_request(target: &ParsedUrl, method: &str, body: &[u8], headers: &[Header]) -> BytesMut {
    let mut request = BytesMut::with_capacity(256 + body.len());
    let mut line = |text: String| {
        request.put_slice(text.as_bytes());
        request.put_slice(CRLF);
    };

    line(format!("{} {} HTTP/1.1", method, target.path));
    line(format!("Host: {}", target.authority()));
    line("Connection: keep-alive".to_string());
    line("Accept: */*".to_string());
    if !body.is_empty() {
        line(format!("Content-Length: {}", body.len()));
    }
    for (name, value) in headers {
        line(format!("{}: {}", name, value));
    }

    request.put_slice(CRLF);
    request.put_slice(body);
    request
}

/// Copies parser-reported header spans out of the header buffer.
///
/// Every span must end inside the filled region `buf[..filled]`; a span that
/// does not is reported as [`HttpError::HeaderOutOfBounds`] before any bytes
/// are read from it.
pub fn materialize_headers(buf: &[u8], filled: usize, spans: &[HeaderSpan]) -> HttpResult<Headers> {
    let limit = filled.min(buf.len());
    let checked = |index: usize, part: HeaderPart, range: &std::ops::Range<usize>| {
        if range.start > range.end || range.end > limit {
            Err(HttpError::HeaderOutOfBounds { index, part })
        } else {
            Ok(String::from_utf8_lossy(&buf[range.clone()]).into_owned())
        }
    };

    spans
        .iter()
        .enumerate()
        .map(|(index, span)| {
            Ok((
                checked(index, HeaderPart::Name, &span.name)?,
                checked(index, HeaderPart::Value, &span.value)?,
            ))
        })
        .collect()
}

fn find_marker(haystack: &[u8], marker: &[u8]) -> Option<usize> {
    haystack.windows(marker.len()).position(|w| w == marker)
}

/// One request/response exchange over a reconnectable transport.
pub struct Response {
    config: HttpConfig,
    target: Option<ParsedUrl>,
    stream: SocketStream,

    header_buf: Vec<u8>,
    filled: usize,
    max_headers: usize,
    header_spans: Vec<HeaderSpan>,

    status: u16,
    headers: Headers,
    content_size: Option<usize>,
    raw_body: Option<Bytes>,

    reconnects_left: u32,
}

impl Response {
    /// Creates an unconnected response using `connector` for transports.
    pub fn new(config: HttpConfig, connector: Arc<dyn Connector>) -> Self {
        let max_headers = config.max_headers;
        Self {
            header_buf: vec![0; config.header_buffer_size],
            filled: 0,
            max_headers,
            header_spans: Vec::with_capacity(max_headers),
            reconnects_left: config.reconnect_budget,
            target: None,
            stream: SocketStream::new(connector),
            status: 0,
            headers: Headers::new(),
            content_size: None,
            raw_body: None,
            config,
        }
    }

    /// Creates an unconnected response opening real sockets.
    pub fn with_config(config: HttpConfig) -> Self {
        let connector = NetConnector::arc(&config);
        Self::new(config, connector)
    }

    /// Parses `url` and opens a transport to its host, TLS iff `https`.
    ///
    /// Header storage is resized to `max_headers`.
    ///
    /// # Errors
    /// [`HttpError::UrlParse`] for a malformed URL (status 1) and
    /// [`HttpError::Transport`] when the connection fails (status 2).
    pub fn connect(&mut self, url: &str, max_headers: usize) -> HttpResult<()> {
        let target = ParsedUrl::parse(url).inspect_err(|e| {
            log::error!("[HTTP] Error while parsing URL: {}", e);
        })?;

        self.max_headers = max_headers;
        self.header_spans = Vec::with_capacity(max_headers);

        log::debug!(
            "[HTTP] Connecting to {}:{} (tls={})",
            target.host,
            target.port,
            target.is_secure()
        );
        let result = self.stream.open(&target.host, target.port, target.is_secure());
        self.target = Some(target);

        result.map_err(|e| {
            log::error!("[HTTP] Stream operation failed while connecting: {}", e);
            HttpError::from(e)
        })
    }

    /// Closes and reopens the transport to the last target.
    ///
    /// Each call spends one unit of the reconnect budget, which is never
    /// replenished for this response.
    ///
    /// # Errors
    /// [`HttpError::RetriesExhausted`] (status 3) once the budget is spent,
    /// otherwise the transport error from reopening.
    pub fn reconnect(&mut self) -> HttpResult<()> {
        if self.reconnects_left == 0 {
            log::warn!("[HTTP] Reconnect budget exhausted");
            return Err(HttpError::RetriesExhausted);
        }
        self.reconnects_left -= 1;

        let target = self.target.clone().ok_or(HttpError::NotConnected)?;

        if self.stream.is_open() {
            let _ = self.stream.flush();
            self.stream.close();
        }
        std::thread::sleep(Duration::from_millis(self.config.reconnect_delay_ms));

        log::info!(
            "[HTTP] Reconnecting to {}:{} ({} attempts left)",
            target.host,
            target.port,
            self.reconnects_left
        );
        self.stream
            .open(&target.host, target.port, target.is_secure())
            .map_err(|e| {
                log::error!("[HTTP] Stream operation failed while reconnecting: {}", e);
                HttpError::from(e)
            })
    }

    /// Remaining reconnect attempts.
    pub fn reconnects_left(&self) -> u32 {
        self.reconnects_left
    }

    /// Sends a request and reads the response head.
    ///
    /// The whole request is replayed after a successful reconnect when the
    /// write fails or the response is malformed, until the reconnect budget
    /// runs out.
    pub fn raw_request(&mut self, url: &str, method: &str, body: &[u8], headers: &[Header]) -> HttpResult<()> {
        let target = ParsedUrl::parse(url)?;
        self.target = Some(target.clone());

        loop {
            self.reset_response();

            let request = encode_request(&target, method, body, headers);
            self.stream.write_all(&request);
            if let Err(e) = self.stream.flush() {
                log::error!("[HTTP] Stream operation failed while sending request: {}", e);
                self.reconnect()?;
                continue;
            }

            match self.read_response_headers() {
                Ok(()) => return Ok(()),
                Err(e) if e.is_end_of_stream() => {
                    log::error!("[HTTP] Response ended early: {}", e);
                    let _ = self.stream.flush();
                    self.stream.close();
                    return Err(e);
                }
                Err(e) if e.is_retryable() => {
                    log::error!("[HTTP] Error while receiving response: {}", e);
                    self.reconnect()?;
                }
                Err(e) => {
                    log::error!("[HTTP] Response rejected ({}): {}", e.code(), e);
                    return Err(e);
                }
            }
        }
    }

    /// Issues a `GET` request.
    pub fn get(&mut self, url: &str, headers: &[Header]) -> HttpResult<()> {
        self.raw_request(url, "GET", &[], headers)
    }

    /// Issues a `POST` request with `body`.
    pub fn post(&mut self, url: &str, headers: &[Header], body: &[u8]) -> HttpResult<()> {
        self.raw_request(url, "POST", body, headers)
    }

    fn reset_response(&mut self) {
        self.filled = 0;
        self.status = 0;
        self.headers.clear();
        self.header_spans.clear();
        self.content_size = None;
        self.raw_body = None;
    }

    fn read_response_headers(&mut self) -> HttpResult<()> {
        let capacity = self.header_buf.len();
        let mut retries = 0;
        let mut found_start = false;
        self.filled = 0;

        let head = loop {
            let read = self.stream.read_line(&mut self.header_buf[self.filled..])?;

            if read > 0 {
                let mut prev_len = self.filled;
                self.filled += read;

                if !found_start {
                    if let Some(offset) = find_marker(&self.header_buf[..self.filled], HTTP_STATUS_MARKER) {
                        if offset > 0 {
                            log::debug!("[HTTP] Discarding {} stray bytes before status line", offset);
                            self.header_buf.copy_within(offset..self.filled, 0);
                            self.filled -= offset;
                        }
                        prev_len = 0;
                        found_start = true;
                    }
                }

                if found_start {
                    if self.filled < 2 {
                        return Err(HttpError::LineTooShort);
                    }
                    let end = self.filled;
                    self.header_buf[end - 2..end].copy_from_slice(CRLF);

                    match parse_response(
                        &self.header_buf[..self.filled],
                        prev_len,
                        self.max_headers,
                        &mut self.header_spans,
                    ) {
                        ParseStatus::Complete(head) => break head,
                        ParseStatus::Invalid => return Err(HttpError::Parse),
                        ParseStatus::Partial => {}
                    }
                }
            } else if self.stream.eof() {
                return Err(HttpError::Eof);
            } else if retries < self.config.read_retry_limit && self.stream.is_open() {
                log::debug!("[HTTP] No response data yet, waiting...");
                std::thread::sleep(Duration::from_millis(self.config.read_retry_delay_ms));
                retries += 1;
            } else {
                return Err(HttpError::BufferExhausted);
            }

            if self.filled >= capacity {
                log::debug!(
                    "[HTTP] Raw response so far:\n{}",
                    String::from_utf8_lossy(&self.header_buf[..self.filled])
                );
                return Err(HttpError::ResponseTooLarge);
            }
        };

        self.status = head.status;
        self.headers = materialize_headers(&self.header_buf, self.filled, &self.header_spans)?;

        let length = self.header("content-length").trim().to_owned();
        if !length.is_empty() {
            let parsed = length.parse().ok();
            if parsed.is_none() {
                log::warn!("[HTTP] Ignoring unparseable Content-Length '{}'", length);
            }
            self.content_size = parsed;
        }

        log::debug!(
            "[HTTP] Response {} with {} headers, content length {:?}",
            self.status,
            self.headers.len(),
            self.content_size
        );
        Ok(())
    }

    /// Status code of the last parsed response (0 before any response).
    pub fn status(&self) -> u16 {
        self.status
    }

    /// All response headers in the order received.
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// Case-insensitive header lookup. Returns `""` when absent.
    pub fn header(&self, name: &str) -> &str {
        find_header(&self.headers, name)
    }

    /// Declared body length, 0 when unknown.
    pub fn content_length(&self) -> usize {
        self.content_size.unwrap_or(0)
    }

    /// Total resource size from `Content-Range`, falling back to the body length.
    pub fn total_length(&self) -> usize {
        content_range_total(self.header("content-range")).unwrap_or_else(|| self.content_length())
    }

    fn read_raw_body(&mut self) -> HttpResult<()> {
        let size = self.content_length();
        if size > 0 && self.raw_body.is_none() {
            if size > self.config.max_body_size {
                log::warn!(
                    "[HTTP] Refusing to buffer {} byte body (limit {})",
                    size,
                    self.config.max_body_size
                );
                return Err(HttpError::BodyTooLarge {
                    size,
                    limit: self.config.max_body_size,
                });
            }
            let mut body = vec![0u8; size];
            self.stream.read_exact(&mut body)?;
            self.raw_body = Some(Bytes::from(body));
        }
        Ok(())
    }

    /// Body as text, read from the transport on first use.
    ///
    /// Nothing is read when the content length is unknown or zero. Bodies
    /// larger than `max_body_size` are refused; use [`Response::stream`].
    pub fn body(&mut self) -> HttpResult<Cow<'_, str>> {
        self.read_raw_body()?;
        Ok(String::from_utf8_lossy(self.raw_body.as_deref().unwrap_or_default()))
    }

    /// Body as bytes, read from the transport on first use.
    pub fn bytes(&mut self) -> HttpResult<Bytes> {
        self.read_raw_body()?;
        Ok(self.raw_body.clone().unwrap_or_default())
    }

    /// The underlying stream, positioned at the start of the body.
    pub fn stream(&mut self) -> &mut SocketStream {
        &mut self.stream
    }
}
