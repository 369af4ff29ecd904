//! Scripted transports for exercising the HTTP engine without sockets.
//!
//! A [`MockConnector`] holds a queue of [`Session`] scripts. Every call to
//! `Transport::open` consumes the next script: it either refuses the
//! connection or replays its read steps, then reports end-of-stream.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Connector, Transport};
use crate::error::{TransportError, TransportResult};

/// One scripted transport read.
#[derive(Debug, Clone)]
pub enum Step {
    /// Deliver these bytes (split if the caller's buffer is smaller).
    Data(Vec<u8>),
    /// Report a read timeout.
    Stall,
    /// Fail with a connection reset.
    Fail,
}

impl Step {
    pub fn data(bytes: &[u8]) -> Self {
        Self::Data(bytes.to_vec())
    }
}

/// Script for one connection attempt.
#[derive(Debug, Clone)]
pub struct Session {
    refuse: bool,
    fail_writes: bool,
    reads: Vec<Step>,
}

impl Session {
    pub fn reads(reads: Vec<Step>) -> Self {
        Self {
            refuse: false,
            fail_writes: false,
            reads,
        }
    }

    /// A single response delivered in one read.
    pub fn respond(bytes: &[u8]) -> Self {
        Self::reads(vec![Step::data(bytes)])
    }

    /// Connection attempt that fails in `open`.
    pub fn refuse() -> Self {
        Self {
            refuse: true,
            fail_writes: false,
            reads: Vec::new(),
        }
    }

    /// Connection that opens but rejects every write.
    pub fn broken_pipe() -> Self {
        Self {
            refuse: false,
            fail_writes: true,
            reads: Vec::new(),
        }
    }
}

#[derive(Default)]
struct Shared {
    sessions: VecDeque<Session>,
    opens: usize,
    secure: Vec<bool>,
    written: Vec<Vec<u8>>,
}

/// Connector replaying scripted sessions in order.
pub struct MockConnector {
    shared: Arc<Mutex<Shared>>,
}

impl MockConnector {
    pub fn new(sessions: Vec<Session>) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                sessions: sessions.into(),
                ..Default::default()
            })),
        }
    }

    /// Number of `open` calls observed, successful or not.
    pub fn opens(&self) -> usize {
        self.shared.lock().opens
    }

    /// Whether each requested transport was TLS.
    pub fn secure_flags(&self) -> Vec<bool> {
        self.shared.lock().secure.clone()
    }

    /// Bytes written during the `index`-th successful session.
    pub fn written(&self, index: usize) -> Vec<u8> {
        self.shared
            .lock()
            .written
            .get(index)
            .cloned()
            .unwrap_or_default()
    }
}

impl Connector for MockConnector {
    fn transport(&self, secure: bool) -> Box<dyn Transport> {
        self.shared.lock().secure.push(secure);
        Box::new(MockTransport {
            shared: self.shared.clone(),
            current: None,
        })
    }
}

struct Active {
    reads: VecDeque<Step>,
    fail_writes: bool,
    index: usize,
}

struct MockTransport {
    shared: Arc<Mutex<Shared>>,
    current: Option<Active>,
}

impl Transport for MockTransport {
    fn open(&mut self, _host: &str, _port: u16) -> TransportResult<()> {
        let mut shared = self.shared.lock();
        shared.opens += 1;
        let session = shared.sessions.pop_front();
        match session {
            Some(session) if !session.refuse => {
                shared.written.push(Vec::new());
                self.current = Some(Active {
                    reads: session.reads.into(),
                    fail_writes: session.fail_writes,
                    index: shared.written.len() - 1,
                });
                Ok(())
            }
            _ => {
                self.current = None;
                Err(std::io::Error::from(std::io::ErrorKind::ConnectionRefused).into())
            }
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        let active = self.current.as_mut().ok_or(TransportError::Closed)?;
        match active.reads.pop_front() {
            None => Ok(0),
            Some(Step::Stall) => Err(std::io::Error::from(std::io::ErrorKind::WouldBlock).into()),
            Some(Step::Fail) => {
                Err(std::io::Error::from(std::io::ErrorKind::ConnectionReset).into())
            }
            Some(Step::Data(mut bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    active.reads.push_front(Step::Data(bytes.split_off(n)));
                }
                Ok(n)
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> TransportResult<usize> {
        let active = self.current.as_ref().ok_or(TransportError::Closed)?;
        if active.fail_writes {
            return Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe).into());
        }
        let index = active.index;
        self.shared.lock().written[index].extend_from_slice(buf);
        Ok(buf.len())
    }

    fn poll(&mut self) -> usize {
        match self.current.as_ref().and_then(|a| a.reads.front()) {
            Some(Step::Data(bytes)) => bytes.len(),
            _ => 0,
        }
    }

    fn is_open(&self) -> bool {
        self.current.is_some()
    }

    fn close(&mut self) {
        self.current = None;
    }
}
