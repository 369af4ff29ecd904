//! Chime Core - shared library for the Chime audio streaming client.
//!
//! This crate fetches encoded audio over plain or encrypted HTTP, splits it
//! into codec frames, and buffers decoded PCM between a producer thread and
//! a playback thread. Everything here is synchronous: the HTTP engine and the
//! framer block on the producer thread, the consumer drains the central
//! buffer at its own pace.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`transport`]: Plain TCP and TLS byte streams behind one trait
//! - [`http`]: Incremental response parsing with bounded reconnects
//! - [`container`]: Frame-sync framers (AAC/ADTS)
//! - [`audio`]: Track-tagged PCM chunks and the central audio buffer
//! - [`identity`]: Session identity provider
//! - [`config`]: Tunables, deserializable from YAML
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! Seams that callers and tests can swap out:
//!
//! - [`Transport`](transport::Transport) / [`Connector`](transport::Connector): Byte channel and its factory
//! - [`AudioContainer`](container::AudioContainer): Framer over a byte source
//! - [`ByteQueue`](audio::ByteQueue): Bounded SPSC byte FIFO behind the audio buffer
//! - [`SessionIdentity`](identity::SessionIdentity): Random identifiers
//!
//! Each trait has a default implementation used by the `chime-fetch` binary.

#![warn(clippy::all)]

pub mod audio;
pub mod config;
pub mod container;
pub mod error;
pub mod http;
pub mod identity;
pub mod protocol_constants;
pub mod transport;

// Re-export commonly used types at the crate root
pub use audio::{AudioChunk, AudioFormat, ByteQueue, CentralAudioBuffer, CircularBuffer, PlaybackSession};
pub use config::{BufferConfig, CoreConfig, HttpConfig};
pub use container::{AacContainer, AudioContainer, SampleOutcome};
pub use error::{ErrorCode, HttpError, HttpResult, TransportError, TransportResult};
pub use http::{HttpClient, ParsedUrl, RangeHeader, Response};
pub use identity::{track_hash, RandomIdentity, SessionIdentity};
pub use transport::{Connector, NetConnector, SocketStream, Transport};
