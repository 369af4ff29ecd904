//! TLS transport built on rustls.
//!
//! The TCP connection is opened exactly like [`PlainSocket`](super::PlainSocket),
//! then wrapped in a rustls client session. The handshake tolerates a small
//! number of transient negotiation signals before giving up.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, ClientConnection, DigitallySignedStruct, SignatureScheme, StreamOwned};

use super::{is_transient_io, PlainSocket, SocketOptions, Transport};
use crate::error::{TransportError, TransportResult};
use crate::protocol_constants::{TLS_HANDSHAKE_ATTEMPTS, TLS_HANDSHAKE_RETRY_DELAY_MS};

/// Builds the shared rustls client configuration.
///
/// With `verify` set, certificates are checked against the bundled Mozilla
/// root store. Without it, any certificate is accepted (embedded targets
/// that ship without a trust store).
pub fn client_config(verify: bool) -> Arc<ClientConfig> {
    if verify {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Arc::new(
            ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth(),
        )
    } else {
        log::warn!("[TLS] Certificate verification disabled");
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        Arc::new(
            ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate(provider)))
                .with_no_client_auth(),
        )
    }
}

/// TLS client session over a blocking TCP stream.
pub struct TlsSocket {
    config: Arc<ClientConfig>,
    options: SocketOptions,
    session: Option<StreamOwned<ClientConnection, TcpStream>>,
}

impl TlsSocket {
    #[must_use]
    pub fn new(config: Arc<ClientConfig>, options: SocketOptions) -> Self {
        Self {
            config,
            options,
            session: None,
        }
    }

    fn session_mut(&mut self) -> TransportResult<&mut StreamOwned<ClientConnection, TcpStream>> {
        self.session.as_mut().ok_or(TransportError::Closed)
    }
}

/// Drives the handshake to completion, retrying transient signals.
fn handshake(conn: &mut ClientConnection, tcp: &mut TcpStream) -> TransportResult<()> {
    let mut attempts = 0;
    while conn.is_handshaking() {
        match conn.complete_io(tcp) {
            Ok(_) => {}
            Err(e) if is_transient_io(&e) => {
                attempts += 1;
                if attempts >= TLS_HANDSHAKE_ATTEMPTS {
                    log::error!("[TLS] Handshake retry limit reached");
                    return Err(TransportError::HandshakeRetriesExhausted);
                }
                log::debug!(
                    "[TLS] Handshake pending (attempt {}/{}): {}",
                    attempts,
                    TLS_HANDSHAKE_ATTEMPTS,
                    e
                );
                std::thread::sleep(Duration::from_millis(TLS_HANDSHAKE_RETRY_DELAY_MS));
            }
            Err(e) => {
                log::error!("[TLS] Handshake failed: {}", e);
                return Err(TransportError::Handshake(e.to_string()));
            }
        }
    }
    Ok(())
}

impl Transport for TlsSocket {
    fn open(&mut self, host: &str, port: u16) -> TransportResult<()> {
        self.close();

        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| TransportError::InvalidServerName(host.to_string()))?;
        let mut tcp = PlainSocket::connect(host, port, self.options)?;
        let mut conn = ClientConnection::new(self.config.clone(), server_name)?;

        handshake(&mut conn, &mut tcp)?;
        log::debug!(
            "[TLS] Session established with {}:{} ({:?})",
            host,
            port,
            conn.protocol_version()
        );

        self.session = Some(StreamOwned::new(conn, tcp));
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        let result = self.session_mut()?.read(buf);
        match result {
            Ok(n) => Ok(n),
            // Peer closed without close_notify; report end-of-stream.
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(0),
            Err(e) if is_transient_io(&e) => Err(e.into()),
            Err(e) => {
                log::error!("[TLS] Read error: {}", e);
                self.close();
                Err(e.into())
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> TransportResult<usize> {
        let result = self.session_mut()?.write(buf);
        match result {
            Ok(n) => Ok(n),
            Err(e) => {
                log::error!("[TLS] Write error: {}", e);
                self.close();
                Err(e.into())
            }
        }
    }

    fn poll(&mut self) -> usize {
        self.session
            .as_mut()
            .and_then(|s| s.conn.process_new_packets().ok())
            .map_or(0, |state| state.plaintext_bytes_to_read())
    }

    fn is_open(&self) -> bool {
        self.session.is_some()
    }

    fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.conn.send_close_notify();
            let _ = session.conn.write_tls(&mut session.sock);
            let _ = session.sock.shutdown(std::net::Shutdown::Both);
        }
    }
}

impl Drop for TlsSocket {
    fn drop(&mut self) {
        self.close();
    }
}

/// Verifier that accepts any server certificate but still checks handshake signatures.
#[derive(Debug)]
struct AcceptAnyCertificate(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
