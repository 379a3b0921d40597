//! Line-oriented transport over plain TCP or implicit TLS
//!
//! [`open_stream`] resolves, connects, and (for [`Security::Tls`]) runs
//! the TLS handshake. [`Transport`] adds CRLF line framing on top of any
//! duplex stream, which lets tests substitute `tokio::io::duplex`.

use crate::config::{Pop3Config, Security};
use crate::error::{Error, Result};
use rustls::RootCertStore;
use rustls::pki_types::ServerName;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tracing::{debug, trace, warn};

/// Any byte stream a session can run over.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send + fmt::Debug {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + fmt::Debug> AsyncStream for T {}

/// Type-erased plain or TLS stream.
pub type BoxedStream = Box<dyn AsyncStream>;

/// Open a connected stream to `config.host:config.port`.
///
/// Resolution failures map to [`Error::HostUnresolved`], an expired
/// `connect_timeout` to [`Error::ConnectTimeout`], and a failed handshake
/// to [`Error::Tls`]. Nothing is retried.
pub async fn open_stream(config: &Pop3Config) -> Result<BoxedStream> {
    let address = config.address();
    let addrs = resolve(config).await?;
    debug!("Connecting to {} ({} candidate address(es))", address, addrs.len());

    let tcp = timeout(config.connect_timeout, connect_any(&addrs))
        .await
        .map_err(|_| Error::ConnectTimeout(address.clone()))??;

    match config.security {
        Security::Plain => Ok(Box::new(tcp)),
        Security::Tls => {
            let connector = tls_connector(config.accept_invalid_certs)?;
            let server_name = ServerName::try_from(config.host.clone())
                .map_err(|e| Error::Tls(format!("Invalid server name: {e}")))?;
            let tls = connector
                .connect(server_name, tcp)
                .await
                .map_err(|e| Error::Tls(format!("Handshake with {address} failed: {e}")))?;
            debug!("TLS handshake with {} complete", address);
            Ok(Box::new(tls))
        }
    }
}

async fn resolve(config: &Pop3Config) -> Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((config.host.as_str(), config.port))
        .await
        .map_err(|e| Error::HostUnresolved(format!("{}: {e}", config.host)))?
        .collect();

    if addrs.is_empty() {
        return Err(Error::HostUnresolved(config.host.clone()));
    }
    Ok(addrs)
}

async fn connect_any(addrs: &[SocketAddr]) -> Result<TcpStream> {
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("Connect to {} failed: {}", addr, e);
                last_err = Some(e);
            }
        }
    }
    Err(last_err.map_or(Error::StreamClosed, Error::Io))
}

/// Build a TLS connector on the ring provider.
///
/// Certificates are checked against the webpki roots unless
/// `accept_invalid_certs` is set.
fn tls_connector(accept_invalid_certs: bool) -> Result<TlsConnector> {
    let builder =
        rustls::ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::Tls(e.to_string()))?;

    let config = if accept_invalid_certs {
        warn!("TLS certificate validation disabled");
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
            .with_no_client_auth()
    } else {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        builder.with_root_certificates(roots).with_no_client_auth()
    };

    Ok(TlsConnector::from(Arc::new(config)))
}

/// CRLF-framed line I/O over a duplex stream.
#[derive(Debug)]
pub struct Transport<S> {
    stream: BufReader<S>,
}

impl Transport<BoxedStream> {
    /// Open a stream per `config` and wrap it.
    pub async fn connect(config: &Pop3Config) -> Result<Self> {
        Ok(Self::new(open_stream(config).await?))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> Transport<S> {
    #[must_use]
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }

    /// Send one line followed by CRLF and flush.
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        let writer = self.stream.get_mut();
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\r\n").await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read one line with its `\n` / `\r\n` terminator removed.
    ///
    /// End of stream before any byte is [`Error::StreamClosed`].
    pub async fn read_line(&mut self) -> Result<String> {
        let mut buf = Vec::with_capacity(256);
        self.stream.read_until(b'\n', &mut buf).await?;

        if buf.is_empty() {
            return Err(Error::StreamClosed);
        }

        let decoded = String::from_utf8_lossy(&buf);
        let text: &str = &decoded;
        let line = text.strip_suffix('\n').unwrap_or(text);
        let line = line.strip_suffix('\r').unwrap_or(line);
        trace!("Received: {}", line);
        Ok(line.to_string())
    }

    /// Shut down the write half and release the stream.
    pub async fn close(&mut self) -> Result<()> {
        self.stream.get_mut().shutdown().await?;
        Ok(())
    }
}

/// Certificate verifier that accepts all certificates
/// (for servers with self-signed certs).
#[derive(Debug)]
struct AcceptAnyCertificate;

impl rustls::client::danger::ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
