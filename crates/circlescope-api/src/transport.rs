// Transport plumbing for both channels to the dashboard server.
//
// `TransportConfig` builds the reqwest client used for REST snapshots and
// the rustls config used for `wss://`.
// `Transport` / `Link` abstract the live stream socket so the stream
// client can run against tokio-tungstenite in production and a scripted
// in-memory transport in tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder, Message};
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;

// ── HTTP transport ──────────────────────────────────────────────────

/// TLS verification mode (api-level mirror of core's TlsVerification).
#[derive(Debug, Clone)]
pub enum TlsMode {
    /// Use the system certificate store.
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (self-signed line PCs).
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(10),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("circlescope/", env!("CARGO_PKG_VERSION")));

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}

// ── Stream transport seam ───────────────────────────────────────────

/// One open duplex text connection.
///
/// Owned exclusively by the stream client's background task; never
/// handed out to callers.
pub trait Link: Send {
    /// Wait for the next text message.
    ///
    /// `Ok(None)` means the connection ended cleanly (close frame or EOF).
    fn recv(&mut self) -> BoxFuture<'_, Result<Option<String>, Error>>;

    /// Transmit one text message.
    fn send(&mut self, text: String) -> BoxFuture<'_, Result<(), Error>>;

    /// Close the connection from our side.
    fn close(&mut self) -> BoxFuture<'_, Result<(), Error>>;
}

/// Opens [`Link`]s to a stream endpoint.
pub trait Transport: Send + Sync + 'static {
    fn open<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<Box<dyn Link>, Error>>;
}

// ── tokio-tungstenite implementation ────────────────────────────────

/// Production transport backed by tokio-tungstenite.
///
/// `wss://` follows the same [`TlsMode`] as the REST client; the default
/// uses the bundled web PKI roots.
#[derive(Debug, Clone, Default)]
pub struct WsTransport {
    tls: Option<Arc<ClientConfig>>,
}

impl WsTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            tls: rustls_config(&config.tls)?,
        })
    }
}

impl Transport for WsTransport {
    fn open<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<Box<dyn Link>, Error>> {
        Box::pin(async move {
            let uri: tungstenite::http::Uri = url.as_str().parse().map_err(
                |e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()),
            )?;
            let request = ClientRequestBuilder::new(uri);

            let connected = match &self.tls {
                Some(tls) => {
                    tokio_tungstenite::connect_async_tls_with_config(
                        request,
                        None,
                        false,
                        Some(Connector::Rustls(Arc::clone(tls))),
                    )
                    .await
                }
                None => tokio_tungstenite::connect_async(request).await,
            };
            let (stream, _response) =
                connected.map_err(|e| Error::WebSocketConnect(e.to_string()))?;

            Ok(Box::new(WsLink { stream }) as Box<dyn Link>)
        })
    }
}

// ── Stream TLS ──────────────────────────────────────────────────────

/// rustls client config for `mode`; `None` keeps tungstenite's default.
fn rustls_config(mode: &TlsMode) -> Result<Option<Arc<ClientConfig>>, Error> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(format!("unsupported TLS configuration: {e}")))?;

    let config = match mode {
        TlsMode::System => return Ok(None),
        TlsMode::CustomCa(path) => builder
            .with_root_certificates(load_roots(path)?)
            .with_no_client_auth(),
        TlsMode::DangerAcceptInvalid => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate(provider)))
            .with_no_client_auth(),
    };
    Ok(Some(Arc::new(config)))
}

fn load_roots(path: &Path) -> Result<RootCertStore, Error> {
    let mut roots = RootCertStore::empty();
    let certs = CertificateDer::pem_file_iter(path)
        .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
    for cert in certs {
        let cert = cert.map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
        roots
            .add(cert)
            .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
    }
    if roots.is_empty() {
        return Err(Error::Tls(format!(
            "no certificates found in {}",
            path.display()
        )));
    }
    Ok(roots)
}

/// Skips chain and name checks; handshake signatures are still verified.
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
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

struct WsLink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Link for WsLink {
    fn recv(&mut self) -> BoxFuture<'_, Result<Option<String>, Error>> {
        Box::pin(async move {
            loop {
                match self.stream.next().await {
                    Some(Ok(Message::Text(text))) => return Ok(Some(text.as_str().to_owned())),
                    Some(Ok(Message::Ping(_))) => {
                        // tungstenite queues the pong reply itself
                        trace!("WebSocket ping");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        return match frame {
                            Some(cf) if cf.code != CloseCode::Normal => {
                                Err(Error::WebSocketClosed {
                                    code: u16::from(cf.code),
                                    reason: cf.reason.as_str().to_owned(),
                                })
                            }
                            _ => {
                                debug!("WebSocket close frame received");
                                Ok(None)
                            }
                        };
                    }
                    Some(Ok(_)) => {
                        // Binary, Pong, Frame -- ignore
                    }
                    Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
                    None => return Ok(None),
                }
            }
        })
    }

    fn send(&mut self, text: String) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async move {
            self.stream
                .send(Message::Text(text.into()))
                .await
                .map_err(|e| Error::Send(e.to_string()))
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async move {
            self.stream
                .close(None)
                .await
                .map_err(|e| Error::Send(e.to_string()))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_transport_config() {
        let config = TransportConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(matches!(config.tls, TlsMode::System));
    }

    #[test]
    fn missing_ca_cert_is_a_tls_error() {
        let config = TransportConfig {
            tls: TlsMode::CustomCa(PathBuf::from("/nonexistent/ca.pem")),
            timeout: Duration::from_secs(1),
        };
        let err = config.build_client().unwrap_err();
        assert!(matches!(err, Error::Tls(_)), "unexpected error: {err}");

        let err = WsTransport::new(&config).unwrap_err();
        assert!(matches!(err, Error::Tls(_)), "unexpected error: {err}");
    }

    #[test]
    fn stream_tls_follows_the_rest_mode() {
        let system = WsTransport::new(&TransportConfig::default()).unwrap();
        assert!(system.tls.is_none());

        let insecure = WsTransport::new(&TransportConfig {
            tls: TlsMode::DangerAcceptInvalid,
            timeout: Duration::from_secs(1),
        })
        .unwrap();
        assert!(insecure.tls.is_some());
    }

    #[test]
    fn ca_file_without_certificates_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.pem");
        std::fs::write(&path, "not a certificate\n").unwrap();

        let err = WsTransport::new(&TransportConfig {
            tls: TlsMode::CustomCa(path),
            timeout: Duration::from_secs(1),
        })
        .unwrap_err();
        assert!(err.to_string().contains("no certificates"), "unexpected error: {err}");
    }
}
