// TLS transport: rustls client session over a blocking TCP stream
use crate::traits::{not_connected, Transport};
use once_cell::sync::OnceCell;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, ClientConnection, DigitallySignedStruct, RootCertStore, SignatureScheme, StreamOwned};
use std::io::{Error, ErrorKind, Read, Result, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;

/// TLS settings.
///
/// `accept_invalid_certs` defaults to `true`: EXL servers ship with a
/// self-signed certificate, so the default session accepts any certificate
/// the server presents. Set it to `false` to verify against the Mozilla root
/// store instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlsOptions {
    pub accept_invalid_certs: bool,
}

impl Default for TlsOptions {
    fn default() -> Self {
        TlsOptions {
            accept_invalid_certs: true,
        }
    }
}

impl TlsOptions {
    pub fn verified() -> Self {
        TlsOptions {
            accept_invalid_certs: false,
        }
    }
}

// Client configs are immutable and shared by every session
static UNVERIFIED_CONFIG: OnceCell<Arc<ClientConfig>> = OnceCell::new();
static VERIFIED_CONFIG: OnceCell<Arc<ClientConfig>> = OnceCell::new();

fn tls_error(e: rustls::Error) -> Error {
    Error::new(ErrorKind::InvalidData, e)
}

pub(crate) fn client_config(options: TlsOptions) -> Result<Arc<ClientConfig>> {
    let cell = if options.accept_invalid_certs {
        &UNVERIFIED_CONFIG
    } else {
        &VERIFIED_CONFIG
    };
    cell.get_or_try_init(|| build_config(options)).cloned()
}

fn build_config(options: TlsOptions) -> Result<Arc<ClientConfig>> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(tls_error)?;

    let config = if options.accept_invalid_certs {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate { provider }))
            .with_no_client_auth()
    } else {
        let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        builder.with_root_certificates(roots).with_no_client_auth()
    };
    Ok(Arc::new(config))
}

// Skips chain and hostname checks; handshake signatures are still verified.
#[derive(Debug)]
struct AcceptAnyCertificate {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}

pub struct TlsTransport {
    host: String,
    port: u16,
    options: TlsOptions,
    stream: Option<StreamOwned<ClientConnection, TcpStream>>,
}

impl TlsTransport {
    pub fn new(host: &str, port: u16, options: TlsOptions) -> Self {
        TlsTransport {
            host: host.to_string(),
            port,
            options,
            stream: None,
        }
    }

    pub fn options(&self) -> TlsOptions {
        self.options
    }
}

impl Transport for TlsTransport {
    fn connect(&mut self) -> Result<()> {
        let config = client_config(self.options)?;
        let server_name = ServerName::try_from(self.host.clone())
            .map_err(|e| Error::new(ErrorKind::InvalidInput, e))?;

        if self.options.accept_invalid_certs {
            tracing::warn!(host = %self.host, port = self.port, "TLS certificate verification is disabled");
        }

        let tcp = TcpStream::connect((self.host.as_str(), self.port))?;
        tcp.set_nodelay(true)?;
        let conn = ClientConnection::new(config, server_name).map_err(tls_error)?;
        let mut stream = StreamOwned::new(conn, tcp);

        // Finish the handshake here so certificate and protocol failures
        // surface from connect rather than from the first request.
        while stream.conn.is_handshaking() {
            stream.conn.complete_io(&mut stream.sock)?;
        }
        tracing::debug!(
            host = %self.host,
            version = ?stream.conn.protocol_version(),
            "TLS handshake complete"
        );

        self.stream = Some(stream);
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        stream.write_all(data)?;
        stream.flush()
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        stream.read(buf)
    }

    fn disconnect(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.conn.send_close_notify();
            let _ = stream.flush();
            let _ = stream.sock.shutdown(Shutdown::Both);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn defaults_accept_any_certificate() {
        assert!(TlsOptions::default().accept_invalid_certs);
        assert!(!TlsOptions::verified().accept_invalid_certs);
    }

    #[test]
    fn configs_are_built_once_per_mode() {
        let a = client_config(TlsOptions::default()).unwrap();
        let b = client_config(TlsOptions::default()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let verified = client_config(TlsOptions::verified()).unwrap();
        assert!(!Arc::ptr_eq(&a, &verified));
    }

    #[test]
    fn invalid_host_name_is_rejected_before_dialing() {
        let mut transport = TlsTransport::new("not a host!", 8000, TlsOptions::default());
        let err = transport.connect().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(!transport.is_connected());
    }

    #[test]
    fn unreachable_server_is_a_connect_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut transport = TlsTransport::new("127.0.0.1", port, TlsOptions::default());
        assert!(transport.connect().is_err());
        assert!(!transport.is_connected());
    }

    #[test]
    fn disconnect_without_session_is_a_no_op() {
        let mut transport = TlsTransport::new("127.0.0.1", 8000, TlsOptions::default());
        transport.disconnect().unwrap();
        transport.disconnect().unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(transport.receive(&mut buf).unwrap_err().kind(), ErrorKind::NotConnected);
    }
}
