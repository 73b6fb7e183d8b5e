//! Shared TLS client configuration for probing.
//!
//! Built once and reused for every connection to avoid rebuilding the root
//! certificate store per probe. The verifier delegates to webpki but tolerates
//! expired certificates: an expired leaf is exactly what this worker exists to
//! report on, so the handshake must succeed far enough to read `not_after`.

use once_cell::sync::OnceCell;
use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use std::sync::Arc;

static TLS_CONFIG: OnceCell<Arc<ClientConfig>> = OnceCell::new();

pub fn shared_tls_config() -> Arc<ClientConfig> {
    TLS_CONFIG
        .get_or_init(|| {
            let mut roots = RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            expiry_tolerant_config(roots)
        })
        .clone()
}

/// Client config trusting `roots` but tolerating expired leaves. Production
/// probing goes through [`shared_tls_config`]; tests hand in their own root
/// store.
pub fn expiry_tolerant_config(roots: RootCertStore) -> Arc<ClientConfig> {
    let config = match WebPkiServerVerifier::builder(Arc::new(roots.clone())).build() {
        Ok(webpki) => ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(ExpiryTolerantVerifier { inner: webpki }))
            .with_no_client_auth(),
        // Only reachable with an empty root store; fall back to the strict
        // verifier rather than panic.
        Err(_) => ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth(),
    };
    Arc::new(config)
}

#[derive(Debug)]
struct ExpiryTolerantVerifier {
    inner: Arc<WebPkiServerVerifier>,
}

impl ServerCertVerifier for ExpiryTolerantVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        match self.inner.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        ) {
            Ok(verified) => Ok(verified),
            // Let the probe observe the expired certificate instead of
            // failing the handshake; status classification happens later.
            Err(rustls::Error::InvalidCertificate(CertificateError::Expired)) => {
                Ok(ServerCertVerified::assertion())
            }
            Err(e) => Err(e),
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}
