//! TLS certificate probing.
//!
//! One probe is one TLS handshake against `hostname:443` (or an explicit
//! `host:port`) bounded by its own deadline. Failures never propagate out of
//! [`probe`]; they are classified into the returned [`CertificateInfo`].

mod certificate;
mod tls;

pub use certificate::{LeafCertificate, extract_leaf_certificate, fingerprint};
pub use tls::{expiry_tolerant_config, shared_tls_config};

use rustls_pki_types::ServerName;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;
use tokio::net::TcpStream;
use tokio::time::{Duration, timeout};
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::error::ProbeFailure;
use crate::model::{CertStatus, CertificateInfo};

/// Internal handshake deadline; the effective budget is the smaller of this
/// and the caller's deadline.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub const TLS_PORT: u16 = 443;

/// Probe a host's TLS certificate. Returns within `deadline` plus scheduling
/// slack; a deadline hit yields a best-effort offline result rather than an
/// error or a hang.
pub async fn probe(hostname: &str, deadline: Duration) -> CertificateInfo {
    probe_with_tls(hostname, deadline, shared_tls_config()).await
}

/// [`probe`] against an explicit client config; tests use this to trust a
/// locally issued certificate chain.
pub async fn probe_with_tls(
    hostname: &str,
    deadline: Duration,
    tls: Arc<rustls::ClientConfig>,
) -> CertificateInfo {
    let budget = deadline.min(PROBE_TIMEOUT);
    let checked_at = OffsetDateTime::now_utc();
    let started = Instant::now();

    match timeout(budget, handshake(hostname, tls)).await {
        Ok(Ok(probed)) => {
            let latency_ms = started.elapsed().as_millis() as i32;
            let status = match probed.leaf.not_after {
                Some(not_after) if not_after > OffsetDateTime::now_utc() => CertStatus::Healthy,
                _ => CertStatus::Invalid,
            };
            CertificateInfo {
                dns_names: probed.leaf.dns_names.join(", "),
                ip_address: probed.remote_addr.to_string(),
                issued_by: probed.leaf.issued_by,
                expires_at: probed.leaf.not_after,
                status,
                checked_at,
                latency_ms,
                signature: probed.leaf.fingerprint,
                error: None,
            }
        }
        Ok(Err(failure)) => {
            debug!(hostname, failure = %failure, "probe failed");
            CertificateInfo::failed(failure, checked_at)
        }
        Err(_) => {
            debug!(hostname, budget = ?budget, "probe deadline exceeded");
            CertificateInfo::failed(ProbeFailure::Timeout, checked_at)
        }
    }
}

struct ProbedLeaf {
    leaf: LeafCertificate,
    remote_addr: SocketAddr,
}

async fn handshake(hostname: &str, tls: Arc<rustls::ClientConfig>) -> Result<ProbedLeaf, ProbeFailure> {
    let (addr, sni) = target(hostname);

    let stream = TcpStream::connect(&addr).await.map_err(classify_io)?;
    let remote_addr = stream.peer_addr().map_err(classify_io)?;

    let connector = TlsConnector::from(tls);
    let server_name =
        ServerName::try_from(sni).map_err(|_| ProbeFailure::InvalidCertificate)?;

    let tls_stream = connector
        .connect(server_name, stream)
        .await
        .map_err(classify_handshake)?;

    let (_io, connection) = tls_stream.get_ref();
    let leaf = connection
        .peer_certificates()
        .and_then(|certs| certs.first())
        .and_then(extract_leaf_certificate)
        .ok_or(ProbeFailure::Unknown)?;

    Ok(ProbedLeaf { leaf, remote_addr })
}

/// Split an explicit `host:port` target, defaulting the port to 443. The SNI
/// is always the bare host.
fn target(hostname: &str) -> (String, String) {
    match hostname.rsplit_once(':') {
        Some((host, port)) if port.parse::<u16>().is_ok() => {
            (hostname.to_string(), host.to_string())
        }
        _ => (format!("{hostname}:{TLS_PORT}"), hostname.to_string()),
    }
}

fn classify_io(err: io::Error) -> ProbeFailure {
    match err.kind() {
        io::ErrorKind::ConnectionRefused => ProbeFailure::ConnectionRefused,
        io::ErrorKind::TimedOut => ProbeFailure::Timeout,
        _ => {
            // DNS failures surface as uncategorized io errors; the message is
            // the only signal available.
            let msg = err.to_string();
            if msg.contains("failed to lookup address")
                || msg.contains("name resolution")
                || msg.contains("Name or service not known")
            {
                ProbeFailure::NameResolution
            } else {
                ProbeFailure::Unknown
            }
        }
    }
}

/// The TLS layer wraps rustls errors in `io::Error`; unwrap and split
/// certificate verification failures from transport ones.
fn classify_handshake(err: io::Error) -> ProbeFailure {
    if let Some(rustls_err) = err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>())
    {
        return match rustls_err {
            rustls::Error::InvalidCertificate(_) => ProbeFailure::InvalidCertificate,
            _ => ProbeFailure::Unknown,
        };
    }
    classify_io(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustls::CertificateError;

    #[test]
    fn target_appends_default_port() {
        assert_eq!(
            target("example.com"),
            ("example.com:443".to_string(), "example.com".to_string())
        );
    }

    #[test]
    fn target_keeps_explicit_port() {
        assert_eq!(
            target("example.com:8443"),
            ("example.com:8443".to_string(), "example.com".to_string())
        );
    }

    #[test]
    fn classify_io_refused_and_timeout() {
        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused");
        assert_eq!(classify_io(refused), ProbeFailure::ConnectionRefused);

        let timed_out = io::Error::new(io::ErrorKind::TimedOut, "timed out");
        assert_eq!(classify_io(timed_out), ProbeFailure::Timeout);
    }

    #[test]
    fn classify_io_dns_failure() {
        let dns = io::Error::other("failed to lookup address information");
        assert_eq!(classify_io(dns), ProbeFailure::NameResolution);
    }

    #[test]
    fn classify_io_other_is_unknown() {
        let other = io::Error::other("broken pipe somewhere");
        assert_eq!(classify_io(other), ProbeFailure::Unknown);
    }

    #[test]
    fn classify_handshake_invalid_certificate() {
        let rustls_err =
            rustls::Error::InvalidCertificate(CertificateError::NotValidForName);
        let err = io::Error::new(io::ErrorKind::InvalidData, rustls_err);
        assert_eq!(classify_handshake(err), ProbeFailure::InvalidCertificate);
    }
}
