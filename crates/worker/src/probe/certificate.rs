use rustls_pki_types::CertificateDer;
use sha1::{Digest, Sha1};
// x509-parser's prelude also exposes a `time` module; the leading `::`
// pins the crate.
use ::time::OffsetDateTime;
use x509_parser::prelude::*;

/// Fields read off the leaf certificate during a probe.
#[derive(Debug, Clone)]
pub struct LeafCertificate {
    pub dns_names: Vec<String>,
    pub issued_by: String,
    pub not_after: Option<OffsetDateTime>,
    /// Hex SHA-1 fingerprint of the DER bytes.
    pub fingerprint: String,
}

pub fn extract_leaf_certificate(cert_der: &CertificateDer<'_>) -> Option<LeafCertificate> {
    let cert_bytes = cert_der.as_ref();
    let (_, x509_cert) = X509Certificate::from_der(cert_bytes).ok()?;

    let issued_by = x509_cert
        .issuer()
        .iter_organization()
        .next()
        .and_then(|attr| attr.as_str().ok())
        .unwrap_or("n/a")
        .to_string();

    let not_after =
        OffsetDateTime::from_unix_timestamp(x509_cert.validity().not_after.timestamp()).ok();

    let mut dns_names = Vec::new();
    if let Ok(extensions_map) = x509_cert.extensions_map()
        && let Some(san_ext) =
            extensions_map.get(&x509_parser::oid_registry::OID_X509_EXT_SUBJECT_ALT_NAME)
        && let ParsedExtension::SubjectAlternativeName(san_general_names) =
            san_ext.parsed_extension()
    {
        for name in &san_general_names.general_names {
            if let GeneralName::DNSName(dns_name) = name {
                dns_names.push(dns_name.to_string());
            }
        }
    }

    Some(LeafCertificate {
        dns_names,
        issued_by,
        not_after,
        fingerprint: fingerprint(cert_bytes),
    })
}

pub fn fingerprint(der_bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(der_bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_lowercase_hex_sha1() {
        // SHA-1 of the empty input is well known.
        assert_eq!(fingerprint(b""), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
        let fp = fingerprint(b"certwatch");
        assert_eq!(fp.len(), 40);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn garbage_der_yields_none() {
        let der = CertificateDer::from(vec![0u8; 16]);
        assert!(extract_leaf_certificate(&der).is_none());
    }
}
