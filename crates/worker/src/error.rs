use std::str::FromStr;
use thiserror::Error;

use crate::model::CertStatus;

/// Closed taxonomy for probe failures. The display strings are persisted in
/// the `error_message` column, so they must stay stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProbeFailure {
    #[error("connection timed out")]
    Timeout,
    #[error("connection refused")]
    ConnectionRefused,
    #[error("name resolution failed")]
    NameResolution,
    #[error("invalid certificate")]
    InvalidCertificate,
    #[error("failed to get certificate")]
    Unknown,
}

impl ProbeFailure {
    /// Certificate-class failures mark the host invalid; every
    /// connection-class failure (timeout included) marks it offline.
    pub fn status(&self) -> CertStatus {
        match self {
            ProbeFailure::InvalidCertificate => CertStatus::Invalid,
            _ => CertStatus::Offline,
        }
    }
}

impl FromStr for ProbeFailure {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connection timed out" => Ok(ProbeFailure::Timeout),
            "connection refused" => Ok(ProbeFailure::ConnectionRefused),
            "name resolution failed" => Ok(ProbeFailure::NameResolution),
            "invalid certificate" => Ok(ProbeFailure::InvalidCertificate),
            _ => Ok(ProbeFailure::Unknown),
        }
    }
}

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("invalid webhook endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("webhook request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("webhook request failed: {0}")]
    Request(String),
    #[error("webhook endpoint returned status {0}")]
    Status(u16),
}
