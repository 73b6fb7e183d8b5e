//! Domain types shared by the probe, poller, scheduler and dispatcher.

use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::error::ProbeFailure;

/// Certificate state derived from the most recent probe. Stored as a small
/// integer; the numeric order doubles as display severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum CertStatus {
    #[default]
    Unknown,
    Offline,
    Invalid,
    Healthy,
}

impl CertStatus {
    pub fn as_i16(self) -> i16 {
        match self {
            CertStatus::Unknown => 0,
            CertStatus::Offline => 1,
            CertStatus::Invalid => 2,
            CertStatus::Healthy => 3,
        }
    }

    pub fn from_i16(value: i16) -> Self {
        match value {
            1 => CertStatus::Offline,
            2 => CertStatus::Invalid,
            3 => CertStatus::Healthy,
            _ => CertStatus::Unknown,
        }
    }
}

impl std::fmt::Display for CertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CertStatus::Unknown => "unknown",
            CertStatus::Offline => "offline",
            CertStatus::Invalid => "invalid",
            CertStatus::Healthy => "healthy",
        };
        f.write_str(s)
    }
}

/// Snapshot of one probe. Always written back whole; a failed probe produces
/// a snapshot too, never a partial merge into the previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateInfo {
    /// SAN entries, comma separated.
    pub dns_names: String,
    pub ip_address: String,
    pub issued_by: String,
    pub expires_at: Option<OffsetDateTime>,
    pub status: CertStatus,
    pub checked_at: OffsetDateTime,
    pub latency_ms: i32,
    /// Hex SHA-1 fingerprint of the DER-encoded leaf certificate.
    pub signature: String,
    pub error: Option<ProbeFailure>,
}

impl CertificateInfo {
    /// Snapshot for a probe that never produced a certificate.
    pub fn failed(failure: ProbeFailure, checked_at: OffsetDateTime) -> Self {
        CertificateInfo {
            dns_names: String::new(),
            ip_address: String::new(),
            issued_by: "n/a".to_string(),
            expires_at: None,
            status: failure.status(),
            checked_at,
            latency_ms: 0,
            signature: String::new(),
            error: Some(failure),
        }
    }

    /// Time until expiry, clamped to zero for missing or past expiry dates.
    pub fn time_left(&self, now: OffsetDateTime) -> Duration {
        match self.expires_at {
            Some(exp) if exp > now => exp - now,
            _ => Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Host {
    pub id: i32,
    pub hostname: String,
    pub certificate: CertificateInfo,
}

/// Read-only join row produced by the storage boundary's expiring query:
/// a host nearing expiry together with one owner's webhook settings and the
/// attempt count of any reminder already on file for the computed due instant.
#[derive(Debug, Clone)]
pub struct NotifiableHost {
    pub host: Host,
    pub user_id: String,
    pub webhook_url: String,
    /// Lead time before expiry, in seconds.
    pub remind_before: i64,
    pub attempts: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Expiration,
}

impl NotificationKind {
    pub fn as_i16(self) -> i16 {
        match self {
            NotificationKind::Expiration => 0,
        }
    }

    pub fn from_i16(_value: i16) -> Self {
        // Expiration is the only kind so far.
        NotificationKind::Expiration
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub id: i32,
    pub endpoint: String,
    pub user_id: String,
    pub host_id: i32,
    pub kind: NotificationKind,
    pub body: String,
    pub due: OffsetDateTime,
    pub delivered_at: Option<OffsetDateTime>,
    pub attempts: i32,
    pub deleted_after: OffsetDateTime,
}

/// Insert payload for the reminder upsert keyed on (user, host, due).
#[derive(Debug, Clone)]
pub struct NotificationInput {
    pub user_id: String,
    pub host_id: i32,
    pub kind: NotificationKind,
    pub body: String,
    pub due: OffsetDateTime,
    pub attempts: i32,
    pub deleted_after: OffsetDateTime,
}

/// Partial update; only the fields that are `Some` are written.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationUpdate {
    pub delivered_at: Option<OffsetDateTime>,
    pub attempts: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip() {
        for status in [
            CertStatus::Unknown,
            CertStatus::Offline,
            CertStatus::Invalid,
            CertStatus::Healthy,
        ] {
            assert_eq!(CertStatus::from_i16(status.as_i16()), status);
        }
        assert_eq!(CertStatus::from_i16(42), CertStatus::Unknown);
    }

    #[test]
    fn time_left_clamps_to_zero() {
        let now = OffsetDateTime::now_utc();
        let mut info = CertificateInfo::failed(ProbeFailure::Unknown, now);
        assert_eq!(info.time_left(now), Duration::ZERO);

        info.expires_at = Some(now - Duration::hours(1));
        assert_eq!(info.time_left(now), Duration::ZERO);

        info.expires_at = Some(now + Duration::hours(3));
        assert_eq!(info.time_left(now), Duration::hours(3));
    }

    #[test]
    fn failed_snapshot_has_no_expiry() {
        let now = OffsetDateTime::now_utc();
        let info = CertificateInfo::failed(ProbeFailure::Timeout, now);
        assert_eq!(info.status, CertStatus::Offline);
        assert_eq!(info.issued_by, "n/a");
        assert!(info.expires_at.is_none());
        assert_eq!(info.error, Some(ProbeFailure::Timeout));
    }
}
