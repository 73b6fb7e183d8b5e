use sea_orm::ActiveValue::Set;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, DbErr, EntityTrait,
    FromQueryResult, QueryFilter, QueryOrder, Statement,
};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::warn;

use crate::entity::host;
use crate::model::{CertStatus, CertificateInfo, Host, NotifiableHost};

/// Hosts nearing expiry joined with owner webhook settings, excluding hosts
/// that already have a delivered or attempt-exhausted reminder for the
/// computed due instant. `attempts` carries the prior reminder's count.
const EXPIRING_PG: &str = r#"
SELECT
    h.id, h.hostname, h.dns_names, h.ip_address, h.issued_by, h.status,
    h.expires_at, h.checked_at, h.latency_ms, h.signature, h.error_message,
    uh.user_id, s.webhook_url, s.remind_before,
    COALESCE(r.attempts, 0) AS attempts
FROM hosts h
INNER JOIN user_hosts uh ON uh.host_id = h.id
INNER JOIN settings s ON s.user_id = uh.user_id
LEFT JOIN notifications r
    ON r.host_id = h.id
    AND r.user_id = uh.user_id
    AND r.due = h.expires_at - (s.remind_before * interval '1 second')
WHERE h.expires_at IS NOT NULL
    AND s.webhook_url IS NOT NULL AND s.webhook_url <> ''
    AND (h.expires_at - (s.remind_before * interval '1 second')) <= $1
    AND (r.id IS NULL OR (r.delivered_at IS NULL AND r.attempts < 3))
FOR UPDATE OF h SKIP LOCKED"#;

// datetime() normalizes the RFC 3339 text sqlx stores so the comparisons
// are calendar comparisons, not string ones.
const EXPIRING_SQLITE: &str = r#"
SELECT
    h.id, h.hostname, h.dns_names, h.ip_address, h.issued_by, h.status,
    h.expires_at, h.checked_at, h.latency_ms, h.signature, h.error_message,
    uh.user_id, s.webhook_url, s.remind_before,
    COALESCE(r.attempts, 0) AS attempts
FROM hosts h
INNER JOIN user_hosts uh ON uh.host_id = h.id
INNER JOIN settings s ON s.user_id = uh.user_id
LEFT JOIN notifications r
    ON r.host_id = h.id
    AND r.user_id = uh.user_id
    AND datetime(r.due) = datetime(h.expires_at, '-' || s.remind_before || ' seconds')
WHERE h.expires_at IS NOT NULL
    AND s.webhook_url IS NOT NULL AND s.webhook_url <> ''
    AND datetime(h.expires_at, '-' || s.remind_before || ' seconds') <= datetime(?)
    AND (r.id IS NULL OR (r.delivered_at IS NULL AND r.attempts < 3))"#;

#[derive(Debug, FromQueryResult)]
struct NotifiableRow {
    id: i32,
    hostname: String,
    dns_names: String,
    ip_address: String,
    issued_by: String,
    status: i16,
    expires_at: Option<OffsetDateTime>,
    checked_at: OffsetDateTime,
    latency_ms: i32,
    signature: String,
    error_message: Option<String>,
    user_id: String,
    webhook_url: String,
    remind_before: i64,
    attempts: i32,
}

#[derive(Clone)]
pub struct HostStore {
    db: Arc<DatabaseConnection>,
}

impl HostStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Every tracked host, worst status first, soonest expiry within a
    /// status. The numeric status encoding doubles as the severity order.
    pub async fn all(&self) -> Result<Vec<Host>, DbErr> {
        let rows = host::Entity::find()
            .order_by_asc(host::Column::Status)
            .order_by_asc(host::Column::ExpiresAt)
            .all(self.db.as_ref())
            .await?;
        Ok(rows.into_iter().map(host_from_row).collect())
    }

    /// Persist a refreshed batch with independent per-row writes: one host's
    /// write failure must not take down unrelated freshly probed hosts. The
    /// first error is reported after every row has been attempted.
    pub async fn update_batch(&self, hosts: &[Host]) -> Result<(), DbErr> {
        let now = OffsetDateTime::now_utc();
        let mut first_err = None;
        for h in hosts {
            let active = host::ActiveModel {
                dns_names: Set(h.certificate.dns_names.clone()),
                ip_address: Set(h.certificate.ip_address.clone()),
                issued_by: Set(h.certificate.issued_by.clone()),
                status: Set(h.certificate.status.as_i16()),
                expires_at: Set(h.certificate.expires_at),
                checked_at: Set(h.certificate.checked_at),
                latency_ms: Set(h.certificate.latency_ms),
                signature: Set(h.certificate.signature.clone()),
                error_message: Set(h.certificate.error.map(|e| e.to_string())),
                updated_at: Set(Some(now)),
                ..Default::default()
            };
            let result = host::Entity::update_many()
                .set(active)
                .filter(host::Column::Id.eq(h.id))
                .exec(self.db.as_ref())
                .await;
            if let Err(e) = result {
                warn!(hostname = %h.hostname, error = %e, "failed to persist host");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Hosts whose reminder due instant has passed and which still need a
    /// reminder created or delivered.
    pub async fn expiring(&self) -> Result<Vec<NotifiableHost>, DbErr> {
        let backend = self.db.get_database_backend();
        let sql = match backend {
            DbBackend::Postgres => EXPIRING_PG,
            _ => EXPIRING_SQLITE,
        };
        let now = OffsetDateTime::now_utc();
        let rows = NotifiableRow::find_by_statement(Statement::from_sql_and_values(
            backend,
            sql,
            [now.into()],
        ))
        .all(self.db.as_ref())
        .await?;
        Ok(rows.into_iter().map(notifiable_from_row).collect())
    }
}

fn certificate_from_parts(
    dns_names: String,
    ip_address: String,
    issued_by: String,
    status: i16,
    expires_at: Option<OffsetDateTime>,
    checked_at: OffsetDateTime,
    latency_ms: i32,
    signature: String,
    error_message: Option<String>,
) -> CertificateInfo {
    CertificateInfo {
        dns_names,
        ip_address,
        issued_by,
        expires_at,
        status: CertStatus::from_i16(status),
        checked_at,
        latency_ms,
        signature,
        error: error_message.and_then(|m| m.parse().ok()),
    }
}

fn host_from_row(row: host::Model) -> Host {
    Host {
        id: row.id,
        hostname: row.hostname,
        certificate: certificate_from_parts(
            row.dns_names,
            row.ip_address,
            row.issued_by,
            row.status,
            row.expires_at,
            row.checked_at,
            row.latency_ms,
            row.signature,
            row.error_message,
        ),
    }
}

fn notifiable_from_row(row: NotifiableRow) -> NotifiableHost {
    NotifiableHost {
        host: Host {
            id: row.id,
            hostname: row.hostname,
            certificate: certificate_from_parts(
                row.dns_names,
                row.ip_address,
                row.issued_by,
                row.status,
                row.expires_at,
                row.checked_at,
                row.latency_ms,
                row.signature,
                row.error_message,
            ),
        },
        user_id: row.user_id,
        webhook_url: row.webhook_url,
        remind_before: row.remind_before,
        attempts: row.attempts,
    }
}
