//! Shared fixtures: an in-memory SQLite database with the real schema, plus
//! seed helpers for users, hosts and their ownership links.

#![allow(dead_code)]

use certwatch_worker::entity::{host, notification, settings, user, user_host};
use certwatch_worker::model::CertStatus;
use migration::{Migrator, MigratorTrait};
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{Database, DatabaseConnection, EntityTrait};
use std::sync::Arc;
use time::OffsetDateTime;

pub async fn setup_db() -> Arc<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");
    Migrator::up(&db, None).await.expect("Failed to run migrations");
    Arc::new(db)
}

/// Install the ring provider for code paths that build TLS configs; safe to
/// call from every test.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::CryptoProvider::install_default(
        rustls::crypto::ring::default_provider(),
    );
}

/// UTC now truncated to whole seconds so timestamps survive the SQLite
/// round-trip exactly.
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
        .replace_nanosecond(0)
        .expect("zero nanosecond is valid")
}

pub async fn seed_user(
    db: &DatabaseConnection,
    id: &str,
    webhook_url: Option<&str>,
    remind_before: i64,
) {
    user::Entity::insert(user::ActiveModel {
        id: Set(id.to_string()),
        email: Set(format!("{id}@example.com")),
    })
    .exec(db)
    .await
    .expect("Failed to insert user");

    settings::Entity::insert(settings::ActiveModel {
        user_id: Set(id.to_string()),
        webhook_url: Set(webhook_url.map(|u| u.to_string())),
        remind_before: Set(remind_before),
    })
    .exec(db)
    .await
    .expect("Failed to insert settings");
}

pub async fn seed_host(
    db: &DatabaseConnection,
    hostname: &str,
    expires_at: Option<OffsetDateTime>,
) -> i32 {
    seed_host_with_status(db, hostname, expires_at, CertStatus::Healthy).await
}

pub async fn seed_host_with_status(
    db: &DatabaseConnection,
    hostname: &str,
    expires_at: Option<OffsetDateTime>,
    status: CertStatus,
) -> i32 {
    let res = host::Entity::insert(host::ActiveModel {
        id: NotSet,
        hostname: Set(hostname.to_string()),
        dns_names: Set(hostname.to_string()),
        ip_address: Set("192.0.2.1:443".to_string()),
        issued_by: Set("Test CA".to_string()),
        status: Set(status.as_i16()),
        expires_at: Set(expires_at),
        checked_at: Set(now()),
        latency_ms: Set(12),
        signature: Set("deadbeef".to_string()),
        error_message: Set(None),
        updated_at: Set(None),
    })
    .exec(db)
    .await
    .expect("Failed to insert host");
    res.last_insert_id
}

pub async fn link_user_host(db: &DatabaseConnection, user_id: &str, host_id: i32) {
    user_host::Entity::insert(user_host::ActiveModel {
        host_id: Set(host_id),
        user_id: Set(user_id.to_string()),
    })
    .exec(db)
    .await
    .expect("Failed to link user and host");
}

/// Insert a notification row directly, bypassing the scheduler.
#[allow(clippy::too_many_arguments)]
pub async fn seed_notification(
    db: &DatabaseConnection,
    user_id: &str,
    host_id: i32,
    due: OffsetDateTime,
    delivered_at: Option<OffsetDateTime>,
    attempts: i32,
    deleted_after: OffsetDateTime,
) -> i32 {
    let res = notification::Entity::insert(notification::ActiveModel {
        id: NotSet,
        user_id: Set(user_id.to_string()),
        host_id: Set(host_id),
        kind: Set(0),
        body: Set("test reminder".to_string()),
        due: Set(due),
        delivered_at: Set(delivered_at),
        attempts: Set(attempts),
        deleted_after: Set(deleted_after),
        created_at: Set(now()),
    })
    .exec(db)
    .await
    .expect("Failed to insert notification");
    res.last_insert_id
}
