//! Reminder derivation.
//!
//! Turns expiring hosts into due reminder rows, idempotently: the upsert key
//! (user, host, due) guarantees at most one row per computed due instant no
//! matter how often a tick runs.

use futures::future::try_join_all;
use sea_orm::DbErr;
use time::macros::format_description;
use time::{Duration, OffsetDateTime};

use crate::model::{NotifiableHost, NotificationInput, NotificationKind};
use crate::store::{HostStore, NotificationStore};

pub struct ReminderScheduler {
    hosts: HostStore,
    notifications: NotificationStore,
}

impl ReminderScheduler {
    pub fn new(hosts: HostStore, notifications: NotificationStore) -> Self {
        Self {
            hosts,
            notifications,
        }
    }

    /// Ensure a reminder row exists for every notifiable host that has not
    /// expired yet. Upserts run concurrently; the first storage error drops
    /// the remaining in-flight work for this tick.
    pub async fn schedule_reminders(&self) -> Result<(), DbErr> {
        let records = self.hosts.expiring().await?;
        if records.is_empty() {
            return Ok(());
        }
        let now = OffsetDateTime::now_utc();

        let upserts = records.into_iter().filter_map(|record| {
            let input = new_reminder(&record, now)?;
            let store = self.notifications.clone();
            Some(async move { store.create(&input).await })
        });
        try_join_all(upserts).await?;
        Ok(())
    }
}

/// Reminder input for one notifiable host, or `None` when the certificate
/// already lapsed — no retroactive reminders.
fn new_reminder(record: &NotifiableHost, now: OffsetDateTime) -> Option<NotificationInput> {
    let expires_at = record.host.certificate.expires_at?;
    if expires_at <= now {
        return None;
    }
    Some(NotificationInput {
        user_id: record.user_id.clone(),
        host_id: record.host.id,
        kind: NotificationKind::Expiration,
        body: reminder_body(&record.host.hostname, expires_at, now),
        due: expires_at - Duration::seconds(record.remind_before),
        attempts: record.attempts,
        deleted_after: expires_at,
    })
}

/// Human-readable reminder text. Day granularity from 24h of remaining time
/// upward, hour granularity below, singular forms at exactly one.
fn reminder_body(hostname: &str, expires_at: OffsetDateTime, now: OffsetDateTime) -> String {
    let hours = (expires_at - now).whole_hours();
    let (count, unit) = if hours < 24 {
        (hours, if hours == 1 { "hour" } else { "hours" })
    } else {
        let days = hours / 24;
        (days, if days == 1 { "day" } else { "days" })
    };
    let stamp = expires_at
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
        .unwrap_or_default();
    format!("TLS certificate for {hostname} is expiring in {count} {unit} (at {stamp} UTC)")
}
