use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, DbErr, EntityTrait,
    FromQueryResult, QueryFilter, Statement, TransactionTrait,
};
use std::sync::Arc;
use time::OffsetDateTime;

use crate::entity::notification;
use crate::model::{Notification, NotificationInput, NotificationKind, NotificationUpdate};

/// Maximum delivery attempts before a reminder becomes permanently
/// ineligible. There is no explicit failed state; exhausted rows simply stop
/// matching the due predicate.
pub const MAX_ATTEMPTS: i32 = 3;

/// Due, undelivered, not attempt-exhausted, not rotated past, and owned by a
/// user with a configured webhook. Runs inside the claiming transaction; on
/// Postgres the row locks keep concurrent dispatchers off the same rows
/// until the attempt counts are written.
const ALL_DUE_PG: &str = r#"
SELECT
    s.webhook_url AS endpoint,
    n.id, n.user_id, n.host_id, n.kind, n.body, n.due, n.delivered_at,
    n.attempts, n.deleted_after
FROM notifications n
INNER JOIN settings s ON s.user_id = n.user_id
WHERE n.deleted_after > $1
    AND n.delivered_at IS NULL
    AND n.attempts < $2
    AND n.due <= $1
    AND s.webhook_url IS NOT NULL AND s.webhook_url <> ''
ORDER BY n.due
FOR UPDATE OF n SKIP LOCKED"#;

const ALL_DUE_SQLITE: &str = r#"
SELECT
    s.webhook_url AS endpoint,
    n.id, n.user_id, n.host_id, n.kind, n.body, n.due, n.delivered_at,
    n.attempts, n.deleted_after
FROM notifications n
INNER JOIN settings s ON s.user_id = n.user_id
WHERE datetime(n.deleted_after) > datetime(?)
    AND n.delivered_at IS NULL
    AND n.attempts < ?
    AND datetime(n.due) <= datetime(?)
    AND s.webhook_url IS NOT NULL AND s.webhook_url <> ''
ORDER BY n.due"#;

#[derive(Debug, FromQueryResult)]
struct DueRow {
    endpoint: String,
    id: i32,
    user_id: String,
    host_id: i32,
    kind: i16,
    body: String,
    due: OffsetDateTime,
    delivered_at: Option<OffsetDateTime>,
    attempts: i32,
    deleted_after: OffsetDateTime,
}

#[derive(Clone)]
pub struct NotificationStore {
    db: Arc<DatabaseConnection>,
}

impl NotificationStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Idempotent insert keyed on (user, host, due). A conflicting insert
    /// leaves the existing row untouched, so `due` and `body` never change
    /// and `attempts` can only grow through [`NotificationStore::update`].
    pub async fn create(&self, input: &NotificationInput) -> Result<(), DbErr> {
        let row = notification::ActiveModel {
            user_id: Set(input.user_id.clone()),
            host_id: Set(input.host_id),
            kind: Set(input.kind.as_i16()),
            body: Set(input.body.clone()),
            due: Set(input.due),
            delivered_at: Set(None),
            attempts: Set(input.attempts),
            deleted_after: Set(input.deleted_after),
            created_at: Set(OffsetDateTime::now_utc()),
            ..Default::default()
        };
        notification::Entity::insert(row)
            .on_conflict(
                OnConflict::columns([
                    notification::Column::UserId,
                    notification::Column::HostId,
                    notification::Column::Due,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await?;
        Ok(())
    }

    /// Claim every notification currently eligible for dispatch. Selection
    /// and the attempt increment commit together, so each returned row has
    /// consumed one of its delivery attempts before any request goes out and
    /// a crashed dispatcher cannot grant a row extra sends.
    pub async fn all_due(&self) -> Result<Vec<Notification>, DbErr> {
        let backend = self.db.get_database_backend();
        let now = OffsetDateTime::now_utc();
        let stmt = match backend {
            DbBackend::Postgres => Statement::from_sql_and_values(
                backend,
                ALL_DUE_PG,
                [now.into(), MAX_ATTEMPTS.into()],
            ),
            _ => Statement::from_sql_and_values(
                backend,
                ALL_DUE_SQLITE,
                [now.into(), MAX_ATTEMPTS.into(), now.into()],
            ),
        };

        let txn = self.db.begin().await?;
        let rows = DueRow::find_by_statement(stmt).all(&txn).await?;
        if rows.is_empty() {
            txn.commit().await?;
            return Ok(Vec::new());
        }
        // The rows are held by this transaction, so the read counts are
        // authoritative.
        for row in &rows {
            notification::Entity::update_many()
                .col_expr(notification::Column::Attempts, Expr::value(row.attempts + 1))
                .filter(notification::Column::Id.eq(row.id))
                .exec(&txn)
                .await?;
        }
        txn.commit().await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let mut claimed = notification_from_row(row);
                claimed.attempts += 1;
                claimed
            })
            .collect())
    }

    /// Write delivery bookkeeping; absent fields are left alone.
    pub async fn update(&self, id: i32, update: NotificationUpdate) -> Result<(), DbErr> {
        if update.delivered_at.is_none() && update.attempts.is_none() {
            return Ok(());
        }
        let mut query =
            notification::Entity::update_many().filter(notification::Column::Id.eq(id));
        if let Some(ts) = update.delivered_at {
            query = query.col_expr(notification::Column::DeliveredAt, Expr::value(ts));
        }
        if let Some(attempts) = update.attempts {
            query = query.col_expr(notification::Column::Attempts, Expr::value(attempts));
        }
        query.exec(self.db.as_ref()).await?;
        Ok(())
    }
}

fn notification_from_row(row: DueRow) -> Notification {
    Notification {
        id: row.id,
        endpoint: row.endpoint,
        user_id: row.user_id,
        host_id: row.host_id,
        kind: NotificationKind::from_i16(row.kind),
        body: row.body,
        due: row.due,
        delivered_at: row.delivered_at,
        attempts: row.attempts,
        deleted_after: row.deleted_after,
    }
}
