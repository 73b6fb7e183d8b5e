//! Notification delivery.
//!
//! Selects every currently eligible reminder and posts each one to its
//! owner's webhook. Deliveries are unbounded and detached: the tick that
//! launched them never waits, so a slow endpoint cannot delay the next
//! scheduling cycle. Claiming a row already consumed one of its delivery
//! attempts, so a 2xx records `delivered_at` and a failure needs no further
//! write.

use sea_orm::DbErr;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::model::{Notification, NotificationUpdate};
use crate::store::NotificationStore;
use crate::webhook::WebhookClient;

pub struct NotificationDispatcher {
    notifications: NotificationStore,
    client: Arc<WebhookClient>,
}

impl NotificationDispatcher {
    pub fn new(notifications: NotificationStore, client: Arc<WebhookClient>) -> Self {
        Self {
            notifications,
            client,
        }
    }

    /// Attempt delivery of every eligible notification once. The returned
    /// handles let callers observe completion; the notify loop drops them,
    /// leaving the deliveries detached.
    pub async fn dispatch_due(&self) -> Result<Vec<JoinHandle<()>>, DbErr> {
        let due = self.notifications.all_due().await?;
        debug!(count = due.len(), "dispatching due notifications");

        let mut handles = Vec::with_capacity(due.len());
        for notification in due {
            let store = self.notifications.clone();
            let client = self.client.clone();
            handles.push(tokio::spawn(async move {
                deliver(store, client, notification).await;
            }));
        }
        Ok(handles)
    }
}

async fn deliver(store: NotificationStore, client: Arc<WebhookClient>, notification: Notification) {
    let outcome = client
        .send(&notification.endpoint, &notification.body)
        .await;

    match &outcome {
        Ok(()) => {
            let update = NotificationUpdate {
                delivered_at: Some(OffsetDateTime::now_utc()),
                ..Default::default()
            };
            if let Err(e) = store.update(notification.id, update).await {
                error!(
                    notification_id = notification.id,
                    error = %e,
                    "failed to record delivery outcome"
                );
            }
        }
        // The attempt was already counted when the row was claimed.
        Err(send_err) => {
            error!(
                notification_id = notification.id,
                host_id = notification.host_id,
                error = %send_err,
                "failed to send notification"
            );
        }
    }
}
