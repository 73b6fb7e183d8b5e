//! The notify loop: on each tick, derive reminder rows from expiring hosts,
//! then fire the dispatcher over everything currently due. Delivery runs
//! detached, so tick N+1 is never delayed by tick N's slow webhooks.

use sea_orm::DbErr;
use tokio::sync::watch;
use tokio::time::{Duration, interval};
use tracing::{error, info};

use crate::dispatcher::NotificationDispatcher;
use crate::scheduler::ReminderScheduler;

pub const DEFAULT_NOTIFY_INTERVAL: Duration = Duration::from_secs(60);

pub struct NotifyWorker {
    notify_interval: Duration,
    scheduler: ReminderScheduler,
    dispatcher: NotificationDispatcher,
}

impl NotifyWorker {
    pub fn new(
        notify_interval: Duration,
        scheduler: ReminderScheduler,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            notify_interval,
            scheduler,
            dispatcher,
        }
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.notify_interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        error!(error = %e, "failed to process notifications");
                    }
                }
                _ = shutdown.changed() => {
                    info!("stopping notifier");
                    return;
                }
            }
        }
    }

    /// One scheduling pass; delivery handles are dropped on purpose.
    pub async fn tick(&self) -> Result<(), DbErr> {
        self.scheduler.schedule_reminders().await?;
        self.dispatcher.dispatch_due().await?;
        Ok(())
    }
}
