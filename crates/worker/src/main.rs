use certwatch_worker::config::load_config;
use certwatch_worker::dispatcher::NotificationDispatcher;
use certwatch_worker::notifier::NotifyWorker;
use certwatch_worker::poller::Poller;
use certwatch_worker::scheduler::ReminderScheduler;
use certwatch_worker::store::{HostStore, NotificationStore};
use certwatch_worker::webhook::WebhookClient;
use rustls::crypto;
use rustls::crypto::CryptoProvider;
use sea_orm::Database;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "certwatch_worker=info,sea_orm=warn";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    initialize_tracing();

    let _ = dotenvy::dotenv();
    let config = Arc::new(load_config()?);

    let ring_provider = crypto::ring::default_provider();
    CryptoProvider::install_default(ring_provider).expect("Failed to install crypto provider");

    let db = Arc::new(Database::connect(&config.database_url).await?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let hosts = HostStore::new(db.clone());
    let notifications = NotificationStore::new(db.clone());

    let client = Arc::new(WebhookClient::new(
        Duration::from_secs(config.webhook.send_timeout_secs),
        config.webhook.avatar_url.clone(),
    ));
    let notifier = NotifyWorker::new(
        Duration::from_secs(config.notify_interval_secs),
        ReminderScheduler::new(hosts.clone(), notifications.clone()),
        NotificationDispatcher::new(notifications, client),
    );
    let notifier_shutdown = shutdown_rx.clone();
    tracing::info!("starting notification worker");
    let notify_task = tokio::spawn(async move { notifier.run(notifier_shutdown).await });

    let poller = Poller::new(
        Duration::from_secs(config.poll_interval_secs),
        config.probe_concurrency,
        Duration::from_secs(config.probe_timeout_secs),
        hosts,
    );
    tracing::info!("starting certificate poller");
    let mut poll_task = tokio::spawn(async move { poller.run(shutdown_rx).await });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
        // The initial poll failing is fatal; the process has no baseline
        // certificate data to work from.
        result = &mut poll_task => {
            let _ = shutdown_tx.send(true);
            let _ = notify_task.await;
            result??;
            return Ok(());
        }
    }

    // An in-flight poll runs its batch to completion before the loops stop;
    // exiting earlier would discard probed results.
    poll_task.await??;
    notify_task.await?;
    Ok(())
}
