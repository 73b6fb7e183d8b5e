//! Periodic certificate refresh.
//!
//! Each tick loads every tracked host, fans probes out under a fixed permit
//! budget so no more than that many TLS connections are in flight at once,
//! joins the whole batch, and only then writes the refreshed records back.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{Duration, interval};
use tracing::{error, info};

use crate::model::{CertificateInfo, Host};
use crate::probe;
use crate::store::HostStore;

/// Production poll cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Concurrent in-flight probe budget.
pub const DEFAULT_PROBE_BUDGET: usize = 15;

pub type ProbeFuture = Pin<Box<dyn Future<Output = CertificateInfo> + Send>>;
pub type ProbeFn = Arc<dyn Fn(String) -> ProbeFuture + Send + Sync>;

pub struct Poller {
    poll_interval: Duration,
    budget: usize,
    store: HostStore,
    probe_fn: ProbeFn,
}

impl Poller {
    pub fn new(
        poll_interval: Duration,
        budget: usize,
        probe_timeout: Duration,
        store: HostStore,
    ) -> Self {
        let probe_fn: ProbeFn = Arc::new(move |hostname: String| {
            Box::pin(async move { probe::probe(&hostname, probe_timeout).await }) as ProbeFuture
        });
        Self::with_probe_fn(poll_interval, budget, store, probe_fn)
    }

    /// Injectable probe, used by tests to instrument concurrency.
    pub fn with_probe_fn(
        poll_interval: Duration,
        budget: usize,
        store: HostStore,
        probe_fn: ProbeFn,
    ) -> Self {
        Self {
            poll_interval,
            budget: budget.max(1),
            store,
            probe_fn,
        }
    }

    /// Poll once immediately, then on every tick until shutdown. The initial
    /// poll's failure is returned to the caller — the worker has no baseline
    /// data to serve without it. Later failures are logged and the ticker
    /// keeps running.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), sea_orm::DbErr> {
        self.poll().await?;

        let mut ticker = interval(self.poll_interval);
        // interval fires immediately; the initial poll already ran.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let started = Instant::now();
                    info!("start polling hosts");
                    if let Err(e) = self.poll().await {
                        error!(error = %e, "error polling hosts");
                    }
                    info!(elapsed = ?started.elapsed(), "finish polling");
                }
                _ = shutdown.changed() => {
                    info!("stopping poller");
                    return Ok(());
                }
            }
        }
    }

    /// One full refresh cycle. Per-host probe failures land in that host's
    /// own record; only listing or persistence failures surface here.
    pub async fn poll(&self) -> Result<(), sea_orm::DbErr> {
        let hosts = self.store.all().await?;
        if hosts.is_empty() {
            return Ok(());
        }

        let permits = Arc::new(Semaphore::new(self.budget));
        // Buffered for the whole batch so no probe task ever blocks on send.
        let (tx, mut rx) = mpsc::channel::<Host>(hosts.len());

        let mut tasks = JoinSet::new();
        for host in hosts {
            let permits = permits.clone();
            let tx = tx.clone();
            let probe_fn = self.probe_fn.clone();
            tasks.spawn(async move {
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    // The semaphore is never closed while tasks run.
                    Err(_) => return,
                };
                let certificate = (probe_fn)(host.hostname.clone()).await;
                let _ = tx
                    .send(Host {
                        certificate,
                        ..host
                    })
                    .await;
            });
        }
        drop(tx);

        // Join the entire batch before writing anything back; a partially
        // probed batch is never persisted.
        while tasks.join_next().await.is_some() {}

        let mut refreshed = Vec::new();
        while let Ok(host) = rx.try_recv() {
            refreshed.push(host);
        }
        self.store.update_batch(&refreshed).await
    }
}
