//! Poller behavior against a real (in-memory) database with an instrumented
//! probe function.

mod common;

use certwatch_worker::error::ProbeFailure;
use certwatch_worker::model::{CertStatus, CertificateInfo};
use certwatch_worker::poller::{Poller, ProbeFn, ProbeFuture};
use certwatch_worker::store::HostStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use time::{Duration, OffsetDateTime};

fn healthy_snapshot() -> CertificateInfo {
    let now = OffsetDateTime::now_utc();
    CertificateInfo {
        dns_names: "example.com".to_string(),
        ip_address: "192.0.2.7:443".to_string(),
        issued_by: "Test CA".to_string(),
        expires_at: Some(now + Duration::days(30)),
        status: CertStatus::Healthy,
        checked_at: now,
        latency_ms: 5,
        signature: "cafe".to_string(),
        error: None,
    }
}

#[tokio::test]
async fn poll_never_exceeds_probe_budget() {
    let db = common::setup_db().await;
    for i in 0..40 {
        common::seed_host(&db, &format!("host{i}.example.com"), None).await;
    }
    let store = HostStore::new(db.clone());

    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_in_flight = Arc::new(AtomicUsize::new(0));
    let in_flight_probe = in_flight.clone();
    let max_probe = max_in_flight.clone();

    let probe_fn: ProbeFn = Arc::new(move |_hostname: String| {
        let in_flight = in_flight_probe.clone();
        let max_seen = max_probe.clone();
        Box::pin(async move {
            let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            max_seen.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            healthy_snapshot()
        }) as ProbeFuture
    });

    let poller = Poller::with_probe_fn(
        tokio::time::Duration::from_secs(3600),
        5,
        store.clone(),
        probe_fn,
    );
    poller.poll().await.expect("poll should succeed");

    let max = max_in_flight.load(Ordering::SeqCst);
    assert!(max <= 5, "expected at most 5 concurrent probes, saw {max}");
    assert!(max >= 1);

    // Every host in the batch was refreshed.
    let hosts = store.all().await.unwrap();
    assert_eq!(hosts.len(), 40);
    assert!(
        hosts
            .iter()
            .all(|h| h.certificate.status == CertStatus::Healthy
                && h.certificate.signature == "cafe")
    );
}

#[tokio::test]
async fn per_host_probe_failure_does_not_abort_the_batch() {
    let db = common::setup_db().await;
    common::seed_host(&db, "up.example.com", None).await;
    common::seed_host(&db, "down.example.com", None).await;
    let store = HostStore::new(db.clone());

    let probe_fn: ProbeFn = Arc::new(|hostname: String| {
        Box::pin(async move {
            if hostname.starts_with("down") {
                CertificateInfo::failed(ProbeFailure::ConnectionRefused, OffsetDateTime::now_utc())
            } else {
                healthy_snapshot()
            }
        }) as ProbeFuture
    });

    let poller = Poller::with_probe_fn(tokio::time::Duration::from_secs(3600), 15, store.clone(), probe_fn);
    poller.poll().await.expect("poll should succeed despite a probe failure");

    let hosts = store.all().await.unwrap();
    let down = hosts.iter().find(|h| h.hostname == "down.example.com").unwrap();
    assert_eq!(down.certificate.status, CertStatus::Offline);
    assert_eq!(down.certificate.error, Some(ProbeFailure::ConnectionRefused));
    assert_eq!(down.certificate.issued_by, "n/a");

    let up = hosts.iter().find(|h| h.hostname == "up.example.com").unwrap();
    assert_eq!(up.certificate.status, CertStatus::Healthy);
    assert!(up.certificate.error.is_none());
}

#[tokio::test]
async fn all_orders_by_status_severity_then_expiry() {
    let db = common::setup_db().await;
    let now = OffsetDateTime::now_utc();

    common::seed_host_with_status(&db, "ok-late.example.com", Some(now + Duration::days(60)), CertStatus::Healthy).await;
    common::seed_host_with_status(&db, "ok-soon.example.com", Some(now + Duration::days(5)), CertStatus::Healthy).await;
    common::seed_host_with_status(&db, "broken.example.com", Some(now - Duration::days(1)), CertStatus::Invalid).await;
    common::seed_host_with_status(&db, "down.example.com", None, CertStatus::Offline).await;
    common::seed_host_with_status(&db, "new.example.com", None, CertStatus::Unknown).await;

    let store = HostStore::new(db);
    let hosts = store.all().await.unwrap();
    let names: Vec<&str> = hosts.iter().map(|h| h.hostname.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "new.example.com",
            "down.example.com",
            "broken.example.com",
            "ok-soon.example.com",
            "ok-late.example.com",
        ]
    );
}

/// Shutdown during a poll lets the batch finish and persist; `run` only
/// returns once the in-flight cycle is done.
#[tokio::test]
async fn shutdown_waits_for_the_in_flight_poll() {
    let db = common::setup_db().await;
    for i in 0..4 {
        common::seed_host(&db, &format!("host{i}.example.com"), None).await;
    }
    let store = HostStore::new(db.clone());

    let probe_fn: ProbeFn = Arc::new(|_hostname: String| {
        Box::pin(async move {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            healthy_snapshot()
        }) as ProbeFuture
    });
    let poller = Poller::with_probe_fn(
        tokio::time::Duration::from_secs(3600),
        4,
        store.clone(),
        probe_fn,
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let run_task = tokio::spawn(async move { poller.run(shutdown_rx).await });

    // Signal while the first poll's probes are still sleeping.
    tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
    shutdown_tx.send(true).unwrap();
    run_task.await.unwrap().unwrap();

    let hosts = store.all().await.unwrap();
    assert!(
        hosts.iter().all(|h| h.certificate.signature == "cafe"),
        "interrupted batch was not persisted"
    );
}

#[tokio::test]
async fn poll_with_no_hosts_is_a_no_op() {
    let db = common::setup_db().await;
    let store = HostStore::new(db);
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_probe = calls.clone();
    let probe_fn: ProbeFn = Arc::new(move |_hostname: String| {
        calls_probe.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move { healthy_snapshot() }) as ProbeFuture
    });

    let poller = Poller::with_probe_fn(tokio::time::Duration::from_secs(3600), 15, store, probe_fn);
    poller.poll().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
