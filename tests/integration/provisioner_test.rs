// Dependency provisioner lifecycle against real SQLite databases

#[path = "../helpers/mod.rs"]
mod helpers;

use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use helpers::{provisioner, provisioner_config, CountingBackend};
use paytrust_harness::config::connect_any;
use paytrust_harness::provisioner::{
    DependencyKind, DependencyProvisioner, DependencySpec, LifecycleState,
};
use paytrust_harness::HarnessError;

#[tokio::test]
async fn test_acquire_and_release() {
    let backend = CountingBackend::new();
    let provisioner = provisioner(backend.clone());

    let descriptor = provisioner
        .acquire(DependencyKind::RelationalStore, &DependencySpec::new())
        .await
        .unwrap();
    assert_eq!(descriptor.kind, DependencyKind::RelationalStore);
    assert_eq!(provisioner.state(descriptor.id), Some(LifecycleState::Ready));
    assert_eq!(provisioner.live_count(), 1);

    let pool = connect_any(&descriptor.url).await.unwrap();
    let one: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&pool).await.unwrap();
    assert_eq!(one, 1);
    pool.close().await;

    provisioner.release(&descriptor).await.unwrap();
    assert_eq!(provisioner.state(descriptor.id), Some(LifecycleState::Stopped));
    assert_eq!(backend.stops(), 1);
}

#[tokio::test]
async fn test_release_is_idempotent() {
    let backend = CountingBackend::new();
    let provisioner = provisioner(backend.clone());

    let descriptor = provisioner
        .acquire(DependencyKind::RelationalStore, &DependencySpec::new())
        .await
        .unwrap();

    provisioner.release(&descriptor).await.unwrap();
    provisioner.release(&descriptor).await.unwrap();
    assert_eq!(backend.stops(), 1);
}

#[tokio::test]
async fn test_bootstrap_applies_schema() {
    let provisioner = provisioner(CountingBackend::new());
    let spec = DependencySpec::new().with_bootstrap([
        "CREATE TABLE ledger (id INTEGER PRIMARY KEY, amount BIGINT NOT NULL)",
        "INSERT INTO ledger (amount) VALUES (1000)",
    ]);

    let descriptor = provisioner
        .acquire(DependencyKind::RelationalStore, &spec)
        .await
        .unwrap();

    let pool = connect_any(&descriptor.url).await.unwrap();
    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ledger")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);
    pool.close().await;

    provisioner.release_all().await.unwrap();
}

#[tokio::test]
async fn test_failed_bootstrap_releases_and_reports() {
    let backend = CountingBackend::new();
    let provisioner = provisioner(backend.clone());
    let spec = DependencySpec::new().with_bootstrap(["CREATE TABLE broken ("]);

    let err = provisioner
        .acquire(DependencyKind::RelationalStore, &spec)
        .await
        .unwrap_err();

    assert!(matches!(err, HarnessError::Provisioning(_)));
    assert!(err.to_string().contains("bootstrap"));
    assert_eq!(backend.live(), 0);
    assert_eq!(provisioner.live_count(), 0);
}

#[tokio::test]
async fn test_hanging_backend_times_out() {
    let backend = CountingBackend::hanging();
    let mut config = provisioner_config();
    config.timeout = Duration::from_millis(100);
    let provisioner = DependencyProvisioner::new(backend, config);

    let started = std::time::Instant::now();
    let err = provisioner
        .acquire(DependencyKind::RelationalStore, &DependencySpec::new())
        .await
        .unwrap_err();

    assert!(matches!(err, HarnessError::Provisioning(_)));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_timed_out_start_is_stopped_once_ready() {
    let backend = CountingBackend::slow_ready(Duration::from_millis(400));
    let mut config = provisioner_config();
    config.timeout = Duration::from_millis(300);
    let provisioner = DependencyProvisioner::new(backend.clone(), config);

    let err = provisioner
        .acquire(DependencyKind::RelationalStore, &DependencySpec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, HarnessError::Provisioning(_)));
    // The database exists but nobody holds a descriptor for it
    assert_eq!(backend.starts(), 1);
    assert_eq!(provisioner.live_count(), 0);

    provisioner.release_all().await.unwrap();
    assert_eq!(backend.stops(), 1);
    assert_eq!(backend.live(), 0);
}

#[tokio::test]
async fn test_dropped_acquire_is_stopped_once_ready() {
    let backend = CountingBackend::slow_ready(Duration::from_millis(300));
    let provisioner = provisioner(backend.clone());

    let spec = DependencySpec::new();
    let cancelled = tokio::time::timeout(
        Duration::from_millis(100),
        provisioner.acquire(DependencyKind::RelationalStore, &spec),
    )
    .await;
    assert!(cancelled.is_err());

    provisioner.release_all().await.unwrap();
    assert_eq!(backend.starts(), 1);
    assert_eq!(backend.live(), 0);
}

#[tokio::test]
async fn test_no_retry_by_default() {
    let backend = CountingBackend::failing(1);
    let provisioner = provisioner(backend.clone());

    let err = provisioner
        .acquire(DependencyKind::RelationalStore, &DependencySpec::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("after 1 attempt(s)"));
    assert_eq!(backend.starts(), 0);
}

#[tokio::test]
async fn test_bounded_retries() {
    let backend = CountingBackend::failing(2);
    let mut config = provisioner_config();
    config.max_retries = 2;
    let provisioner = DependencyProvisioner::new(backend.clone(), config);

    let descriptor = provisioner
        .acquire(DependencyKind::RelationalStore, &DependencySpec::new())
        .await
        .unwrap();
    assert_eq!(backend.starts(), 1);

    provisioner.release(&descriptor).await.unwrap();
}

#[tokio::test]
async fn test_scoped_releases_on_error() {
    let backend = CountingBackend::new();
    let provisioner = provisioner(backend.clone());

    let result: paytrust_harness::Result<()> = provisioner
        .scoped(DependencyKind::RelationalStore, &DependencySpec::new(), |_| async {
            Err(HarnessError::assertion("scenario failed"))
        })
        .await;

    assert!(matches!(result, Err(HarnessError::Assertion(_))));
    assert_eq!(backend.starts(), 1);
    assert_eq!(backend.stops(), 1);
}

#[tokio::test]
async fn test_scoped_releases_on_panic() {
    let backend = CountingBackend::new();
    let provisioner = provisioner(backend.clone());

    let outcome = std::panic::AssertUnwindSafe(provisioner.scoped(
        DependencyKind::RelationalStore,
        &DependencySpec::new(),
        |descriptor| async move {
            if !descriptor.url.is_empty() {
                panic!("subject exploded");
            }
            Ok(())
        },
    ))
    .catch_unwind()
    .await;

    assert!(outcome.is_err());
    assert_eq!(backend.live(), 0);
    assert_eq!(provisioner.live_count(), 0);
}

#[tokio::test]
async fn test_concurrent_acquires_get_distinct_descriptors() {
    let backend = CountingBackend::new();
    let provisioner = provisioner(backend.clone());

    let acquires = (0..8).map(|_| {
        let provisioner = Arc::clone(&provisioner);
        tokio::spawn(async move {
            provisioner
                .acquire(DependencyKind::RelationalStore, &DependencySpec::new())
                .await
        })
    });
    let mut descriptors = Vec::new();
    for handle in futures_util::future::join_all(acquires).await {
        descriptors.push(handle.unwrap().unwrap());
    }

    let mut urls: Vec<&str> = descriptors.iter().map(|d| d.url.as_str()).collect();
    urls.sort_unstable();
    urls.dedup();
    assert_eq!(urls.len(), 8);

    provisioner.release_all().await.unwrap();
    assert_eq!(backend.live(), 0);
    assert_eq!(provisioner.live_count(), 0);
}
