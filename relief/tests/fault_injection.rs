//! Conflict retries, storage outages and broadcaster failures.
//!
//! Run with: `cargo test -p relief --test fault_injection`

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{admin, admit_to, seed, services_over};
use relief::app::{Context, Services};
use relief::config::StatsConfig;
use relief::types::TransferRequest;
use relief_core::center::Center;
use relief_core::error::ReliefError;
use relief_core::guest::Guest;
use relief_core::store::{GuestQuery, ShelterStore};
use relief_runtime::{InMemoryShelterStore, RetryPolicy};
use relief_testing::faults::{FailingEventBus, FlakyStore};
use relief_testing::fixtures::{CenterBuilder, guest};
use relief_testing::{SequentialIdGenerator, init_tracing, test_clock};
use std::sync::Arc;
use std::time::Duration;

fn quick_retries(max_retries: usize) -> RetryPolicy {
    RetryPolicy::builder()
        .max_retries(max_retries)
        .initial_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(2))
        .build()
}

async fn flaky(centers: &[Center], guests: &[Guest], retry: RetryPolicy) -> (Services, Arc<FlakyStore>) {
    init_tracing();
    let inner: Arc<dyn ShelterStore> = Arc::new(InMemoryShelterStore::new());
    seed(inner.as_ref(), centers, guests).await;
    let store = Arc::new(FlakyStore::new(inner));
    let (services, _bus) = services_over(Arc::clone(&store) as Arc<dyn ShelterStore>, retry);
    (services, store)
}

#[tokio::test]
async fn test_conflicts_are_retried_from_a_fresh_read() {
    let a = CenterBuilder::new("A").capacity(2).build();
    let (services, store) = flaky(&[a.clone()], &[], quick_retries(5)).await;

    store.inject_conflicts(2);
    services.coordinator.admit(&admin(), admit_to(a.id, "Ada")).await.unwrap();

    assert_eq!(store.commit_attempts(), 3);
    assert_eq!(services.ledger.get_center(a.id).await.unwrap().current_occupancy, 1);
}

#[tokio::test]
async fn test_exhausted_retries_surface_conflict_and_write_nothing() {
    let a = CenterBuilder::new("A").capacity(2).build();
    let (services, store) = flaky(&[a.clone()], &[], quick_retries(2)).await;

    store.inject_conflicts(10);
    let err = services
        .coordinator
        .admit(&admin(), admit_to(a.id, "Ada"))
        .await
        .unwrap_err();

    assert!(matches!(err, ReliefError::Conflict(_)));
    assert_eq!(err.code(), "CONFLICT");
    assert_eq!(store.commit_attempts(), 3);
    assert_eq!(services.ledger.get_center(a.id).await.unwrap().current_occupancy, 0);
    assert!(store.find_guests(GuestQuery::all()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_transfer_conflict_leaves_both_centers_untouched() {
    let a = CenterBuilder::new("A").capacity(2).occupancy(1).build();
    let b = CenterBuilder::new("B").capacity(2).build();
    let g = guest("GST-1", a.id);
    let (services, store) = flaky(&[a.clone(), b.clone()], &[g.clone()], quick_retries(1)).await;

    store.inject_conflicts(2);
    let err = services
        .coordinator
        .transfer(&admin(), &g.id, TransferRequest { target_center_id: b.id })
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(services.ledger.get_center(a.id).await.unwrap().current_occupancy, 1);
    assert_eq!(services.ledger.get_center(b.id).await.unwrap().current_occupancy, 0);
    let stored = services.registry.find_by_id(&g.id).await.unwrap();
    assert_eq!(stored.center_id, a.id);
    assert!(stored.transfer_history.is_empty());
}

#[tokio::test]
async fn test_business_rejections_are_not_retried() {
    let a = CenterBuilder::new("A").capacity(1).occupancy(1).build();
    let (services, store) = flaky(&[a.clone()], &[], quick_retries(5)).await;

    let err = services
        .coordinator
        .admit(&admin(), admit_to(a.id, "Ada"))
        .await
        .unwrap_err();

    assert_eq!(err, ReliefError::CenterFull { center_id: a.id });
    assert_eq!(store.commit_attempts(), 0);
}

#[tokio::test]
async fn test_outage_is_storage_unavailable() {
    let a = CenterBuilder::new("A").capacity(1).build();
    let (services, store) = flaky(&[a.clone()], &[], quick_retries(5)).await;

    store.set_unavailable(true);
    let err = services
        .coordinator
        .admit(&admin(), admit_to(a.id, "Ada"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "STORAGE_UNAVAILABLE");
    assert!(!err.is_retryable());

    store.set_unavailable(false);
    services.coordinator.admit(&admin(), admit_to(a.id, "Ada")).await.unwrap();
}

#[tokio::test]
async fn test_broadcast_failure_does_not_undo_commit() {
    init_tracing();
    let a = CenterBuilder::new("A").capacity(1).build();
    let store: Arc<dyn ShelterStore> = Arc::new(InMemoryShelterStore::new());
    seed(store.as_ref(), &[a.clone()], &[]).await;
    let context = Context::new(
        Arc::clone(&store),
        Arc::new(FailingEventBus),
        Arc::new(test_clock()),
        Arc::new(SequentialIdGenerator::new()),
        RetryPolicy::default(),
    );
    let services = Services::new(context, StatsConfig::default());

    let admitted = services.coordinator.admit(&admin(), admit_to(a.id, "Ada")).await.unwrap();

    assert_eq!(services.ledger.get_center(a.id).await.unwrap().current_occupancy, 1);
    assert_eq!(services.registry.find_by_id(&admitted.id).await.unwrap(), admitted);
}
