//! Shared wiring for the integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use relief::app::{Context, Services};
use relief::config::StatsConfig;
use relief::types::AdmitRequest;
use relief_core::center::{Center, CenterId};
use relief_core::event_bus::EventBus;
use relief_core::guest::{Guest, GuestProfile};
use relief_core::role::{Actor, Role};
use relief_core::store::{Expectation, ShelterStore, Transaction};
use relief_runtime::{InMemoryShelterStore, RetryPolicy};
use relief_testing::faults::RecordingEventBus;
use relief_testing::{SequentialIdGenerator, test_clock};
use std::sync::Arc;
use std::time::Duration;

/// Services over a fresh in-memory store, with a recording event bus.
pub struct Harness {
    pub services: Services,
    pub store: Arc<dyn ShelterStore>,
    pub bus: Arc<RecordingEventBus>,
}

/// Retry budget large enough for heavy contention in the race tests.
pub fn patient_retries() -> RetryPolicy {
    RetryPolicy::builder()
        .max_retries(200)
        .initial_delay(Duration::from_micros(50))
        .max_delay(Duration::from_millis(2))
        .build()
}

/// Seed `store` with centers and guests.
pub async fn seed(store: &dyn ShelterStore, centers: &[Center], guests: &[Guest]) {
    let mut tx = Transaction::new();
    for center in centers {
        tx = tx.put_center(center.clone(), Expectation::Absent);
    }
    for guest in guests {
        tx = tx.put_guest(guest.clone(), Expectation::Absent);
    }
    if !tx.is_empty() {
        store.commit(tx).await.unwrap();
    }
}

/// Wire services over `store`.
pub fn services_over(store: Arc<dyn ShelterStore>, retry: RetryPolicy) -> (Services, Arc<RecordingEventBus>) {
    let bus = Arc::new(RecordingEventBus::new());
    let context = Context::new(
        store,
        Arc::clone(&bus) as Arc<dyn EventBus>,
        Arc::new(test_clock()),
        Arc::new(SequentialIdGenerator::new()),
        retry,
    );
    (Services::new(context, StatsConfig::default()), bus)
}

/// Harness seeded with `centers` and `guests`.
pub async fn harness(centers: &[Center], guests: &[Guest]) -> Harness {
    harness_with(centers, guests, RetryPolicy::default()).await
}

/// Harness with a specific retry policy.
pub async fn harness_with(centers: &[Center], guests: &[Guest], retry: RetryPolicy) -> Harness {
    let store: Arc<dyn ShelterStore> = Arc::new(InMemoryShelterStore::new());
    seed(store.as_ref(), centers, guests).await;
    let (services, bus) = services_over(Arc::clone(&store), retry);
    Harness { services, store, bus }
}

pub fn admin() -> Actor {
    Actor::new("admin-1", Role::Admin)
}

pub fn admit_to(center_id: CenterId, first: &str) -> AdmitRequest {
    AdmitRequest {
        center_id,
        profile: GuestProfile::named(first, "Doe"),
    }
}

impl Harness {
    pub async fn center(&self, id: CenterId) -> Center {
        self.services.ledger.get_center(id).await.unwrap()
    }

    pub async fn occupancy(&self, id: CenterId) -> u32 {
        self.center(id).await.current_occupancy
    }
}
