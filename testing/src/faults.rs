//! Fault-injecting wrappers for the store and the event bus.
//!
//! These let tests drive the coordinator through conflict retries, storage
//! outages and broadcaster failures without a real backend misbehaving.

use chrono::{DateTime, Utc};
use futures::stream;
use relief_core::center::{Center, CenterId};
use relief_core::event::{Channel, EventEnvelope};
use relief_core::event_bus::{EventBus, EventBusError, EventStream};
use relief_core::guest::{Guest, GuestId};
use relief_core::store::{
    ActivityRecord, GuestQuery, ShelterStore, StoreError, StoreFuture, Transaction, Versioned,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Store
// ============================================================================

/// Store wrapper that can reject commits on demand.
///
/// Injected conflicts only hit commits. An outage fails reads as well. A
/// rejected commit writes nothing.
///
/// ```ignore
/// let store = Arc::new(FlakyStore::new(Arc::new(InMemoryShelterStore::new())));
/// store.inject_conflicts(2);   // next two commits fail with Conflict
/// store.set_unavailable(true); // every commit fails with Unavailable
/// ```
pub struct FlakyStore {
    inner: Arc<dyn ShelterStore>,
    conflicts: AtomicUsize,
    unavailable: AtomicBool,
    attempts: AtomicUsize,
}

impl FlakyStore {
    /// Wraps `inner`, initially healthy.
    #[must_use]
    pub fn new(inner: Arc<dyn ShelterStore>) -> Self {
        Self {
            inner,
            conflicts: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Fail the next `n` commits with [`StoreError::Conflict`].
    pub fn inject_conflicts(&self, n: usize) {
        self.conflicts.store(n, Ordering::SeqCst);
    }

    /// Fail every call with [`StoreError::Unavailable`] while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Commits attempted so far, rejected ones included.
    #[must_use]
    pub fn commit_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn down(&self) -> bool {
        self.unavailable.load(Ordering::SeqCst)
    }

    fn take_conflict(&self) -> bool {
        self.conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn outage<T: Send + 'static>() -> StoreFuture<'static, T> {
    Box::pin(async { Err(StoreError::Unavailable("injected outage".into())) })
}

impl ShelterStore for FlakyStore {
    fn load_center(&self, id: CenterId) -> StoreFuture<'_, Option<Versioned<Center>>> {
        if self.down() {
            return outage();
        }
        self.inner.load_center(id)
    }

    fn list_centers(&self) -> StoreFuture<'_, Vec<Versioned<Center>>> {
        if self.down() {
            return outage();
        }
        self.inner.list_centers()
    }

    fn load_guest(&self, id: GuestId) -> StoreFuture<'_, Option<Versioned<Guest>>> {
        if self.down() {
            return outage();
        }
        self.inner.load_guest(id)
    }

    fn find_guests(&self, query: GuestQuery) -> StoreFuture<'_, Vec<Guest>> {
        if self.down() {
            return outage();
        }
        self.inner.find_guests(query)
    }

    fn activity_since(&self, since: DateTime<Utc>) -> StoreFuture<'_, Vec<ActivityRecord>> {
        if self.down() {
            return outage();
        }
        self.inner.activity_since(since)
    }

    fn commit(&self, tx: Transaction) -> StoreFuture<'_, ()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.down() {
            return outage();
        }
        if self.take_conflict() {
            return Box::pin(async {
                Err(StoreError::Conflict {
                    key: "injected".into(),
                    expected: None,
                    actual: None,
                })
            });
        }
        self.inner.commit(tx)
    }
}

// ============================================================================
// Event bus
// ============================================================================

/// Event bus that records every published envelope.
#[derive(Debug, Default)]
pub struct RecordingEventBus {
    published: Mutex<Vec<EventEnvelope>>,
}

impl RecordingEventBus {
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, in order.
    #[must_use]
    pub fn published(&self) -> Vec<EventEnvelope> {
        self.published
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Names of everything published so far, in order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.published().iter().map(|e| e.event.name()).collect()
    }

    /// Forget recorded events.
    pub fn clear(&self) {
        if let Ok(mut events) = self.published.lock() {
            events.clear();
        }
    }
}

impl EventBus for RecordingEventBus {
    fn publish(
        &self,
        envelope: EventEnvelope,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        if let Ok(mut events) = self.published.lock() {
            events.push(envelope);
        }
        Box::pin(async { Ok(()) })
    }

    fn subscribe(
        &self,
        _channels: &[Channel],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        Box::pin(async { Ok(Box::pin(stream::empty()) as EventStream) })
    }
}

/// Event bus whose publishes always fail.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingEventBus;

impl EventBus for FailingEventBus {
    fn publish(
        &self,
        envelope: EventEnvelope,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        Box::pin(async move {
            Err(EventBusError::PublishFailed {
                channel: envelope.channel.to_string(),
                reason: "injected failure".into(),
            })
        })
    }

    fn subscribe(
        &self,
        _channels: &[Channel],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        Box::pin(async { Err(EventBusError::Closed) })
    }
}
